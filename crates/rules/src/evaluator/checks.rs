//! Individual rule checks over the latest observation pair.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use bialarm_core::{AlertDraft, AlertKind, Observation, RuleConfig, Severity};

use crate::severity::{classify_defect_rate, SeverityPolicy, DEFECT_RATE_NORMAL_PCT};

fn draft(
    observation: &Observation,
    kind: AlertKind,
    severity: Severity,
    message: String,
    value: f64,
    threshold: f64,
    now: DateTime<Utc>,
) -> AlertDraft {
    AlertDraft {
        id: Some(Uuid::new_v4()),
        category: observation.category.clone(),
        kind,
        severity,
        message,
        observation_id: observation.id,
        value,
        threshold,
        timestamp: Some(now),
    }
}

/// `below_min` and `above_max` on the current value. At most one fires
/// because `min <= max`.
pub(crate) fn thresholds(
    current: &Observation,
    config: &RuleConfig,
    policy: &SeverityPolicy,
    now: DateTime<Utc>,
) -> Option<AlertDraft> {
    let value = current.value;
    if value < config.min_threshold {
        return Some(draft(
            current,
            AlertKind::BelowMin,
            policy.below_min(value, config.min_threshold),
            format!(
                "{} value {} is below the minimum threshold ({})",
                current.category, value, config.min_threshold
            ),
            value,
            config.min_threshold,
            now,
        ));
    }
    if value > config.max_threshold {
        return Some(draft(
            current,
            AlertKind::AboveMax,
            policy.above_max(),
            format!(
                "{} value {} is above the maximum threshold ({})",
                current.category, value, config.max_threshold
            ),
            value,
            config.max_threshold,
            now,
        ));
    }
    None
}

/// Step change between `previous` and `current`, in percent.
///
/// `None` when `previous` is zero.
pub fn percent_change(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        return None;
    }
    Some((current - previous) / previous * 100.0)
}

pub(crate) fn step_change(
    current: &Observation,
    previous: &Observation,
    config: &RuleConfig,
    policy: &SeverityPolicy,
    now: DateTime<Utc>,
) -> Option<AlertDraft> {
    let change = percent_change(previous.value, current.value)?;
    let limit = config.percent_change_limit;
    if !change.is_finite() || change.abs() <= limit {
        return None;
    }
    let direction = if change > 0.0 { "increase" } else { "decrease" };
    Some(draft(
        current,
        AlertKind::PercentChange,
        policy.percent_change(change, limit),
        format!(
            "{} {} of {:.1}% exceeds the {}% change limit",
            current.category,
            direction,
            change.abs(),
            limit
        ),
        change,
        limit,
        now,
    ))
}

pub(crate) fn defect_rate(current: &Observation, now: DateTime<Utc>) -> Option<AlertDraft> {
    let rate = current.defect_rate()?;
    let severity = classify_defect_rate(rate)?;
    Some(draft(
        current,
        AlertKind::DefectRate,
        severity,
        format!(
            "{} defect rate {:.1}% exceeds normal band (<{}%)",
            current.category, rate, DEFECT_RATE_NORMAL_PCT
        ),
        rate,
        DEFECT_RATE_NORMAL_PCT,
        now,
    ))
}
