//! Severity classification per alert kind.
//!
//! Every function here is pure: the Detection Engine decides *whether* a rule
//! fired, these decide *how bad* it is.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bialarm_core::{Category, Severity, ValidationError};

/// Defect rates at or below this percentage are normal.
pub const DEFECT_RATE_NORMAL_PCT: f64 = 5.0;
/// Defect rates above this percentage are critical.
pub const DEFECT_RATE_CRITICAL_PCT: f64 = 10.0;

/// Escalation parameters for one category.
///
/// Fields left out of a rule file take the built-in value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeverityPolicy {
    /// A `below_min` alert is critical when the shortfall exceeds this
    /// fraction of the minimum threshold. `0` always escalates, `None` never
    /// does.
    pub below_min_critical_ratio: Option<f64>,
    /// Severity of every `above_max` alert.
    pub above_max: Severity,
    /// A `percent_change` alert is critical when the change exceeds the
    /// limit times this factor. `None` never escalates.
    pub percent_change_critical_factor: Option<f64>,
    /// Severity of a `percent_change` alert that does not escalate.
    pub percent_change_base: Severity,
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        Self {
            below_min_critical_ratio: Some(0.5),
            above_max: Severity::Warning,
            percent_change_critical_factor: Some(2.0),
            percent_change_base: Severity::Warning,
        }
    }
}

impl SeverityPolicy {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(v) = self.below_min_critical_ratio {
            if !v.is_finite() || v < 0.0 {
                return Err(ValidationError::NegativeRatio {
                    field: "below_min_critical_ratio",
                    value: v,
                });
            }
        }
        if let Some(v) = self.percent_change_critical_factor {
            if !v.is_finite() || v <= 0.0 {
                return Err(ValidationError::NonPositiveFactor {
                    field: "percent_change_critical_factor",
                    value: v,
                });
            }
        }
        Ok(())
    }

    /// Severity of a reading below `min`.
    pub fn below_min(&self, value: f64, min: f64) -> Severity {
        let shortfall = min - value;
        match self.below_min_critical_ratio {
            Some(ratio) if shortfall > min.abs() * ratio => Severity::Critical,
            _ => Severity::Warning,
        }
    }

    /// Severity of a reading above the maximum.
    pub fn above_max(&self) -> Severity {
        self.above_max
    }

    /// Severity of a step change of `change_pct` percent against `limit`.
    pub fn percent_change(&self, change_pct: f64, limit: f64) -> Severity {
        match self.percent_change_critical_factor {
            Some(factor) if change_pct.abs() > limit * factor => Severity::Critical,
            _ => self.percent_change_base,
        }
    }
}

/// Severity of a defect rate in percent, `None` inside the normal band.
pub fn classify_defect_rate(rate_pct: f64) -> Option<Severity> {
    if rate_pct > DEFECT_RATE_CRITICAL_PCT {
        Some(Severity::Critical)
    } else if rate_pct > DEFECT_RATE_NORMAL_PCT {
        Some(Severity::Warning)
    } else {
        None
    }
}

/// Default policy plus per-category overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeverityRules {
    pub default: SeverityPolicy,
    pub categories: BTreeMap<Category, SeverityPolicy>,
}

impl SeverityRules {
    pub fn for_category(&self, category: &Category) -> &SeverityPolicy {
        self.categories.get(category).unwrap_or(&self.default)
    }

    pub fn validate(&self) -> Result<(), (String, ValidationError)> {
        self.default
            .validate()
            .map_err(|e| ("default".to_string(), e))?;
        for (category, policy) in &self.categories {
            policy.validate().map_err(|e| (category.to_string(), e))?;
        }
        Ok(())
    }
}
