use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::category::Category;
use crate::observation::ObservationId;

/// Unique alert identifier.
pub type AlertId = Uuid;

/// Alert severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "warning" | "warn" => Ok(Self::Warning),
            "info" => Ok(Self::Info),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Which rule an alert violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    BelowMin,
    AboveMax,
    PercentChange,
    DefectRate,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::BelowMin => write!(f, "below_min"),
            AlertKind::AboveMax => write!(f, "above_max"),
            AlertKind::PercentChange => write!(f, "percent_change"),
            AlertKind::DefectRate => write!(f, "defect_rate"),
        }
    }
}

/// Detection output not yet committed to the alert store.
///
/// `id` and `timestamp` are filled in by the store when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDraft {
    #[serde(default)]
    pub id: Option<AlertId>,
    pub category: Category,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub observation_id: ObservationId,
    /// Measured quantity that tripped the rule (raw value or percentage).
    pub value: f64,
    /// Limit that was exceeded.
    pub threshold: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl AlertDraft {
    /// Stamp missing identity fields and produce a stored alert.
    pub fn into_alert(self, now: DateTime<Utc>) -> Alert {
        Alert {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            category: self.category,
            kind: self.kind,
            severity: self.severity,
            message: self.message,
            observation_id: self.observation_id,
            value: self.value,
            threshold: self.threshold,
            timestamp: self.timestamp.unwrap_or(now),
            read: false,
            resolved: false,
        }
    }
}

/// A recorded rule violation.
///
/// `read` and `resolved` only ever move from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub category: Category,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub observation_id: ObservationId,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub resolved: bool,
}

impl Alert {
    /// Mark as read. Returns `true` if the flag changed.
    pub fn mark_read(&mut self) -> bool {
        !std::mem::replace(&mut self.read, true)
    }

    /// Mark as resolved. Returns `true` if the flag changed.
    pub fn mark_resolved(&mut self) -> bool {
        !std::mem::replace(&mut self.resolved, true)
    }
}
