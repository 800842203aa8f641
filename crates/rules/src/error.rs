//! Error types for rule loading and scanning.

use bialarm_core::{Alert, AlertDraft, ValidationError};

/// Errors raised while loading a rule file.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A threshold or severity entry failed validation.
    #[error("invalid rule for '{category}': {source}")]
    Validation {
        category: String,
        #[source]
        source: ValidationError,
    },
}

/// Result alias for rule loading.
pub type Result<T> = std::result::Result<T, RuleError>;

/// A scan computed alerts but could not make them durable.
///
/// The drafts are handed back so the caller can retry the commit without
/// re-running detection. `committed` holds alerts that earlier scans of the
/// same call did record before the failure.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(
        "failed to commit {} alert(s), {} already committed: {source}",
        .alerts.len(),
        .committed.len()
    )]
    Commit {
        alerts: Vec<AlertDraft>,
        committed: Vec<Alert>,
        #[source]
        source: bialarm_core::Error,
    },
}

impl ScanError {
    /// Uncommitted drafts carried by the error.
    pub fn into_alerts(self) -> Vec<AlertDraft> {
        self.into_parts().1
    }

    /// Alerts recorded before the failure.
    pub fn committed(&self) -> &[Alert] {
        match self {
            ScanError::Commit { committed, .. } => committed,
        }
    }

    /// `(committed, uncommitted)`.
    pub fn into_parts(self) -> (Vec<Alert>, Vec<AlertDraft>) {
        match self {
            ScanError::Commit {
                alerts, committed, ..
            } => (committed, alerts),
        }
    }
}
