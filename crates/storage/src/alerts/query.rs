//! Read-side filters and aggregate counts over retained alerts.

use serde::{Deserialize, Serialize};

use bialarm_core::{Alert, Category, Severity};

/// Filter for [`AlertStore::query`](super::AlertStore::query).
///
/// All set conditions must hold. Results are most-recent-first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default)]
    pub unresolved_only: bool,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub severity: Option<Severity>,
    /// Maximum number of alerts to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl AlertQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn unread(mut self) -> Self {
        self.unread_only = true;
        self
    }

    pub fn unresolved(mut self) -> Self {
        self.unresolved_only = true;
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        if self.unread_only && alert.read {
            return false;
        }
        if self.unresolved_only && alert.resolved {
            return false;
        }
        if self.category.as_ref().is_some_and(|c| c != &alert.category) {
            return false;
        }
        if self.severity.is_some_and(|s| s != alert.severity) {
            return false;
        }
        true
    }
}

/// Snapshot of the alert store.
///
/// Severity buckets count only unresolved alerts, the way an "active alerts"
/// panel reads them; `unread` and `resolved` count across all retained alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCounts {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub unread: usize,
    pub resolved: usize,
    pub total: usize,
}

impl AlertCounts {
    pub fn tally<'a>(alerts: impl IntoIterator<Item = &'a Alert>) -> Self {
        let mut counts = Self::default();
        for alert in alerts {
            counts.total += 1;
            if !alert.read {
                counts.unread += 1;
            }
            if alert.resolved {
                counts.resolved += 1;
                continue;
            }
            match alert.severity {
                Severity::Critical => counts.critical += 1,
                Severity::Warning => counts.warning += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }

    /// Unresolved alerts across all severities.
    pub fn active(&self) -> usize {
        self.critical + self.warning + self.info
    }
}
