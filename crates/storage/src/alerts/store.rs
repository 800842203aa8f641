//! Bounded, most-recent-first alert history.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use bialarm_core::config::{AlertConfig, DEFAULT_MAX_ALERTS};
use bialarm_core::{Alert, AlertDraft, AlertId, Error, SharedClock};

use crate::backend::{load_json, save_json, KeyValueStore};

use super::query::{AlertCounts, AlertQuery};

const ALERTS_KEY: &str = "alerts";
/// Buffered recorded-alert events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 256;

/// Retention and suppression settings for an [`AlertStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlertStoreConfig {
    /// Retention cap. Values below 1 are raised to 1.
    pub max_alerts: usize,
    /// Drop a batch draft when an unresolved alert with the same
    /// `(category, kind)` was recorded within this window.
    pub suppression_window: Option<Duration>,
}

impl Default for AlertStoreConfig {
    fn default() -> Self {
        Self {
            max_alerts: DEFAULT_MAX_ALERTS,
            suppression_window: None,
        }
    }
}

impl From<&AlertConfig> for AlertStoreConfig {
    fn from(config: &AlertConfig) -> Self {
        Self {
            max_alerts: config.max_alerts,
            suppression_window: config.suppression_window().and_then(|w| {
                match Duration::from_std(w) {
                    Ok(window) => Some(window),
                    Err(e) => {
                        warn!(
                            window_secs = w.as_secs(),
                            error = %e,
                            "suppression window out of range, suppression disabled"
                        );
                        None
                    }
                }
            }),
        }
    }
}

/// Persisted alert list with oldest-first eviction.
///
/// Every mutation runs as one critical section: copy, apply, persist, swap.
/// A failed write therefore never leaves a partially applied change behind.
pub struct AlertStore {
    backend: Arc<dyn KeyValueStore>,
    clock: SharedClock,
    config: AlertStoreConfig,
    /// Head = most recent.
    alerts: RwLock<VecDeque<Alert>>,
    events: broadcast::Sender<Alert>,
}

impl AlertStore {
    /// Open the store, loading persisted alerts and applying the cap.
    pub fn open(
        backend: Arc<dyn KeyValueStore>,
        clock: SharedClock,
        mut config: AlertStoreConfig,
    ) -> Result<Self, Error> {
        config.max_alerts = config.max_alerts.max(1);
        let mut alerts: VecDeque<Alert> =
            load_json(backend.as_ref(), ALERTS_KEY)?.unwrap_or_default();
        alerts.truncate(config.max_alerts);

        debug!(
            backend = backend.name(),
            alerts = alerts.len(),
            max = config.max_alerts,
            "alert store opened"
        );

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            backend,
            clock,
            config,
            alerts: RwLock::new(alerts),
            events,
        })
    }

    pub fn config(&self) -> &AlertStoreConfig {
        &self.config
    }

    /// Receive every alert after it has been durably recorded.
    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.events.subscribe()
    }

    /// Record a single alert unconditionally, then enforce the cap.
    pub fn record(&self, draft: AlertDraft) -> Result<Alert, Error> {
        self.insert(vec![draft], false)?
            .pop()
            .ok_or_else(|| Error::NotFound("recorded alert".to_string()))
    }

    /// Record a scan's drafts as one batch: all are committed or none are.
    ///
    /// Applies the suppression window when configured. Returns the alerts
    /// that were recorded, in draft order.
    pub fn commit_batch(&self, drafts: Vec<AlertDraft>) -> Result<Vec<Alert>, Error> {
        self.insert(drafts, true)
    }

    fn insert(&self, drafts: Vec<AlertDraft>, suppress: bool) -> Result<Vec<Alert>, Error> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let mut guard = self.alerts.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        let mut recorded = Vec::with_capacity(drafts.len());

        for draft in drafts {
            if suppress && self.is_suppressed(&next, &draft, now) {
                debug!(
                    category = %draft.category,
                    kind = %draft.kind,
                    "repeat alert suppressed"
                );
                continue;
            }
            let alert = draft.into_alert(now);
            next.push_front(alert.clone());
            recorded.push(alert);
        }

        if recorded.is_empty() {
            return Ok(recorded);
        }

        let evicted = next.len().saturating_sub(self.config.max_alerts);
        next.truncate(self.config.max_alerts);

        self.persist(&next)?;
        *guard = next;
        drop(guard);

        if evicted > 0 {
            debug!(evicted, "retention cap reached, oldest alerts evicted");
        }
        for alert in &recorded {
            debug!(
                id = %alert.id,
                category = %alert.category,
                kind = %alert.kind,
                severity = %alert.severity,
                "alert recorded"
            );
            // Err only means nobody is subscribed.
            let _ = self.events.send(alert.clone());
        }
        Ok(recorded)
    }

    fn is_suppressed(&self, alerts: &VecDeque<Alert>, draft: &AlertDraft, now: DateTime<Utc>) -> bool {
        let Some(window) = self.config.suppression_window else {
            return false;
        };
        alerts.iter().any(|a| {
            !a.resolved
                && a.category == draft.category
                && a.kind == draft.kind
                && now.signed_duration_since(a.timestamp) < window
        })
    }

    /// Mark one alert read. Unknown ids are a no-op.
    ///
    /// Returns whether the alert exists.
    pub fn mark_read(&self, id: AlertId) -> Result<bool, Error> {
        self.mutate(|alerts| match alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => (true, alert.mark_read()),
            None => (false, false),
        })
    }

    /// Mark one alert resolved. Unknown ids are a no-op.
    ///
    /// Returns whether the alert exists.
    pub fn mark_resolved(&self, id: AlertId) -> Result<bool, Error> {
        self.mutate(|alerts| match alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => (true, alert.mark_resolved()),
            None => (false, false),
        })
    }

    /// Mark every alert read. Returns how many changed.
    pub fn mark_all_read(&self) -> Result<usize, Error> {
        self.mutate(|alerts| {
            let changed = alerts
                .iter_mut()
                .map(|a| a.mark_read())
                .filter(|changed| *changed)
                .count();
            (changed, changed > 0)
        })
    }

    /// Remove one alert. Returns whether it existed.
    pub fn delete(&self, id: AlertId) -> Result<bool, Error> {
        self.mutate(|alerts| {
            let before = alerts.len();
            alerts.retain(|a| a.id != id);
            let removed = alerts.len() < before;
            (removed, removed)
        })
    }

    /// Drop resolved alerts recorded before `older_than`. Unresolved alerts
    /// are always kept. Returns how many were removed.
    pub fn purge_resolved(&self, older_than: DateTime<Utc>) -> Result<usize, Error> {
        let removed = self.mutate(|alerts| {
            let before = alerts.len();
            alerts.retain(|a| !(a.resolved && a.timestamp < older_than));
            let removed = before - alerts.len();
            (removed, removed > 0)
        })?;
        if removed > 0 {
            info!(removed, cutoff = %older_than, "purged resolved alerts");
        }
        Ok(removed)
    }

    fn mutate<R>(&self, apply: impl FnOnce(&mut VecDeque<Alert>) -> (R, bool)) -> Result<R, Error> {
        let mut guard = self.alerts.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        let (result, changed) = apply(&mut next);
        if changed {
            self.persist(&next)?;
            *guard = next;
        }
        Ok(result)
    }

    fn persist(&self, alerts: &VecDeque<Alert>) -> Result<(), Error> {
        save_json(self.backend.as_ref(), ALERTS_KEY, alerts).map_err(|e| {
            tracing::error!(error = %e, backend = self.backend.name(), "failed to persist alerts");
            Error::from(e)
        })
    }

    pub fn get(&self, id: AlertId) -> Option<Alert> {
        let guard = self.alerts.read().unwrap_or_else(PoisonError::into_inner);
        guard.iter().find(|a| a.id == id).cloned()
    }

    /// Matching alerts, most-recent-first. Never mutates.
    pub fn query(&self, query: &AlertQuery) -> Vec<Alert> {
        let guard = self.alerts.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .iter()
            .filter(|a| query.matches(a))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn counts(&self) -> AlertCounts {
        let guard = self.alerts.read().unwrap_or_else(PoisonError::into_inner);
        AlertCounts::tally(guard.iter())
    }

    pub fn len(&self) -> usize {
        self.alerts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
