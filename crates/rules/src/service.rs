//! [`Monitor`]: the in-process API over series, rules, detection, alerts and scans.
//!
//! Constructed once per process with an injected backend and clock; every
//! collaborator (CLI, importers, dashboards) goes through it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info};

use bialarm_core::clock::system_clock;
use bialarm_core::config::DEFAULT_RESOLVED_RETENTION_DAYS;
use bialarm_core::{
    Alert, AlertDraft, AlertId, Category, Error, NewObservation, Observation, Result, RuleConfig,
    SharedClock,
};
use bialarm_storage::{
    AlertCounts, AlertQuery, AlertStore, AlertStoreConfig, KeyValueStore, SeriesStore,
};

use crate::config_store::RuleConfigStore;
use crate::error::ScanError;
use crate::evaluator::DetectionEngine;
use crate::loader::RuleFile;
use crate::scheduler::{ScanMetrics, ScanOutcome, ScanSchedule, ScanScheduler, SchedulerHandle};

/// Wiring options for [`Monitor`].
pub struct MonitorBuilder {
    backend: Arc<dyn KeyValueStore>,
    clock: SharedClock,
    rules: RuleFile,
    alerts: AlertStoreConfig,
    resolved_retention: Duration,
}

impl MonitorBuilder {
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Thresholds restored by reset, and the severity policy.
    pub fn rules(mut self, rules: RuleFile) -> Self {
        self.rules = rules;
        self
    }

    pub fn alert_config(mut self, config: AlertStoreConfig) -> Self {
        self.alerts = config;
        self
    }

    /// How long resolved alerts are kept by [`Monitor::purge_resolved`].
    pub fn resolved_retention(mut self, retention: Duration) -> Self {
        self.resolved_retention = retention;
        self
    }

    /// Load every store from the backend and wire the components together.
    pub fn build(self) -> Result<Monitor> {
        let series = Arc::new(SeriesStore::open(self.backend.clone())?);
        let rules = Arc::new(RuleConfigStore::open(
            self.backend.clone(),
            self.rules.thresholds,
        )?);
        let alerts = Arc::new(AlertStore::open(
            self.backend.clone(),
            self.clock.clone(),
            self.alerts,
        )?);
        let engine = Arc::new(DetectionEngine::new(
            series.clone(),
            rules.clone(),
            self.rules.severity,
            self.clock.clone(),
        ));
        let scheduler = Arc::new(ScanScheduler::new(
            engine,
            alerts.clone(),
            self.clock.clone(),
        ));

        info!(
            backend = self.backend.name(),
            categories = series.categories().len(),
            rules = rules.all().len(),
            alerts = alerts.len(),
            "monitor ready"
        );

        Ok(Monitor {
            series,
            rules,
            alerts,
            scheduler,
            clock: self.clock,
            resolved_retention: self.resolved_retention,
            timers: Mutex::new(None),
        })
    }
}

pub struct Monitor {
    series: Arc<SeriesStore>,
    rules: Arc<RuleConfigStore>,
    alerts: Arc<AlertStore>,
    scheduler: Arc<ScanScheduler>,
    clock: SharedClock,
    resolved_retention: Duration,
    timers: Mutex<Option<SchedulerHandle>>,
}

impl Monitor {
    /// Built-in rules, system clock and default alert retention.
    pub fn builder(backend: Arc<dyn KeyValueStore>) -> MonitorBuilder {
        MonitorBuilder {
            backend,
            clock: system_clock(),
            rules: RuleFile::builtin(),
            alerts: AlertStoreConfig::default(),
            resolved_retention: Duration::days(DEFAULT_RESOLVED_RETENTION_DAYS as i64),
        }
    }

    // ── Ingestion ────────────────────────────────────────────

    pub fn ingest(&self, category: &Category, observation: NewObservation) -> Result<Observation> {
        self.series.append(category, observation)
    }

    pub fn series(&self, category: &Category) -> Vec<Observation> {
        self.series.all(category)
    }

    pub fn categories(&self) -> Vec<Category> {
        self.series.categories()
    }

    // ── Configuration ────────────────────────────────────────

    pub fn get_config(&self, category: &Category) -> Option<RuleConfig> {
        self.rules.get(category)
    }

    pub fn set_config(&self, category: &Category, config: RuleConfig) -> Result<()> {
        self.rules.set(category, config)
    }

    pub fn reset_config(&self) -> Result<()> {
        self.rules.reset_to_defaults()
    }

    pub fn configs(&self) -> BTreeMap<Category, RuleConfig> {
        self.rules.all()
    }

    // ── Scanning ─────────────────────────────────────────────

    pub fn run_scan(&self) -> std::result::Result<ScanOutcome, ScanError> {
        self.scheduler.run_scan()
    }

    /// Retry the commit of drafts returned by a failed scan.
    pub fn commit_alerts(&self, drafts: Vec<AlertDraft>) -> Result<Vec<Alert>> {
        self.alerts.commit_batch(drafts)
    }

    /// (Re)start the periodic scan timers. Must be called inside a tokio
    /// runtime.
    pub async fn start_scheduler(&self, schedule: ScanSchedule) {
        self.stop_scheduler().await;
        let handle = self.scheduler.start(self.series.clone(), schedule);
        *self.timers.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Stop the timers. A scan in flight completes first.
    pub async fn stop_scheduler(&self) {
        let handle = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    pub fn scheduler_running(&self) -> bool {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| h.running() > 0)
    }

    pub fn last_scan_at(&self) -> Option<DateTime<Utc>> {
        self.scheduler.last_scan_at()
    }

    pub fn scan_metrics(&self) -> ScanMetrics {
        self.scheduler.metrics()
    }

    // ── Alerts ───────────────────────────────────────────────

    pub fn alerts(&self, query: &AlertQuery) -> Vec<Alert> {
        self.alerts.query(query)
    }

    pub fn alert(&self, id: AlertId) -> Result<Alert> {
        self.alerts
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("alert {id}")))
    }

    pub fn counts(&self) -> AlertCounts {
        self.alerts.counts()
    }

    /// No-op for unknown ids. Returns whether the alert exists.
    pub fn mark_read(&self, id: AlertId) -> Result<bool> {
        self.alerts.mark_read(id)
    }

    /// No-op for unknown ids. Returns whether the alert exists.
    pub fn mark_resolved(&self, id: AlertId) -> Result<bool> {
        self.alerts.mark_resolved(id)
    }

    pub fn mark_all_read(&self) -> Result<usize> {
        self.alerts.mark_all_read()
    }

    pub fn delete_alert(&self, id: AlertId) -> Result<bool> {
        self.alerts.delete(id)
    }

    /// Drop resolved alerts older than the configured retention.
    pub fn purge_resolved(&self) -> Result<usize> {
        let cutoff = self.clock.now() - self.resolved_retention;
        self.alerts.purge_resolved(cutoff)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.alerts.subscribe()
    }

    /// Stop timers before the process exits. Writes are synchronous, so
    /// nothing else needs flushing.
    pub async fn shutdown(&self) {
        self.stop_scheduler().await;
        debug!("monitor shut down");
    }
}
