//! Serialized, coalescing scan execution.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use bialarm_core::{Alert, SharedClock};
use bialarm_storage::AlertStore;

use crate::error::ScanError;
use crate::evaluator::DetectionEngine;

use super::metrics::ScanMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    Idle,
    Scanning,
}

#[derive(Debug)]
struct ScanState {
    phase: ScanPhase,
    /// A request arrived while scanning; run once more before going idle.
    pending: bool,
}

/// Alerts committed by one `run_scan` call.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Every alert committed, including those of coalesced trailing scans.
    pub alerts: Vec<Alert>,
    /// Scans executed by this call (1 + trailing scans).
    pub scans: usize,
    pub started_at: DateTime<Utc>,
}

/// Result of a scan request.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Completed(ScanReport),
    /// Another caller is scanning and will run one more scan on our behalf.
    Coalesced,
}

impl ScanOutcome {
    /// Alerts committed by this call; empty when coalesced.
    pub fn alerts(&self) -> &[Alert] {
        match self {
            ScanOutcome::Completed(report) => &report.alerts,
            ScanOutcome::Coalesced => &[],
        }
    }

    pub fn into_alerts(self) -> Vec<Alert> {
        match self {
            ScanOutcome::Completed(report) => report.alerts,
            ScanOutcome::Coalesced => Vec::new(),
        }
    }
}

/// Returns the state machine to `Idle` if a scan unwinds.
struct UnwindGuard<'a> {
    state: &'a Mutex<ScanState>,
}

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            st.phase = ScanPhase::Idle;
            st.pending = false;
        }
    }
}

/// Runs the Detection Engine over every configured category and commits the
/// resulting drafts to the Alert Store as one batch.
pub struct ScanScheduler {
    engine: Arc<DetectionEngine>,
    alerts: Arc<AlertStore>,
    clock: SharedClock,
    state: Mutex<ScanState>,
    metrics: Mutex<ScanMetrics>,
}

impl ScanScheduler {
    pub fn new(engine: Arc<DetectionEngine>, alerts: Arc<AlertStore>, clock: SharedClock) -> Self {
        Self {
            engine,
            alerts,
            clock,
            state: Mutex::new(ScanState {
                phase: ScanPhase::Idle,
                pending: false,
            }),
            metrics: Mutex::new(ScanMetrics::default()),
        }
    }

    /// Run a scan now, or coalesce into the one in flight.
    ///
    /// A failed commit returns the computed drafts in [`ScanError::Commit`]
    /// together with the alerts earlier scans of this call already recorded.
    /// Nothing from the failed scan is recorded and any pending trailing
    /// request is dropped.
    pub fn run_scan(&self) -> Result<ScanOutcome, ScanError> {
        {
            let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if st.phase == ScanPhase::Scanning {
                st.pending = true;
                self.with_metrics(ScanMetrics::record_coalesced);
                debug!("scan in progress, request coalesced");
                return Ok(ScanOutcome::Coalesced);
            }
            st.phase = ScanPhase::Scanning;
        }
        let _guard = UnwindGuard { state: &self.state };

        let started_at = self.clock.now();
        let mut report = ScanReport {
            alerts: Vec::new(),
            scans: 0,
            started_at,
        };

        loop {
            let result = self.scan_once();

            // Phase changes and the pending check share one critical section
            // so a request arriving right now is either coalesced or sees Idle.
            let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match result {
                Ok(committed) => {
                    report.alerts.extend(committed);
                    report.scans += 1;
                }
                Err(ScanError::Commit { alerts, source, .. }) => {
                    st.phase = ScanPhase::Idle;
                    st.pending = false;
                    return Err(ScanError::Commit {
                        alerts,
                        committed: report.alerts,
                        source,
                    });
                }
            }
            if !st.pending {
                st.phase = ScanPhase::Idle;
                break;
            }
            st.pending = false;
            debug!("running trailing scan for coalesced request");
        }

        Ok(ScanOutcome::Completed(report))
    }

    fn scan_once(&self) -> Result<Vec<Alert>, ScanError> {
        let at = self.clock.now();
        let timer = Instant::now();

        let drafts = self.engine.evaluate_all();
        let committed = match self.alerts.commit_batch(drafts.clone()) {
            Ok(committed) => committed,
            Err(source) => {
                self.with_metrics(ScanMetrics::record_failure);
                error!(error = %source, drafts = drafts.len(), "scan commit failed");
                return Err(ScanError::Commit {
                    alerts: drafts,
                    committed: Vec::new(),
                    source,
                });
            }
        };

        let elapsed = timer.elapsed();
        self.with_metrics(|m| m.record_scan(at, elapsed, committed.len()));
        info!(
            drafts = drafts.len(),
            alerts = committed.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scan complete"
        );
        Ok(committed)
    }

    fn with_metrics(&self, f: impl FnOnce(&mut ScanMetrics)) {
        let mut m = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut m);
    }

    pub fn phase(&self) -> ScanPhase {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .phase
    }

    pub fn metrics(&self) -> ScanMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start time of the last committed scan.
    pub fn last_scan_at(&self) -> Option<DateTime<Utc>> {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_scan_at
    }
}
