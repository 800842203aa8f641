use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Scan counters exposed for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanMetrics {
    pub scans_completed: u64,
    pub scans_failed: u64,
    /// Requests folded into a trailing scan instead of running their own.
    pub coalesced_requests: u64,
    pub alerts_emitted: u64,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub last_scan_duration: Option<Duration>,
    pub avg_scan_duration: Duration,
}

impl ScanMetrics {
    /// Record a committed scan.
    pub fn record_scan(&mut self, at: DateTime<Utc>, duration: Duration, alerts: usize) {
        self.scans_completed += 1;
        self.alerts_emitted += alerts as u64;
        self.last_scan_at = Some(at);
        self.last_scan_duration = Some(duration);

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        self.avg_scan_duration = if self.scans_completed == 1 {
            duration
        } else {
            let prev = self.avg_scan_duration.as_nanos() as f64;
            let cur = duration.as_nanos() as f64;
            let avg = prev + (cur - prev) / self.scans_completed as f64;
            Duration::from_nanos(avg as u64)
        };
    }

    pub fn record_failure(&mut self) {
        self.scans_failed += 1;
    }

    pub fn record_coalesced(&mut self) {
        self.coalesced_requests += 1;
    }
}
