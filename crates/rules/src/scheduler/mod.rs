//! Scan scheduling: one scan at a time, on demand or on a timer.
//!
//! [`ScanScheduler`] owns the `Idle -> Scanning -> Idle` state machine. A
//! request that arrives while a scan is running is coalesced into exactly one
//! trailing scan. [`ScanScheduler::start`] drives it from tokio intervals.

mod core;
mod metrics;
mod timer;

#[cfg(test)]
mod tests;

pub use self::core::{ScanOutcome, ScanPhase, ScanReport, ScanScheduler};
pub use self::metrics::ScanMetrics;
pub use self::timer::{ScanSchedule, SchedulerHandle};
