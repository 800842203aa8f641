//! Business-metric anomaly detection.
//!
//! This crate provides:
//! - Per-category rule thresholds with reset-to-defaults
//! - YAML rule file for default thresholds and severity policy
//! - Detection over the latest observation pair (thresholds, step change, defect rate)
//! - Serialized, coalescing scans on demand or on tokio timers
//! - The [`Monitor`] facade tying series, rules, alerts and scans together

pub mod config_store;
pub mod defaults;
pub mod error;
pub mod evaluator;
pub mod loader;
pub mod scheduler;
pub mod service;
pub mod severity;

pub use config_store::RuleConfigStore;
pub use error::{RuleError, ScanError};
pub use evaluator::DetectionEngine;
pub use loader::RuleFile;
pub use scheduler::{ScanMetrics, ScanOutcome, ScanPhase, ScanReport, ScanSchedule, ScanScheduler};
pub use service::{Monitor, MonitorBuilder};
pub use severity::{SeverityPolicy, SeverityRules};
