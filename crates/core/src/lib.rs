//! Shared data model for business-metric anomaly alerting.
//!
//! Observations, per-category rule thresholds, alerts, the error taxonomy,
//! env-driven configuration and an injectable clock.

pub mod alert;
pub mod category;
pub mod clock;
pub mod config;
pub mod error;
pub mod observation;
pub mod rule;

pub use alert::*;
pub use category::Category;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::Config;
pub use error::*;
pub use observation::*;
pub use rule::RuleConfig;
