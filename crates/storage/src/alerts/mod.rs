//! Alert Store: bounded, persisted, most-recent-first alert history.

mod query;
mod store;


pub use query::{AlertCounts, AlertQuery};
pub use store::{AlertStore, AlertStoreConfig};
