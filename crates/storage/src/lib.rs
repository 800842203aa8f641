//! Persistence for the alerting core.
//!
//! Everything durable goes through the [`KeyValueStore`] boundary: the
//! per-category observation series and the alert history are both JSON
//! values under stable keys.

pub mod alerts;
pub mod backend;
pub mod series;

use std::sync::Arc;

use tracing::info;

use bialarm_core::config::StorageConfig;
use bialarm_core::PersistenceError;

pub use alerts::{AlertCounts, AlertQuery, AlertStore, AlertStoreConfig};
pub use backend::{load_json, save_json, KeyValueStore, LocalBackend, MemoryBackend};
pub use series::SeriesStore;

/// Select a backend from config: `memory` keeps everything in-process,
/// anything else persists to files under `data_dir`.
pub fn open_backend(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>, PersistenceError> {
    if config.is_in_memory() {
        info!("Storage: in-memory backend (nothing is persisted)");
        return Ok(Arc::new(MemoryBackend::new()));
    }
    Ok(Arc::new(LocalBackend::new(&config.data_dir)?))
}
