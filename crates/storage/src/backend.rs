use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use bialarm_core::PersistenceError;

/// Persistence boundary injected into every store.
///
/// Values are opaque bytes; the stores encode them as JSON.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    fn set(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError>;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str;
}

/// Read and decode a JSON value, `None` when the key was never written.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, PersistenceError> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON value.
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), PersistenceError> {
    let bytes = serde_json::to_vec(value)?;
    store.set(key, &bytes)
}

// ── In-memory ────────────────────────────────────────────────────────

/// Process-local backend; contents vanish on drop.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError> {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ── Local filesystem ─────────────────────────────────────────────────

/// One JSON file per key under `data_dir`, replaced atomically on write.
pub struct LocalBackend {
    pub data_dir: PathBuf,
}

impl LocalBackend {
    pub fn new(data_dir: &Path) -> Result<Self, PersistenceError> {
        std::fs::create_dir_all(data_dir)?;
        let canonical = std::fs::canonicalize(data_dir).unwrap_or_else(|_| data_dir.to_path_buf());
        info!("Storage: local backend at {}", canonical.display());
        Ok(Self {
            data_dir: canonical,
        })
    }

    /// Map a key like `series/sales` to `<data_dir>/series/sales.json`.
    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !key.is_empty()
            && key.split('/').all(|segment| {
                !segment.is_empty()
                    && segment != "."
                    && segment != ".."
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            });
        if !valid {
            return Err(PersistenceError::Backend {
                key: key.to_string(),
                message: "key contains unsupported characters".to_string(),
            });
        }
        Ok(self.data_dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for LocalBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::Io(e)),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        debug!(key, bytes = value.len(), "persisted");
        Ok(())
    }

    fn name(&self) -> &str {
        "local"
    }
}
