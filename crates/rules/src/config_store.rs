//! Per-category rule thresholds with reset-to-defaults.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use bialarm_core::{Category, Error, RuleConfig};
use bialarm_storage::{load_json, save_json, KeyValueStore};

const THRESHOLDS_KEY: &str = "rules/thresholds";

/// Rule Configuration: the active threshold map and the defaults a reset
/// restores.
pub struct RuleConfigStore {
    backend: Arc<dyn KeyValueStore>,
    defaults: BTreeMap<Category, RuleConfig>,
    configs: RwLock<BTreeMap<Category, RuleConfig>>,
}

impl RuleConfigStore {
    /// Load persisted thresholds, or start from `defaults` if none were saved.
    ///
    /// Persisted entries that no longer validate are dropped with a warning.
    pub fn open(
        backend: Arc<dyn KeyValueStore>,
        defaults: BTreeMap<Category, RuleConfig>,
    ) -> Result<Self, Error> {
        let configs = match load_json::<BTreeMap<Category, RuleConfig>>(backend.as_ref(), THRESHOLDS_KEY)? {
            Some(mut saved) => {
                saved.retain(|category, config| match config.validate() {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(category = %category, error = %e, "dropping invalid persisted rule");
                        false
                    }
                });
                saved
            }
            None => defaults.clone(),
        };
        debug!(categories = configs.len(), "rule configuration loaded");
        Ok(Self {
            backend,
            defaults,
            configs: RwLock::new(configs),
        })
    }

    pub fn get(&self, category: &Category) -> Option<RuleConfig> {
        let guard = self.configs.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(category).copied()
    }

    /// Validate and store thresholds for one category.
    pub fn set(&self, category: &Category, config: RuleConfig) -> Result<(), Error> {
        config.validate()?;
        let mut guard = self.configs.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        next.insert(category.clone(), config);
        save_json(self.backend.as_ref(), THRESHOLDS_KEY, &next)?;
        *guard = next;
        info!(
            category = %category,
            min = config.min_threshold,
            max = config.max_threshold,
            change_limit = config.percent_change_limit,
            "rule config saved"
        );
        Ok(())
    }

    /// Replace every threshold with the defaults. Idempotent.
    pub fn reset_to_defaults(&self) -> Result<(), Error> {
        let mut guard = self.configs.write().unwrap_or_else(PoisonError::into_inner);
        save_json(self.backend.as_ref(), THRESHOLDS_KEY, &self.defaults)?;
        *guard = self.defaults.clone();
        info!(categories = self.defaults.len(), "rule config reset to defaults");
        Ok(())
    }

    /// Snapshot of every configured category.
    pub fn all(&self) -> BTreeMap<Category, RuleConfig> {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn defaults(&self) -> &BTreeMap<Category, RuleConfig> {
        &self.defaults
    }
}
