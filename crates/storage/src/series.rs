//! Append-only, date-ordered observation history per category.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use bialarm_core::{Category, Error, NewObservation, Observation};

use crate::backend::{load_json, save_json, KeyValueStore};

const INDEX_KEY: &str = "series_index";

fn series_key(category: &Category) -> String {
    format!("series/{}", category)
}

/// Per-category observation sequences, each kept sorted by date.
///
/// Equal dates keep their insertion order. Persistence happens before the
/// in-memory copy changes, so a failed write leaves the store untouched.
pub struct SeriesStore {
    backend: Arc<dyn KeyValueStore>,
    series: RwLock<BTreeMap<Category, Vec<Observation>>>,
}

impl SeriesStore {
    /// Open the store, loading every category listed in the persisted index.
    pub fn open(backend: Arc<dyn KeyValueStore>) -> Result<Self, Error> {
        let index: BTreeSet<Category> = load_json(backend.as_ref(), INDEX_KEY)?.unwrap_or_default();
        let mut series = BTreeMap::new();
        for category in index {
            let mut observations: Vec<Observation> =
                load_json(backend.as_ref(), &series_key(&category))?.unwrap_or_default();
            // Stable sort repairs hand-edited files without reordering equal dates.
            observations.sort_by_key(|o| o.date);
            series.insert(category, observations);
        }
        debug!(
            backend = backend.name(),
            categories = series.len(),
            "series store opened"
        );
        Ok(Self {
            backend,
            series: RwLock::new(series),
        })
    }

    /// Validate, stamp and insert an observation in date order.
    pub fn append(&self, category: &Category, input: NewObservation) -> Result<Observation, Error> {
        let observation = input.into_observation(category.clone())?;

        let mut guard = self.series.write().unwrap_or_else(PoisonError::into_inner);
        let is_new_category = !guard.contains_key(category);

        let mut updated = guard.get(category).cloned().unwrap_or_default();
        let pos = updated.partition_point(|o| o.date <= observation.date);
        updated.insert(pos, observation.clone());

        // Index first: an indexed category with no series file loads as empty.
        if is_new_category {
            let mut index: BTreeSet<&Category> = guard.keys().collect();
            index.insert(category);
            save_json(self.backend.as_ref(), INDEX_KEY, &index)?;
        }
        save_json(self.backend.as_ref(), &series_key(category), &updated)?;
        guard.insert(category.clone(), updated);

        debug!(
            category = %category,
            id = %observation.id,
            date = %observation.date,
            value = observation.value,
            "observation stored"
        );
        Ok(observation)
    }

    /// Most recent and second most recent observation, by date.
    pub fn latest_two(&self, category: &Category) -> (Option<Observation>, Option<Observation>) {
        let guard = self.series.read().unwrap_or_else(PoisonError::into_inner);
        let Some(observations) = guard.get(category) else {
            return (None, None);
        };
        let mut newest_first = observations.iter().rev();
        (newest_first.next().cloned(), newest_first.next().cloned())
    }

    /// Full ordered history for reporting.
    pub fn all(&self, category: &Category) -> Vec<Observation> {
        let guard = self.series.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(category).cloned().unwrap_or_default()
    }

    /// Categories that hold at least one observation.
    pub fn categories(&self) -> Vec<Category> {
        let guard = self.series.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .iter()
            .filter(|(_, obs)| !obs.is_empty())
            .map(|(c, _)| c.clone())
            .collect()
    }

    /// Total observations across all categories.
    pub fn len(&self) -> usize {
        let guard = self.series.read().unwrap_or_else(PoisonError::into_inner);
        guard.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
