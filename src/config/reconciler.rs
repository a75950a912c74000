//! Reconciliation of the persisted settings store against the catalogue.
//!
//! The schema may grow without breaking existing installs: missing keys are
//! created with their default, existing values are never touched, and stale
//! keys stay on disk but are filtered out of the sampling views.

use crate::catalog::{self, CATALOG, MetricKey};
use crate::config::store::{ConfigError, SettingsStore};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Default for a key the store has never seen.
const DEFAULT_ENABLED: bool = true;

/// Heals and queries a [`SettingsStore`] against the fixed catalogue.
pub struct ConfigReconciler<S: SettingsStore> {
    store: S,
}

impl<S: SettingsStore> ConfigReconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Inserts every catalogue key missing from the store with its default,
    /// persisting each insertion immediately so a crash mid-reconciliation
    /// leaves the keys created so far intact. Existing values are never
    /// overwritten. Returns the number of keys created.
    pub fn reconcile(&mut self) -> Result<usize, ConfigError> {
        let existing = self.load_lenient();
        let mut created = 0;

        for desc in &CATALOG {
            let key = desc.key.as_str();
            if !existing.contains_key(key) {
                self.store.save(key, DEFAULT_ENABLED)?;
                created += 1;
            }
        }

        if created > 0 {
            info!("settings healed: {created} keys created with defaults");
        }
        Ok(created)
    }

    /// A corrupt or unreadable store is reported and treated as empty,
    /// which makes reconciliation rebuild it from defaults.
    fn load_lenient(&self) -> BTreeMap<String, bool> {
        match self.store.load() {
            Ok(map) => map,
            Err(e) => {
                warn!("settings store unreadable, treating as empty: {e}");
                BTreeMap::new()
            }
        }
    }

    fn view(&self, keys: impl Iterator<Item = MetricKey>) -> Vec<(MetricKey, bool)> {
        let stored = self.load_lenient();
        keys.map(|key| {
            let enabled = stored
                .get(key.as_str())
                .copied()
                .unwrap_or(DEFAULT_ENABLED);
            (key, enabled)
        })
        .collect()
    }

    /// The system partition in catalogue order. Stored keys outside the
    /// catalogue are ignored here even though they remain on disk.
    pub fn system_metrics(&self) -> Vec<(MetricKey, bool)> {
        self.view(catalog::system_keys())
    }

    /// The monitored-process partition in catalogue order.
    pub fn process_metrics(&self) -> Vec<(MetricKey, bool)> {
        self.view(catalog::process_keys())
    }

    /// Sets one key, persisting synchronously.
    pub fn set(&mut self, key: MetricKey, enabled: bool) -> Result<(), ConfigError> {
        self.store.save(key.as_str(), enabled)
    }

    /// Removes one stored key (catalogue or stale), persisting
    /// synchronously. A missing key is a hard [`ConfigError::KeyNotFound`].
    pub fn remove(&mut self, key: &str) -> Result<(), ConfigError> {
        self.store.delete(key)
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
