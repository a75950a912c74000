//! Persisted metric enable/disable settings.
//!
//! The store is a flat key-to-bool mapping. The JSON implementation keeps
//! unknown keys on disk untouched; filtering stale keys out of sampling is
//! the reconciler's job, not the store's.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Configuration errors, from storage trouble to explicit misuse.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    /// The persisted store exists but cannot be parsed.
    Corrupt(String),
    /// An explicit mutation named a key that does not exist.
    KeyNotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Corrupt(msg) => write!(f, "store is corrupt: {}", msg),
            ConfigError::KeyNotFound(key) => write!(f, "no such key: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

/// Boundary to the persisted key-to-enabled mapping.
pub trait SettingsStore {
    /// Loads the full mapping. A missing store is empty, not an error.
    fn load(&self) -> Result<BTreeMap<String, bool>, ConfigError>;

    /// Inserts or overwrites one key, persisting synchronously.
    fn save(&mut self, key: &str, enabled: bool) -> Result<(), ConfigError>;

    /// Removes one key, persisting synchronously. Fails with
    /// [`ConfigError::KeyNotFound`] if the key is absent.
    fn delete(&mut self, key: &str) -> Result<(), ConfigError>;

    /// Number of persisted keys.
    fn count(&self) -> Result<usize, ConfigError> {
        Ok(self.load()?.len())
    }
}

/// Settings persisted as a flat JSON object.
#[derive(Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, bool>, ConfigError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| ConfigError::Corrupt(e.to_string()))
    }

    fn write_map(&self, map: &BTreeMap<String, bool>) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let content =
            serde_json::to_string_pretty(map).map_err(|e| ConfigError::Corrupt(e.to_string()))?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Result<BTreeMap<String, bool>, ConfigError> {
        self.read_map()
    }

    fn save(&mut self, key: &str, enabled: bool) -> Result<(), ConfigError> {
        // A corrupt store is abandoned on the first write: healing starts
        // from an empty mapping rather than failing every save.
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(ConfigError::Corrupt(_)) => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        map.insert(key.to_string(), enabled);
        self.write_map(&map)
    }

    fn delete(&mut self, key: &str) -> Result<(), ConfigError> {
        let mut map = self.read_map()?;
        if map.remove(key).is_none() {
            return Err(ConfigError::KeyNotFound(key.to_string()));
        }
        self.write_map(&map)
    }
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: BTreeMap<String, bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: &[(&str, bool)]) -> Self {
        Self {
            map: entries
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<BTreeMap<String, bool>, ConfigError> {
        Ok(self.map.clone())
    }

    fn save(&mut self, key: &str, enabled: bool) -> Result<(), ConfigError> {
        self.map.insert(key.to_string(), enabled);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), ConfigError> {
        if self.map.remove(key).is_none() {
            return Err(ConfigError::KeyNotFound(key.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = JsonSettingsStore::new(dir.path().join("settings.json"));
        assert!(store.load().unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let mut store = JsonSettingsStore::new(dir.path().join("settings.json"));

        store.save("CPUProcessorTime", true).unwrap();
        store.save("MEMAvailable", false).unwrap();

        let map = store.load().unwrap();
        assert_eq!(map.get("CPUProcessorTime"), Some(&true));
        assert_eq!(map.get("MEMAvailable"), Some(&false));
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_save_overwrites_value() {
        let dir = tempdir().unwrap();
        let mut store = JsonSettingsStore::new(dir.path().join("settings.json"));
        store.save("PageFile", true).unwrap();
        store.save("PageFile", false).unwrap();
        assert_eq!(store.load().unwrap().get("PageFile"), Some(&false));
    }

    #[test]
    fn test_delete_missing_key_is_not_found() {
        let dir = tempdir().unwrap();
        let mut store = JsonSettingsStore::new(dir.path().join("settings.json"));
        store.save("PageFile", true).unwrap();

        match store.delete("NoSuchKey") {
            Err(ConfigError::KeyNotFound(key)) => assert_eq!(key, "NoSuchKey"),
            other => panic!("expected KeyNotFound, got {other:?}"),
        }

        store.delete("PageFile").unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_corrupt_file_reported_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let store = JsonSettingsStore::new(&path);

        match store.load() {
            Err(ConfigError::Corrupt(_)) => {}
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[test]
    fn test_save_replaces_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let mut store = JsonSettingsStore::new(&path);

        store.save("PageFile", true).unwrap();
        let map = store.load().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("PageFile"), Some(&true));
    }

    #[test]
    fn test_empty_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "").unwrap();
        let store = JsonSettingsStore::new(&path);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/conf/settings.json");
        let mut store = JsonSettingsStore::new(&path);
        store.save("PageFile", true).unwrap();
        assert!(path.exists());
    }
}
