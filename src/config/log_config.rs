//! Run configuration, loaded once at startup.
//!
//! Missing or unparsable config is healed: the file is (re)written with
//! defaults and the run continues. Individual missing fields take their
//! defaults without rewriting the file.

use crate::config::store::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Immutable run settings for the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Output directory. Empty disables file output.
    pub folder_path: String,
    /// Base file name; rotated files are `<timestamp>_<file_name>`.
    pub file_name: String,
    /// Master switch for file output. Sampling continues either way.
    pub write_to_log: bool,
    /// Data rows per file before rotation.
    pub max_records: u32,
    /// Sampling interval in seconds.
    pub interval_secs: u64,
    /// Semicolon-delimited monitored process names.
    pub monitored_processes: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            folder_path: "log".to_string(),
            file_name: "Log.txt".to_string(),
            write_to_log: true,
            max_records: 50,
            interval_secs: 10,
            monitored_processes: "chrome;firefox;iexplore".to_string(),
        }
    }
}

impl LogConfig {
    /// Loads the config file, creating or rewriting it with defaults when
    /// it is missing or unparsable.
    pub fn load_or_create(path: &Path) -> Result<LogConfig, ConfigError> {
        if !path.exists() {
            let config = LogConfig::default();
            Self::write(path, &config)?;
            info!("created default run config at {}", path.display());
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("run config unparsable, rewriting with defaults: {e}");
                let config = LogConfig::default();
                Self::write(path, &config)?;
                Ok(config)
            }
        }
    }

    fn write(path: &Path, config: &LogConfig) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::Corrupt(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Monitored process names in configured order, empty entries skipped.
    pub fn process_names(&self) -> Vec<String> {
        self.monitored_processes
            .split(';')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
