//! Configuration: the persisted settings store, the reconciler that heals
//! it against the catalogue, and the immutable run config.

mod log_config;
mod reconciler;
mod store;

pub use log_config::LogConfig;
pub use reconciler::ConfigReconciler;
pub use store::{ConfigError, JsonSettingsStore, MemoryStore, SettingsStore};
