//! Layered configuration for the store and logging.
//!
//! Sources, lowest precedence first: built-in defaults, an optional config
//! file, then `ONRAMP__`-prefixed environment variables
//! (e.g. `ONRAMP__STORE__BUSY_TIMEOUT_MS=2000`).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// SQLite database file. `None` selects an in-memory database.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files. Logging stays off when unset.
    #[serde(default)]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CoreConfig {
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Loads configuration from defaults, `file` (any format the `config`
    /// crate recognises by extension) and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("store.busy_timeout_ms", 5_000_i64)?
            .set_default("logging.level", crate::logging::default_log_level())?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .add_source(Environment::with_prefix("ONRAMP").separator("__"))
            .build()?
            .try_deserialize()
    }
}
