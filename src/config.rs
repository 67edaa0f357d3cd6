//! Configuration via `retrytx.toml`
//!
//! One file carries both the retry policy and the storage engine settings.
//! Every key is optional; missing keys take their defaults.

use retrytx_concurrency::{RetryConfig, TxManager};
use retrytx_storage::{IdStrategy, MemoryStore, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "retrytx.toml";

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// Config text is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid config value for '{key}': {reason}")]
    Invalid {
        /// Offending key
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Top-level configuration loaded from `retrytx.toml`.
///
/// # Example
///
/// ```toml
/// [retry]
/// max_attempts = 3
/// base_delay_ms = 10
/// max_delay_ms = 100
///
/// [storage]
/// lock_timeout_ms = 10000
/// id_strategy = { kind = "random", max = 1000 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Retry policy of the transaction manager
    #[serde(default)]
    pub retry: RetryConfig,
    /// In-memory storage engine settings
    #[serde(default)]
    pub storage: StoreConfig,
}

impl Config {
    /// Parse and validate config text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# retrytx configuration

[retry]
# Attempts per unit of work, including the first one
max_attempts = 3
# Exponential backoff between retries on lock or version conflicts
base_delay_ms = 10
max_delay_ms = 100

[storage]
# How long a row lock request waits before failing (retryable)
lock_timeout_ms = 10000
# Identifier generation: { kind = "sequential" } or { kind = "random", max = N }
id_strategy = { kind = "sequential" }
# Tables whose content column must be unique
# unique_content_tables = ["non_versioned_entity"]
"#
    }

    /// Reject values that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "retry.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid {
                key: "retry.base_delay_ms",
                reason: format!(
                    "{} exceeds max_delay_ms {}",
                    self.retry.base_delay_ms, self.retry.max_delay_ms
                ),
            });
        }
        if let IdStrategy::Random { max: 0 } = self.storage.id_strategy {
            return Err(ConfigError::Invalid {
                key: "storage.id_strategy.max",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Create an empty store with the configured engine settings
    pub fn open_store(&self) -> MemoryStore {
        MemoryStore::with_config(self.storage.clone())
    }

    /// Create a transaction manager over `store` with the configured retry policy
    pub fn manager(&self, store: MemoryStore) -> TxManager<MemoryStore> {
        TxManager::with_config(Arc::new(store), self.retry.clone())
    }
}
