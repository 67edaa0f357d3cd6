//! Storage engine configuration
//!
//! Deserialized from the `[storage]` section of `retrytx.toml`.

use crate::ids::{IdGenerator, RandomIds, SequentialIds};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time a lock request waits before failing with `LockTimeout`
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 10_000;

/// How the engine assigns identifiers to new rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdStrategy {
    /// Monotonic identifiers starting at 1; never collide
    #[default]
    Sequential,
    /// Uniformly random identifiers in `1..=max`; may collide
    Random {
        /// Largest identifier that may be generated
        max: u64,
    },
}

impl IdStrategy {
    /// Build the generator for this strategy
    pub fn build(&self) -> Box<dyn IdGenerator> {
        match *self {
            IdStrategy::Sequential => Box::new(SequentialIds::new()),
            IdStrategy::Random { max } => Box::new(RandomIds::new(max)),
        }
    }
}

/// Configuration of the in-memory storage engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Lock wait timeout in milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Identifier generation strategy
    #[serde(default)]
    pub id_strategy: IdStrategy,
    /// Tables whose `content` column carries a unique constraint
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_content_tables: Vec<String>,
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            id_strategy: IdStrategy::default(),
            unique_content_tables: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lock wait timeout
    pub fn with_lock_timeout_ms(mut self, lock_timeout_ms: u64) -> Self {
        self.lock_timeout_ms = lock_timeout_ms;
        self
    }

    /// Set the identifier generation strategy
    pub fn with_id_strategy(mut self, id_strategy: IdStrategy) -> Self {
        self.id_strategy = id_strategy;
        self
    }

    /// Add a unique constraint on the `content` column of `table`
    pub fn with_unique_content(mut self, table: impl Into<String>) -> Self {
        self.unique_content_tables.push(table.into());
        self
    }

    /// Lock wait timeout as a `Duration`
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
