//! Retry configuration
//!
//! Controls how many times a unit of work is attempted and how long the
//! coordinator waits between attempts that back off.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for unit-of-work retry behavior
///
/// # Example
/// ```ignore
/// let config = RetryConfig::new()
///     .with_max_attempts(5)
///     .with_base_delay_ms(10)
///     .with_max_delay_ms(200);
/// let manager = TxManager::with_config(storage, config);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first (values below 1 act as 1)
    pub max_attempts: u32,
    /// Base delay between retries in milliseconds (exponential backoff)
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
        }
    }
}

impl RetryConfig {
    /// Create a new RetryConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a RetryConfig that runs a unit of work exactly once
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Set maximum number of attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set base delay for exponential backoff
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set maximum delay between retries
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Number of attempts actually granted
    pub fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Calculate delay after the given failed attempt (0-based, exponential backoff)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        // Saturates instead of wrapping; the cap below bounds it anyway
        let delay_ms = self.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}
