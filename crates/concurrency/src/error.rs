//! Terminal error returned by `TxManager`
//!
//! `ExecuteError` is opaque: callers learn how many attempts ran, whether
//! the retry budget ran out, and the failure message. The original
//! `TxError` is only reachable through `std::error::Error::source`.

use retrytx_core::TxError;
use thiserror::Error;

/// A unit of work failed for good
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExecuteError {
    attempts: u32,
    exhausted: bool,
    message: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl ExecuteError {
    pub(crate) fn fatal(attempts: u32, error: TxError) -> Self {
        Self {
            attempts,
            exhausted: false,
            message: format!("unit of work failed: {}", error),
            source: Box::new(error),
        }
    }

    pub(crate) fn exhausted(attempts: u32, error: TxError) -> Self {
        Self {
            attempts,
            exhausted: true,
            message: format!("unit of work failed after {} attempts: {}", attempts, error),
            source: Box::new(error),
        }
    }

    /// Number of attempts that ran
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the last failure was retryable but no attempts were left
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Failure message
    pub fn message(&self) -> &str {
        &self.message
    }
}
