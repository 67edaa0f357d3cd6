//! Conflict classification
//!
//! Decides whether a failed attempt should be retried. Decisions switch on
//! the failure's tag only. `RolledBack` wrappers are looked through at any
//! depth, so a conflict reported at commit time classifies the same as one
//! reported at flush time.

use retrytx_core::{StoreError, TxError};
use std::fmt;

/// Why a failure is worth another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryReason {
    /// A generated identifier collided with an existing row
    IdentifierCollision,
    /// Optimistic version check failed
    VersionConflict,
    /// Lock wait timed out or would have deadlocked
    LockConflict,
}

impl RetryReason {
    /// Whether the coordinator should back off before retrying
    ///
    /// A fresh identifier is drawn on the next attempt, so identifier
    /// collisions retry immediately.
    pub fn uses_backoff(&self) -> bool {
        !matches!(self, RetryReason::IdentifierCollision)
    }
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryReason::IdentifierCollision => write!(f, "identifier collision"),
            RetryReason::VersionConflict => write!(f, "version conflict"),
            RetryReason::LockConflict => write!(f, "lock conflict"),
        }
    }
}

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Roll back and run the unit of work again
    Retryable(RetryReason),
    /// Roll back and give up
    Fatal,
}

impl Verdict {
    /// Whether this verdict allows a retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Verdict::Retryable(_))
    }
}

/// Classify a unit-of-work failure
pub fn classify(error: &TxError) -> Verdict {
    match error {
        TxError::AlreadyExists { .. } => Verdict::Retryable(RetryReason::IdentifierCollision),
        TxError::Store(e) => classify_store(e),
        TxError::NotFound { .. } | TxError::Aborted { .. } => Verdict::Fatal,
    }
}

/// Classify a storage failure
pub fn classify_store(error: &StoreError) -> Verdict {
    match error.root_cause() {
        StoreError::VersionConflict { .. } => Verdict::Retryable(RetryReason::VersionConflict),
        StoreError::LockTimeout { .. } | StoreError::Deadlock { .. } => {
            Verdict::Retryable(RetryReason::LockConflict)
        }
        _ => Verdict::Fatal,
    }
}
