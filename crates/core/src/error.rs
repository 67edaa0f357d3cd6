//! Error types for retrytx
//!
//! Two layers, both built with `thiserror`:
//! - `StoreError`: tagged failures reported by a storage engine adapter.
//!   Retry decisions switch on the tag, never on message text.
//! - `TxError`: failures seen by a unit of work. Adds the domain-level
//!   signals raised by repositories and application code.

use crate::types::{EntityId, LockMode};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for unit-of-work operations
pub type TxResult<T> = std::result::Result<T, TxError>;

/// Failures reported by the storage engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Insert hit an existing row with the same identifier
    #[error("duplicate key {id} in table {table}")]
    DuplicateKey {
        /// Table name
        table: String,
        /// Clashing identifier
        id: EntityId,
    },

    /// Insert violated a unique constraint other than the identifier
    #[error("unique constraint {constraint} violated in table {table}")]
    ConstraintViolation {
        /// Table name
        table: String,
        /// Constraint name
        constraint: String,
        /// Identifier of the row being inserted
        id: EntityId,
    },

    /// Submitted version does not match the stored one
    ///
    /// `found` is `None` when the row no longer exists.
    #[error("version conflict on {table}#{id}: expected {expected:?}, found {found:?}")]
    VersionConflict {
        /// Table name
        table: String,
        /// Row identifier
        id: EntityId,
        /// Version carried by the submitted entity
        expected: Option<u32>,
        /// Version currently stored
        found: Option<u32>,
    },

    /// Row lock was not granted within the lock timeout
    #[error("timed out after {waited:?} waiting for {mode} lock on {table}#{id}")]
    LockTimeout {
        /// Table name
        table: String,
        /// Row identifier
        id: EntityId,
        /// Requested lock mode
        mode: LockMode,
        /// Time spent waiting
        waited: Duration,
    },

    /// Lock request would deadlock with another transaction
    #[error("deadlock detected acquiring {mode} lock on {table}#{id}")]
    Deadlock {
        /// Table name
        table: String,
        /// Row identifier
        id: EntityId,
        /// Requested lock mode
        mode: LockMode,
    },

    /// Target row does not exist
    #[error("row {table}#{id} not found")]
    NotFound {
        /// Table name
        table: String,
        /// Row identifier
        id: EntityId,
    },

    /// The transaction was rolled back because of the wrapped failure
    #[error("transaction rolled back: {0}")]
    RolledBack(Box<StoreError>),

    /// Operation not supported for this table or mode
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Operation requires an active transaction
    #[error("no active transaction")]
    NoActiveTransaction,

    /// Session has been closed
    #[error("session closed")]
    SessionClosed,

    /// Any other engine failure
    #[error("storage error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Unwrap `RolledBack` layers down to the originating failure
    pub fn root_cause(&self) -> &StoreError {
        let mut current = self;
        while let StoreError::RolledBack(inner) = current {
            current = inner;
        }
        current
    }

    /// Whether this is an insert-time uniqueness failure of any kind
    pub fn is_insert_constraint_violation(&self) -> bool {
        matches!(
            self.root_cause(),
            StoreError::DuplicateKey { .. } | StoreError::ConstraintViolation { .. }
        )
    }
}

/// Failures seen by a unit of work
#[derive(Debug, Error)]
pub enum TxError {
    /// A different row already occupies the generated identifier
    #[error("entity {id} already exists in {table}")]
    AlreadyExists {
        /// Table name
        table: String,
        /// Clashing identifier
        id: EntityId,
        /// Storage failure that revealed the clash
        #[source]
        source: StoreError,
    },

    /// Target entity does not exist
    #[error("entity {id} not found in {table}")]
    NotFound {
        /// Table name
        table: String,
        /// Requested identifier
        id: EntityId,
    },

    /// Unit of work deliberately aborted the transaction
    #[error("transaction aborted: {reason}")]
    Aborted {
        /// Human-readable reason for abort
        reason: String,
    },

    /// Storage failure passed through unchanged
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TxError {
    /// Create a business abort
    pub fn aborted(reason: impl Into<String>) -> Self {
        TxError::Aborted {
            reason: reason.into(),
        }
    }

    /// Create a not-found failure
    pub fn not_found(table: impl Into<String>, id: EntityId) -> Self {
        TxError::NotFound {
            table: table.into(),
            id,
        }
    }

    /// Whether this failure signals an absent row
    pub fn is_not_found(&self) -> bool {
        match self {
            TxError::NotFound { .. } => true,
            TxError::Store(e) => matches!(e.root_cause(), StoreError::NotFound { .. }),
            _ => false,
        }
    }
}
