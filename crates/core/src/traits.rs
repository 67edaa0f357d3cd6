//! Storage engine contracts
//!
//! The retry engine consumes a storage engine only through these two
//! traits. Implementations report failures as tagged `StoreError`s so that
//! conflict classification never depends on message text.

use crate::entity::Entity;
use crate::error::StoreResult;
use crate::types::{EntityId, LockMode, TableRef};

/// Factory for storage sessions
///
/// One instance is shared by every transaction manager that targets the
/// same logical store. Thread safety: `open_session` may be called
/// concurrently from multiple threads.
pub trait Storage: Send + Sync {
    /// Session type produced by this storage
    type Session: Session;

    /// Open a new session
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot allocate a session.
    fn open_session(&self) -> StoreResult<Self::Session>;
}

/// A connection-like handle owned by exactly one transaction context
///
/// Row operations require an active transaction. Writes are staged until
/// `flush` (or `commit`, which flushes first), so conflicts surface at a
/// point chosen by the caller.
pub trait Session: Send {
    /// Start a transaction; no-op if one is already active
    fn begin_transaction(&mut self) -> StoreResult<()>;

    /// Whether a transaction is active
    fn is_active(&self) -> bool;

    /// Flush staged writes and make the transaction's effects visible
    ///
    /// # Errors
    ///
    /// A flush failure rolls the transaction back and is reported as
    /// `StoreError::RolledBack`.
    fn commit(&mut self) -> StoreResult<()>;

    /// Discard the transaction's effects and release its locks
    fn rollback(&mut self) -> StoreResult<()>;

    /// Release the session; an active transaction is rolled back
    fn close(&mut self) -> StoreResult<()>;

    /// Look up a row under the requested lock mode
    ///
    /// `Shared`/`Exclusive` may block until the lock is granted or the lock
    /// timeout elapses.
    fn find(&mut self, table: TableRef, id: EntityId, mode: LockMode)
        -> StoreResult<Option<Entity>>;

    /// Stage an insert and return the identifier assigned to it
    fn create(&mut self, table: TableRef, entity: &Entity) -> StoreResult<EntityId>;

    /// Stage an update of an existing row
    fn update(&mut self, table: TableRef, entity: &Entity) -> StoreResult<()>;

    /// Stage a delete of an existing row
    fn delete(&mut self, table: TableRef, entity: &Entity) -> StoreResult<()>;

    /// Apply staged writes now, surfacing constraint and version conflicts
    fn flush(&mut self) -> StoreResult<()>;

    /// Re-read a row as this transaction currently sees it, without locking
    fn reload(&mut self, table: TableRef, id: EntityId) -> StoreResult<Option<Entity>>;
}
