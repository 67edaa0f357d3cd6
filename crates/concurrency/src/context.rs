//! Per-call transaction context
//!
//! A `TxContext` owns at most one storage session for the duration of one
//! `TxManager::execute` call. The session is opened lazily on first use and
//! reused across retry attempts; each attempt runs its own transaction.
//!
//! ## State machine
//!
//! ```text
//! Unopened --session()--> Open --begin--> Active --commit--> Committed
//!                                            |                   |
//!                                            +--rollback--> RolledBack
//! Committed/RolledBack --session()--> Active   (next attempt)
//! any --close()--> Closed
//! ```

use crate::classify::{classify, Verdict};
use retrytx_core::{Session, Storage, StoreError, StoreResult, TxError};
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle state of a `TxContext`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// No session acquired yet
    Unopened,
    /// Session acquired, no transaction started
    Open,
    /// Transaction in progress
    Active,
    /// Last transaction committed
    Committed,
    /// Last transaction rolled back
    RolledBack,
    /// Session released; the context is unusable
    Closed,
}

/// Transaction context handed to units of work
pub struct TxContext<S: Storage> {
    storage: Arc<S>,
    session: Option<S::Session>,
    state: TxState,
}

impl<S: Storage> TxContext<S> {
    /// Create a context over the given storage; no session is opened yet
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            session: None,
            state: TxState::Unopened,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Whether a transaction is in progress
    pub fn is_active(&self) -> bool {
        self.session.as_ref().map_or(false, |s| s.is_active())
    }

    /// Open the session if needed and start a transaction if none is active
    ///
    /// # Errors
    ///
    /// `StoreError::SessionClosed` after `close`, or any failure reported by
    /// the storage while opening the session or beginning the transaction.
    pub fn begin(&mut self) -> StoreResult<()> {
        if self.state == TxState::Closed {
            return Err(StoreError::SessionClosed);
        }
        if self.session.is_none() {
            self.session = Some(self.storage.open_session()?);
            self.state = TxState::Open;
            debug!(target: "retrytx::txn", "Session opened");
        }
        if let Some(session) = self.session.as_mut() {
            if !session.is_active() {
                session.begin_transaction()?;
                self.state = TxState::Active;
                debug!(target: "retrytx::txn", "Transaction started");
            }
        }
        Ok(())
    }

    /// Session with an active transaction, for repositories
    pub fn session(&mut self) -> StoreResult<&mut S::Session> {
        self.begin()?;
        self.session.as_mut().ok_or(StoreError::SessionClosed)
    }

    /// Commit the active transaction
    ///
    /// No-op when no session was ever acquired or no transaction is active.
    pub fn commit(&mut self) -> StoreResult<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if !session.is_active() {
            return Ok(());
        }
        match session.commit() {
            Ok(()) => {
                self.state = TxState::Committed;
                debug!(target: "retrytx::txn", "Transaction committed");
                Ok(())
            }
            Err(e) => {
                if !session.is_active() {
                    self.state = TxState::RolledBack;
                }
                Err(e)
            }
        }
    }

    /// Roll back the active transaction, if any
    ///
    /// Never fails: a rollback error is logged and swallowed so that it
    /// cannot mask the failure that triggered the rollback.
    pub fn rollback(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_active() {
            return;
        }
        if let Err(e) = session.rollback() {
            warn!(target: "retrytx::txn", error = %e, "Rollback failed, ignoring");
        } else {
            debug!(target: "retrytx::txn", "Transaction rolled back");
        }
        self.state = TxState::RolledBack;
    }

    /// Release the session
    ///
    /// Only the first call has an effect. An active transaction is rolled
    /// back by the storage.
    pub fn close(&mut self) -> StoreResult<()> {
        if self.state == TxState::Closed {
            return Ok(());
        }
        self.state = TxState::Closed;
        match self.session.take() {
            Some(mut session) => {
                let result = session.close();
                debug!(target: "retrytx::txn", ok = result.is_ok(), "Session closed");
                result
            }
            None => Ok(()),
        }
    }

    /// Classify a unit-of-work failure
    pub fn classify(&self, error: &TxError) -> Verdict {
        classify(error)
    }
}

impl<S: Storage> Drop for TxContext<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(target: "retrytx::txn", error = %e, "Closing session on drop failed");
        }
    }
}
