//! Row lock manager
//!
//! Shared/exclusive row locks held until the owning transaction ends.
//!
//! # Grant rules
//!
//! - Shared: granted unless another transaction holds the row exclusively
//! - Exclusive: granted when no other transaction holds the row at all
//! - Requests are re-entrant; an exclusive holder asking for shared keeps
//!   its exclusive lock, a sole shared holder is upgraded in place
//!
//! Waiters block on a condition variable and give up at the lock timeout.
//! Two shared holders both trying to upgrade can never make progress, so the
//! second upgrader fails immediately with `Deadlock`.

use parking_lot::{Condvar, Mutex};
use retrytx_core::{EntityId, LockMode, StoreError, StoreResult};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Transaction identifier used as lock owner
pub type TxnId = u64;

/// Lock table key: table name plus row identifier
pub type RowKey = (&'static str, EntityId);

/// Kind of row lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    /// Read lock
    Shared,
    /// Write lock
    Exclusive,
}

impl LockKind {
    fn mode(self) -> LockMode {
        match self {
            LockKind::Shared => LockMode::Shared,
            LockKind::Exclusive => LockMode::Exclusive,
        }
    }
}

#[derive(Debug, Default)]
struct RowLock {
    shared: HashSet<TxnId>,
    exclusive: Option<TxnId>,
    upgrading: Option<TxnId>,
}

impl RowLock {
    fn can_grant(&self, txn: TxnId, kind: LockKind) -> bool {
        let exclusive_ok = self.exclusive.map_or(true, |holder| holder == txn);
        match kind {
            LockKind::Shared => exclusive_ok,
            LockKind::Exclusive => exclusive_ok && self.shared.iter().all(|&h| h == txn),
        }
    }

    fn grant(&mut self, txn: TxnId, kind: LockKind) {
        match kind {
            LockKind::Shared => {
                if self.exclusive != Some(txn) {
                    self.shared.insert(txn);
                }
            }
            LockKind::Exclusive => {
                self.shared.remove(&txn);
                self.exclusive = Some(txn);
            }
        }
        if self.upgrading == Some(txn) {
            self.upgrading = None;
        }
    }

    fn release(&mut self, txn: TxnId) {
        self.shared.remove(&txn);
        if self.exclusive == Some(txn) {
            self.exclusive = None;
        }
        if self.upgrading == Some(txn) {
            self.upgrading = None;
        }
    }

    fn is_free(&self) -> bool {
        self.shared.is_empty() && self.exclusive.is_none() && self.upgrading.is_none()
    }
}

/// Per-row shared/exclusive lock table
pub struct LockManager {
    rows: Mutex<HashMap<RowKey, RowLock>>,
    released: Condvar,
    timeout: Duration,
}

impl LockManager {
    /// Create a lock manager with the given wait timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            released: Condvar::new(),
            timeout,
        }
    }

    /// Lock wait timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire a row lock for `txn`, blocking until granted
    ///
    /// # Errors
    ///
    /// - `LockTimeout` if the lock is not granted within the timeout
    /// - `Deadlock` if this is a shared-to-exclusive upgrade racing another
    ///   upgrade of the same row
    pub fn acquire(&self, txn: TxnId, key: RowKey, kind: LockKind) -> StoreResult<()> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut rows = self.rows.lock();
        let mut waited = false;

        loop {
            let row = rows.entry(key).or_default();
            if row.can_grant(txn, kind) {
                row.grant(txn, kind);
                if waited {
                    debug!(
                        target: "retrytx::storage",
                        txn_id = txn,
                        table = key.0,
                        id = %key.1,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "Lock granted after wait"
                    );
                }
                return Ok(());
            }

            if kind == LockKind::Exclusive && row.shared.contains(&txn) {
                match row.upgrading {
                    Some(other) if other != txn => {
                        warn!(
                            target: "retrytx::storage",
                            txn_id = txn,
                            other_txn_id = other,
                            table = key.0,
                            id = %key.1,
                            "Lock upgrade deadlock"
                        );
                        return Err(StoreError::Deadlock {
                            table: key.0.to_string(),
                            id: key.1,
                            mode: kind.mode(),
                        });
                    }
                    _ => row.upgrading = Some(txn),
                }
            }

            if Instant::now() >= deadline {
                if row.upgrading == Some(txn) {
                    row.upgrading = None;
                }
                if row.is_free() {
                    rows.remove(&key);
                }
                let waited = started.elapsed();
                warn!(
                    target: "retrytx::storage",
                    txn_id = txn,
                    table = key.0,
                    id = %key.1,
                    waited_ms = waited.as_millis() as u64,
                    "Lock wait timed out"
                );
                return Err(StoreError::LockTimeout {
                    table: key.0.to_string(),
                    id: key.1,
                    mode: kind.mode(),
                    waited,
                });
            }

            if !waited {
                debug!(
                    target: "retrytx::storage",
                    txn_id = txn,
                    table = key.0,
                    id = %key.1,
                    mode = %kind.mode(),
                    "Waiting for row lock"
                );
                waited = true;
            }
            self.released.wait_until(&mut rows, deadline);
        }
    }

    /// Release every lock `txn` holds on `keys` and wake waiters
    pub fn release_all<'a, I>(&self, txn: TxnId, keys: I)
    where
        I: IntoIterator<Item = &'a RowKey>,
    {
        let mut rows = self.rows.lock();
        for key in keys {
            if let Some(row) = rows.get_mut(key) {
                row.release(txn);
                if row.is_free() {
                    rows.remove(key);
                }
            }
        }
        drop(rows);
        self.released.notify_all();
    }

    /// Whether any transaction holds a lock on `key`
    pub fn is_locked(&self, key: &RowKey) -> bool {
        self.rows
            .lock()
            .get(key)
            .map_or(false, |row| row.exclusive.is_some() || !row.shared.is_empty())
    }
}
