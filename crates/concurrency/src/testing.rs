//! Instrumented storage for coordinator tests

use retrytx_core::{Entity, EntityId, LockMode, Session, Storage, StoreError, StoreResult, TableRef};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Call counters and scripted failures shared by a `CountingStorage` and its sessions
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) opened: AtomicUsize,
    pub(crate) begun: AtomicUsize,
    pub(crate) committed: AtomicUsize,
    pub(crate) rolled_back: AtomicUsize,
    pub(crate) closed: AtomicUsize,
    pub(crate) fail_rollback: AtomicBool,
    pub(crate) fail_close: AtomicBool,
    commit_failures: Mutex<VecDeque<StoreError>>,
}

impl Counters {
    pub(crate) fn fail_next_commits(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.commit_failures.lock().unwrap().extend(errors);
    }

    pub(crate) fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct CountingStorage {
    pub(crate) counters: Arc<Counters>,
}

pub(crate) struct CountingSession {
    counters: Arc<Counters>,
    active: bool,
}

impl Storage for CountingStorage {
    type Session = CountingSession;

    fn open_session(&self) -> StoreResult<CountingSession> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(CountingSession {
            counters: Arc::clone(&self.counters),
            active: false,
        })
    }
}

impl Session for CountingSession {
    fn begin_transaction(&mut self) -> StoreResult<()> {
        if !self.active {
            self.counters.begun.fetch_add(1, Ordering::SeqCst);
            self.active = true;
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn commit(&mut self) -> StoreResult<()> {
        let scripted = self.counters.commit_failures.lock().unwrap().pop_front();
        if let Some(error) = scripted {
            // Leave the transaction active so the caller has to roll back
            return Err(error);
        }
        self.active = false;
        self.counters.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.active = false;
        self.counters.rolled_back.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_rollback.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("connection reset during rollback".to_string()));
        }
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_close.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("connection reset during close".to_string()));
        }
        Ok(())
    }

    fn find(&mut self, _table: TableRef, _id: EntityId, _mode: LockMode) -> StoreResult<Option<Entity>> {
        Ok(None)
    }

    fn create(&mut self, _table: TableRef, _entity: &Entity) -> StoreResult<EntityId> {
        Ok(EntityId::new(1))
    }

    fn update(&mut self, _table: TableRef, _entity: &Entity) -> StoreResult<()> {
        Ok(())
    }

    fn delete(&mut self, _table: TableRef, _entity: &Entity) -> StoreResult<()> {
        Ok(())
    }

    fn flush(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn reload(&mut self, _table: TableRef, _id: EntityId) -> StoreResult<Option<Entity>> {
        Ok(None)
    }
}
