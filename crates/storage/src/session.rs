//! Sessions over the in-memory store
//!
//! A session runs at most one transaction at a time. Writes are staged by
//! `create`/`update`/`delete` and applied to the transaction's private
//! write set on `flush`, under an exclusive row lock. Commit publishes the
//! write set to the store and releases every lock.
//!
//! ## Write semantics
//!
//! ```text
//! insert: X lock, row must be absent (DuplicateKey), unique content
//! update: X lock, row must exist, version must match (versioned tables),
//!         change_count = submitted + 1, version = stored + 1
//! delete: X lock, row must exist, version must match (versioned tables)
//! ```
//!
//! On a versioned table a row that vanished since it was read is reported
//! as a version conflict, since the submitted version is stale.

use crate::lock::{LockKind, RowKey, TxnId};
use crate::store::{content_violation, MemoryStore, RowWrite};
use retrytx_core::{Entity, EntityId, LockMode, Session, StoreError, StoreResult, TableRef};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

#[derive(Debug)]
enum StagedOp {
    Insert(TableRef, Entity),
    Update(TableRef, Entity),
    Delete(TableRef, Entity),
}

#[derive(Debug)]
struct ActiveTxn {
    id: TxnId,
    staged: Vec<StagedOp>,
    writes: BTreeMap<RowKey, RowWrite>,
    held: HashSet<RowKey>,
}

impl ActiveTxn {
    fn new(id: TxnId) -> Self {
        Self {
            id,
            staged: Vec::new(),
            writes: BTreeMap::new(),
            held: HashSet::new(),
        }
    }
}

/// Session over a `MemoryStore`
pub struct MemorySession {
    store: MemoryStore,
    txn: Option<ActiveTxn>,
    closed: bool,
}

impl MemorySession {
    pub(crate) fn new(store: MemoryStore) -> Self {
        Self {
            store,
            txn: None,
            closed: false,
        }
    }

    /// Identifier of the active transaction, if any
    pub fn txn_id(&self) -> Option<TxnId> {
        self.txn.as_ref().map(|t| t.id)
    }

    /// Number of staged operations not yet flushed
    pub fn pending_operations(&self) -> usize {
        self.txn.as_ref().map_or(0, |t| t.staged.len())
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            Err(StoreError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn active(&mut self) -> StoreResult<&mut ActiveTxn> {
        self.ensure_open()?;
        self.txn.as_mut().ok_or(StoreError::NoActiveTransaction)
    }

    /// Row as this transaction sees it: own writes first, then committed
    fn visible(&self, table: TableRef, id: EntityId) -> Option<Entity> {
        if let Some(txn) = &self.txn {
            if let Some(write) = txn.writes.get(&(table.name, id)) {
                return write.row.clone();
            }
        }
        self.store.read(table, id)
    }

    fn lock(&mut self, table: TableRef, id: EntityId, kind: LockKind) -> StoreResult<()> {
        let key = (table.name, id);
        let txn_id = self.active()?.id;
        self.store.locks().acquire(txn_id, key, kind)?;
        self.active()?.held.insert(key);
        Ok(())
    }

    fn stage(&mut self, op: StagedOp) -> StoreResult<()> {
        self.active()?.staged.push(op);
        Ok(())
    }

    fn write(&mut self, table: TableRef, id: EntityId, row: Option<Entity>) -> StoreResult<()> {
        self.active()?
            .writes
            .insert((table.name, id), RowWrite { table, row });
        Ok(())
    }

    fn missing_row(table: TableRef, entity: &Entity, id: EntityId) -> StoreError {
        if table.versioned {
            StoreError::VersionConflict {
                table: table.name.to_string(),
                id,
                expected: entity.version(),
                found: None,
            }
        } else {
            StoreError::NotFound {
                table: table.name.to_string(),
                id,
            }
        }
    }

    fn check_version(table: TableRef, entity: &Entity, current: &Entity, id: EntityId) -> StoreResult<()> {
        if table.versioned && entity.version() != current.version() {
            return Err(StoreError::VersionConflict {
                table: table.name.to_string(),
                id,
                expected: entity.version(),
                found: current.version(),
            });
        }
        Ok(())
    }

    fn violates_unique_content(&self, table: TableRef, id: EntityId, content: &str) -> bool {
        if !self.store.has_unique_content(table) {
            return false;
        }
        let committed_clash = self
            .store
            .ids_with_content(table, content)
            .into_iter()
            .any(|other| other != id && self.visible(table, other).is_some_and(|row| row.content() == content));
        let pending_clash = self.txn.as_ref().map_or(false, |txn| {
            txn.writes.iter().any(|((name, other), write)| {
                *name == table.name
                    && *other != id
                    && write.row.as_ref().is_some_and(|row| row.content() == content)
            })
        });
        committed_clash || pending_clash
    }

    fn apply_staged(&mut self, op: StagedOp) -> StoreResult<()> {
        match op {
            StagedOp::Insert(table, row) => {
                let id = row
                    .id()
                    .ok_or_else(|| StoreError::Internal("staged insert without identifier".to_string()))?;
                self.lock(table, id, LockKind::Exclusive)?;
                if self.visible(table, id).is_some() {
                    return Err(StoreError::DuplicateKey {
                        table: table.name.to_string(),
                        id,
                    });
                }
                if self.violates_unique_content(table, id, row.content()) {
                    return Err(content_violation(table.name, id));
                }
                self.write(table, id, Some(row))
            }
            StagedOp::Update(table, entity) => {
                let id = required_id(&entity)?;
                self.lock(table, id, LockKind::Exclusive)?;
                let current = self
                    .visible(table, id)
                    .ok_or_else(|| Self::missing_row(table, &entity, id))?;
                Self::check_version(table, &entity, &current, id)?;
                let updated = Entity::from_parts(
                    id,
                    entity.content().to_string(),
                    entity.change_count() + 1,
                    current.version().map(|v| v + 1),
                );
                self.write(table, id, Some(updated))
            }
            StagedOp::Delete(table, entity) => {
                let id = required_id(&entity)?;
                self.lock(table, id, LockKind::Exclusive)?;
                let current = self
                    .visible(table, id)
                    .ok_or_else(|| Self::missing_row(table, &entity, id))?;
                Self::check_version(table, &entity, &current, id)?;
                self.write(table, id, None)
            }
        }
    }

    fn end_active(&mut self) -> Option<ActiveTxn> {
        let txn = self.txn.take()?;
        self.store.locks().release_all(txn.id, txn.held.iter());
        Some(txn)
    }
}

fn required_id(entity: &Entity) -> StoreResult<EntityId> {
    entity
        .id()
        .ok_or_else(|| StoreError::Unsupported("entity has no identifier".to_string()))
}

impl Session for MemorySession {
    fn begin_transaction(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        if self.txn.is_none() {
            let id = self.store.next_txn_id();
            debug!(target: "retrytx::storage", txn_id = id, "Transaction started");
            self.txn = Some(ActiveTxn::new(id));
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        !self.closed && self.txn.is_some()
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.active()?;
        if let Err(e) = self.flush() {
            if let Some(txn) = self.end_active() {
                debug!(target: "retrytx::storage", txn_id = txn.id, error = %e, "Commit failed, rolled back");
            }
            return Err(StoreError::RolledBack(Box::new(e)));
        }
        if let Some(txn) = self.txn.take() {
            let applied = self.store.apply(txn.id, &txn.writes);
            self.store.locks().release_all(txn.id, txn.held.iter());
            if let Err(e) = applied {
                debug!(target: "retrytx::storage", txn_id = txn.id, error = %e, "Commit rejected, rolled back");
                return Err(StoreError::RolledBack(Box::new(e)));
            }
            debug!(target: "retrytx::storage", txn_id = txn.id, "Transaction committed");
        }
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.active()?;
        if let Some(txn) = self.end_active() {
            debug!(
                target: "retrytx::storage",
                txn_id = txn.id,
                discarded = txn.writes.len() + txn.staged.len(),
                "Transaction rolled back"
            );
        }
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        if self.closed {
            return Ok(());
        }
        self.end_active();
        self.closed = true;
        Ok(())
    }

    fn find(&mut self, table: TableRef, id: EntityId, mode: LockMode) -> StoreResult<Option<Entity>> {
        self.active()?;
        if mode == LockMode::Optimistic && !table.versioned {
            return Err(StoreError::Unsupported(format!(
                "optimistic lock requires a versioned entity, {} is not versioned",
                table
            )));
        }
        self.flush()?;
        match mode {
            LockMode::Shared => self.lock(table, id, LockKind::Shared)?,
            LockMode::Exclusive => self.lock(table, id, LockKind::Exclusive)?,
            LockMode::None | LockMode::Optimistic => {}
        }
        Ok(self.visible(table, id))
    }

    fn create(&mut self, table: TableRef, entity: &Entity) -> StoreResult<EntityId> {
        self.active()?;
        let id = self.store.generate_id();
        let version = if table.versioned { Some(0) } else { None };
        let row = Entity::from_parts(id, entity.content().to_string(), 0, version);
        self.stage(StagedOp::Insert(table, row))?;
        Ok(id)
    }

    fn update(&mut self, table: TableRef, entity: &Entity) -> StoreResult<()> {
        required_id(entity)?;
        self.stage(StagedOp::Update(table, entity.clone()))
    }

    fn delete(&mut self, table: TableRef, entity: &Entity) -> StoreResult<()> {
        required_id(entity)?;
        self.stage(StagedOp::Delete(table, entity.clone()))
    }

    fn flush(&mut self) -> StoreResult<()> {
        let staged = std::mem::take(&mut self.active()?.staged);
        for op in staged {
            self.apply_staged(op)?;
        }
        Ok(())
    }

    fn reload(&mut self, table: TableRef, id: EntityId) -> StoreResult<Option<Entity>> {
        self.active()?;
        Ok(self.visible(table, id))
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.end_active();
    }
}
