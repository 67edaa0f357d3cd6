//! In-memory row store
//!
//! Holds committed rows only. Uncommitted writes live in the owning
//! session until commit, so other transactions never observe them.
//!
//! `MemoryStore` is a cheap handle: clones share the same tables, lock
//! table and identifier generator.

use crate::config::StoreConfig;
use crate::ids::IdGenerator;
use crate::lock::{LockManager, RowKey, TxnId};
use crate::session::MemorySession;
use parking_lot::RwLock;
use retrytx_core::{Entity, EntityId, Storage, StoreError, StoreResult, TableRef};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<EntityId, Entity>,
}

/// A committed or pending write to one row; `None` deletes it
#[derive(Debug, Clone)]
pub(crate) struct RowWrite {
    pub(crate) table: TableRef,
    pub(crate) row: Option<Entity>,
}

struct StoreInner {
    tables: RwLock<HashMap<&'static str, Table>>,
    locks: LockManager,
    ids: Box<dyn IdGenerator>,
    next_txn_id: AtomicU64,
    unique_content: HashSet<String>,
}

/// In-memory storage engine implementing the `Storage` contract
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    /// Store with default configuration
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Store with the given configuration
    pub fn with_config(config: StoreConfig) -> Self {
        let ids = config.id_strategy.build();
        Self::with_id_generator(config, ids)
    }

    /// Store with a custom identifier generator
    ///
    /// `config.id_strategy` is ignored.
    pub fn with_id_generator(config: StoreConfig, ids: Box<dyn IdGenerator>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                tables: RwLock::new(HashMap::new()),
                locks: LockManager::new(config.lock_timeout()),
                ids,
                next_txn_id: AtomicU64::new(1),
                unique_content: config.unique_content_tables.into_iter().collect(),
            }),
        }
    }

    /// Committed state of a row, bypassing transactions and locks
    pub fn committed_row(&self, table: TableRef, id: EntityId) -> Option<Entity> {
        self.read(table, id)
    }

    /// Number of committed rows in `table`
    pub fn row_count(&self, table: TableRef) -> usize {
        self.inner
            .tables
            .read()
            .get(table.name)
            .map_or(0, |t| t.rows.len())
    }

    /// Whether any transaction currently holds a lock on the row
    pub fn is_row_locked(&self, table: TableRef, id: EntityId) -> bool {
        self.inner.locks.is_locked(&(table.name, id))
    }

    pub(crate) fn locks(&self) -> &LockManager {
        &self.inner.locks
    }

    pub(crate) fn next_txn_id(&self) -> TxnId {
        self.inner.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn generate_id(&self) -> EntityId {
        self.inner.ids.next_id()
    }

    pub(crate) fn read(&self, table: TableRef, id: EntityId) -> Option<Entity> {
        self.inner
            .tables
            .read()
            .get(table.name)
            .and_then(|t| t.rows.get(&id).cloned())
    }

    pub(crate) fn has_unique_content(&self, table: TableRef) -> bool {
        self.inner.unique_content.contains(table.name)
    }

    /// Committed rows of `table` with the given content
    pub(crate) fn ids_with_content(&self, table: TableRef, content: &str) -> Vec<EntityId> {
        self.inner
            .tables
            .read()
            .get(table.name)
            .map(|t| {
                t.rows
                    .values()
                    .filter(|row| row.content() == content)
                    .filter_map(|row| row.id())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Apply a transaction's writes atomically
    ///
    /// Unique content is checked again against the committed rows while
    /// the tables are write-locked, so a clash between two transactions
    /// that flushed concurrently is caught here. Nothing is applied when
    /// the check fails.
    pub(crate) fn apply(&self, txn_id: TxnId, writes: &BTreeMap<RowKey, RowWrite>) -> StoreResult<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let mut tables = self.inner.tables.write();
        if let Some(violation) = self.content_clash(&tables, writes) {
            return Err(violation);
        }
        for ((_, id), write) in writes {
            let table = tables.entry(write.table.name).or_default();
            match &write.row {
                Some(row) => {
                    table.rows.insert(*id, row.clone());
                }
                None => {
                    table.rows.remove(id);
                }
            }
        }
        debug!(
            target: "retrytx::storage",
            txn_id,
            writes = writes.len(),
            "Applied committed writes"
        );
        Ok(())
    }

    /// First inserted or updated row whose content is already taken by a
    /// committed row this batch leaves in place
    fn content_clash(
        &self,
        tables: &HashMap<&'static str, Table>,
        writes: &BTreeMap<RowKey, RowWrite>,
    ) -> Option<StoreError> {
        writes.iter().find_map(|(&(name, id), write)| {
            let row = write.row.as_ref()?;
            if !self.inner.unique_content.contains(name) {
                return None;
            }
            let taken = tables.get(name)?.rows.iter().any(|(other, existing)| {
                *other != id && existing.content() == row.content() && !writes.contains_key(&(name, *other))
            });
            taken.then(|| content_violation(name, id))
        })
    }
}

/// Error for a row whose content is already used in a unique-content table
pub(crate) fn content_violation(table: &str, id: EntityId) -> StoreError {
    StoreError::ConstraintViolation {
        table: table.to_string(),
        constraint: format!("{}_content_key", table),
        id,
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStore {
    type Session = MemorySession;

    fn open_session(&self) -> StoreResult<MemorySession> {
        Ok(MemorySession::new(self.clone()))
    }
}
