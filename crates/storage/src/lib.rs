//! Storage layer for retrytx
//!
//! This crate implements an in-memory row store with:
//! - MemoryStore: per-table BTreeMap rows behind a RwLock
//! - MemorySession: transactional sessions with staged writes and flush
//! - LockManager: shared/exclusive row locks with a wait timeout
//! - Identifier generators (sequential, random, scripted)
//!
//! Committed rows are shared by every session opened on the same store.
//! A transaction's flushed writes stay private until it commits.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod ids;
pub mod lock;
pub mod session;
pub mod store;

pub use config::{IdStrategy, StoreConfig, DEFAULT_LOCK_TIMEOUT_MS};
pub use ids::{IdGenerator, RandomIds, ScriptedIds, SequentialIds};
pub use lock::{LockKind, LockManager, RowKey, TxnId};
pub use session::MemorySession;
pub use store::MemoryStore;
