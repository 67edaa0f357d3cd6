//! retrytx - transactional retry engine with a lock-aware repository
//!
//! A unit of work is a closure that reads and writes entities through an
//! [`EntityRepository`]. [`TxManager::execute`] runs it inside a
//! transaction, commits on success, and re-runs it when the failure is a
//! transient conflict (identifier collision, optimistic version mismatch,
//! lock timeout or deadlock). Every other failure ends the call after
//! rollback.
//!
//! # Quick Start
//!
//! ```ignore
//! use retrytx::{Config, Entity, EntityRepository, LockMode, Versioned};
//!
//! let config = Config::default();
//! let manager = config.manager(config.open_store());
//! let repo = EntityRepository::<Versioned>::new();
//!
//! let created = manager.execute(|ctx| repo.create(ctx, Entity::new("Entity Content")))?;
//! let id = created.id().unwrap();
//! let updated = manager.execute(|ctx| {
//!     let mut e = repo.find(ctx, id, LockMode::Optimistic)?.unwrap();
//!     e.set_content(format!("{} plus T1", e.content()));
//!     repo.update(ctx, e)
//! })?;
//! ```
//!
//! # Architecture
//!
//! - `retrytx-core`: entity model, lock modes, errors, storage traits
//! - `retrytx-storage`: in-memory row store with row locks
//! - `retrytx-concurrency`: retry coordinator, context, classifier
//! - `retrytx-repository`: CRUD facade over one entity kind
//! - this crate: configuration file and racing workers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod workers;

pub use config::{Config, ConfigError, CONFIG_FILE_NAME};
pub use workers::{Deleter, Updater, WorkerHandle, WorkerOutcome, WorkerReport};

pub use retrytx_concurrency::{
    after_commit, classify, AfterCommitHook, ExecuteError, RetryConfig, RetryReason, TxContext,
    TxManager, TxState, Verdict,
};
pub use retrytx_core::{
    Entity, EntityId, EntityKind, LockMode, NonVersioned, Session, Storage, StoreError,
    StoreResult, TableRef, TxError, TxResult, Versioned,
};
pub use retrytx_repository::EntityRepository;
pub use retrytx_storage::{
    IdGenerator, IdStrategy, MemorySession, MemoryStore, RandomIds, ScriptedIds, SequentialIds,
    StoreConfig,
};
