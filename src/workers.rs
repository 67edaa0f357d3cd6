//! Worker threads that race on one entity
//!
//! An `Updater` or `Deleter` runs one unit of work on its own OS thread:
//! read the entity under a lock mode, pause, write, read again and
//! optionally fail on purpose. The pause widens the window in which a
//! competing worker can interleave.
//!
//! Completion is reported through `WorkerHandle::join`, which returns a
//! `WorkerReport` instead of setting shared flags.

use chrono::{DateTime, Utc};
use retrytx_concurrency::TxManager;
use retrytx_core::{Entity, EntityId, EntityKind, LockMode, Storage, TxError};
use retrytx_repository::EntityRepository;
use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// How a worker's unit of work ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Committed an update; the entity as re-read after the write
    Updated(Entity),
    /// Committed a delete; the entity as it was before deletion
    Deleted(Entity),
    /// The entity was gone when read, nothing was written
    Missing,
    /// The unit of work failed for good
    Failed(String),
}

impl WorkerOutcome {
    /// Whether the unit of work failed
    pub fn is_failed(&self) -> bool {
        matches!(self, WorkerOutcome::Failed(_))
    }
}

/// Result of one worker run
#[derive(Debug, Clone)]
pub struct WorkerReport {
    /// Worker name, also appended to the entity content by updaters
    pub name: String,
    /// How the unit of work ended
    pub outcome: WorkerOutcome,
    /// When the worker started
    pub started_at: DateTime<Utc>,
    /// When the worker finished
    pub finished_at: DateTime<Utc>,
}

impl WorkerReport {
    /// Whether the unit of work failed
    pub fn failed(&self) -> bool {
        self.outcome.is_failed()
    }
}

impl fmt::Display for WorkerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} - {}]: {:?}",
            self.name,
            self.started_at.format("%H:%M:%S%.3f"),
            self.finished_at.format("%H:%M:%S%.3f"),
            self.outcome
        )
    }
}

/// Handle to a running worker
pub struct WorkerHandle {
    name: String,
    handle: JoinHandle<WorkerReport>,
}

impl WorkerHandle {
    /// Worker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the worker to finish
    ///
    /// A panicking worker is reported as `WorkerOutcome::Failed`.
    pub fn join(self) -> WorkerReport {
        let name = self.name;
        self.handle.join().unwrap_or_else(|_| {
            let now = Utc::now();
            WorkerReport {
                name,
                outcome: WorkerOutcome::Failed("worker thread panicked".to_string()),
                started_at: now,
                finished_at: now,
            }
        })
    }
}

/// Settings shared by both worker kinds
struct Plan {
    name: String,
    id: EntityId,
    mode: LockMode,
    pause: Duration,
    fail_after_write: bool,
}

impl Plan {
    fn new(name: impl Into<String>, id: EntityId) -> Self {
        Self {
            name: name.into(),
            id,
            mode: LockMode::None,
            pause: Duration::ZERO,
            fail_after_write: false,
        }
    }

    fn abort(&self) -> TxError {
        TxError::aborted(format!("{} failed after write", self.name))
    }

    fn report(&self, started_at: DateTime<Utc>, outcome: WorkerOutcome) -> WorkerReport {
        let report = WorkerReport {
            name: self.name.clone(),
            outcome,
            started_at,
            finished_at: Utc::now(),
        };
        info!(target: "retrytx::worker", worker = %self.name, outcome = ?report.outcome, "Worker finished");
        report
    }
}

macro_rules! worker_builder {
    () => {
        /// Lock mode used for every read
        pub fn with_lock_mode(mut self, mode: LockMode) -> Self {
            self.plan.mode = mode;
            self
        }

        /// Pause between the first read and the write
        pub fn with_pause(mut self, pause: Duration) -> Self {
            self.plan.pause = pause;
            self
        }

        /// Fail with a business abort after writing
        pub fn failing_after_write(mut self, fail: bool) -> Self {
            self.plan.fail_after_write = fail;
            self
        }

        /// Run the worker on its own thread
        pub fn spawn(self) -> WorkerHandle {
            let name = self.plan.name.clone();
            let handle = thread::spawn(move || self.run());
            WorkerHandle { name, handle }
        }
    };
}

/// Appends `" plus <name>"` to an entity's content
pub struct Updater<S: Storage, K: EntityKind> {
    manager: TxManager<S>,
    repo: EntityRepository<K>,
    plan: Plan,
}

impl<S: Storage + 'static, K: EntityKind> Updater<S, K> {
    /// Create an updater with no lock, no pause and no failure
    pub fn new(name: impl Into<String>, manager: TxManager<S>, id: EntityId) -> Self {
        Self {
            manager,
            repo: EntityRepository::new(),
            plan: Plan::new(name, id),
        }
    }

    worker_builder!();

    /// Run the unit of work on the current thread
    pub fn run(&self) -> WorkerReport {
        let plan = &self.plan;
        let started_at = Utc::now();
        info!(target: "retrytx::worker", worker = %plan.name, mode = %plan.mode, "Updater started");

        let result = self.manager.execute(|ctx| {
            let found = self.repo.find(ctx, plan.id, plan.mode)?;
            debug!(target: "retrytx::worker", worker = %plan.name, found = ?found, "Read entity");
            thread::sleep(plan.pause);

            let Some(mut entity) = found else {
                debug!(target: "retrytx::worker", worker = %plan.name, "Entity is gone, nothing to update");
                return Ok(None);
            };
            entity.set_content(format!("{} plus {}", entity.content(), plan.name));
            self.repo.update(ctx, entity)?;

            let reread = self.repo.find(ctx, plan.id, plan.mode)?;
            debug!(target: "retrytx::worker", worker = %plan.name, found = ?reread, "Changed entity content");
            if plan.fail_after_write {
                return Err(plan.abort());
            }
            Ok(reread)
        });

        let outcome = match result {
            Ok(Some(entity)) => WorkerOutcome::Updated(entity),
            Ok(None) => WorkerOutcome::Missing,
            Err(e) => WorkerOutcome::Failed(e.to_string()),
        };
        plan.report(started_at, outcome)
    }
}

/// Deletes an entity after reading it
pub struct Deleter<S: Storage, K: EntityKind> {
    manager: TxManager<S>,
    repo: EntityRepository<K>,
    plan: Plan,
}

impl<S: Storage + 'static, K: EntityKind> Deleter<S, K> {
    /// Create a deleter with no lock, no pause and no failure
    pub fn new(name: impl Into<String>, manager: TxManager<S>, id: EntityId) -> Self {
        Self {
            manager,
            repo: EntityRepository::new(),
            plan: Plan::new(name, id),
        }
    }

    worker_builder!();

    /// Run the unit of work on the current thread
    ///
    /// An entity that is gone when read fails the unit of work with a
    /// not-found error.
    pub fn run(&self) -> WorkerReport {
        let plan = &self.plan;
        let started_at = Utc::now();
        info!(target: "retrytx::worker", worker = %plan.name, mode = %plan.mode, "Deleter started");

        let result = self.manager.execute(|ctx| {
            let found = self.repo.find(ctx, plan.id, plan.mode)?;
            debug!(target: "retrytx::worker", worker = %plan.name, found = ?found, "Read entity");
            thread::sleep(plan.pause);

            let entity = found.ok_or_else(|| TxError::not_found(K::TABLE, plan.id))?;
            let deleted = self.repo.delete_entity(ctx, &entity)?;

            let reread = self.repo.find(ctx, plan.id, plan.mode)?;
            debug!(target: "retrytx::worker", worker = %plan.name, found = ?reread, "Deleted the entity");
            if plan.fail_after_write {
                return Err(plan.abort());
            }
            Ok(deleted)
        });

        let outcome = match result {
            Ok(entity) => WorkerOutcome::Deleted(entity),
            Err(e) => WorkerOutcome::Failed(e.to_string()),
        };
        plan.report(started_at, outcome)
    }
}
