//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.
//!
//! Races use a compressed version of the classic two-worker timeline:
//! T1 starts at 0 and pauses `T1_LONG` or `T1_SHORT` between read and
//! write; T2 starts at `T2_START` and pauses `T2_PAUSE`, so it writes at
//! 600ms, between the two T1 variants.

#![allow(dead_code)]

use retrytx::{
    Deleter, Entity, EntityId, EntityKind, EntityRepository, LockMode, MemoryStore, RetryConfig,
    StoreConfig, TxManager, Updater, WorkerHandle, WorkerReport,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// T1 writes after T2 has committed
pub const T1_LONG: Duration = Duration::from_millis(800);
/// T1 writes before T2 writes
pub const T1_SHORT: Duration = Duration::from_millis(500);
/// Delay between starting T1 and starting T2
pub const T2_START: Duration = Duration::from_millis(400);
/// T2's pause between read and write
pub const T2_PAUSE: Duration = Duration::from_millis(200);

pub const INITIAL_CONTENT: &str = "Entity Content";

/// Store with a lock timeout well above any race's longest wait.
pub fn store() -> MemoryStore {
    MemoryStore::with_config(StoreConfig::new().with_lock_timeout_ms(5_000))
}

/// Manager allowing one retry, like the classic demos.
pub fn manager(store: &MemoryStore) -> TxManager<MemoryStore> {
    TxManager::with_config(Arc::new(store.clone()), RetryConfig::new().with_max_attempts(2))
}

/// Create the initial entity and return its identifier.
pub fn seed<K: EntityKind>(manager: &TxManager<MemoryStore>) -> EntityId {
    let repo = EntityRepository::<K>::new();
    let entity = manager
        .execute(|ctx| repo.create(ctx, Entity::new(INITIAL_CONTENT)))
        .expect("seed entity");
    entity.id().expect("seeded entity has an id")
}

/// Read the committed state through a unit of work, without locking.
pub fn peek<K: EntityKind>(manager: &TxManager<MemoryStore>, id: EntityId) -> Option<Entity> {
    let repo = EntityRepository::<K>::new();
    manager
        .execute(|ctx| repo.find(ctx, id, LockMode::None))
        .expect("unlocked read")
}

/// Outcome of a two-worker race.
#[derive(Debug)]
pub struct RaceResult {
    pub entity: Option<Entity>,
    pub t1: WorkerReport,
    pub t2: WorkerReport,
}

impl RaceResult {
    pub fn content(&self) -> &str {
        self.entity.as_ref().expect("entity survived").content()
    }

    pub fn change_count(&self) -> u32 {
        self.entity.as_ref().expect("entity survived").change_count()
    }
}

/// Race two updaters on one fresh entity.
pub fn race_updates<K: EntityKind>(
    t1_mode: LockMode,
    t1_pause: Duration,
    t2_mode: LockMode,
    t1_fails: bool,
) -> RaceResult {
    let store = store();
    let manager = manager(&store);
    let id = seed::<K>(&manager);

    let t1 = Updater::<_, K>::new("T1", manager.clone(), id)
        .with_lock_mode(t1_mode)
        .with_pause(t1_pause)
        .failing_after_write(t1_fails)
        .spawn();
    thread::sleep(T2_START);
    let t2 = Updater::<_, K>::new("T2", manager.clone(), id)
        .with_lock_mode(t2_mode)
        .with_pause(T2_PAUSE)
        .spawn();
    finish::<K>(&manager, id, t1, t2)
}

/// Race a deleter (T1) against an updater (T2) on one fresh entity.
pub fn race_delete_update<K: EntityKind>(
    t1_mode: LockMode,
    t1_pause: Duration,
    t2_mode: LockMode,
    t1_fails: bool,
) -> RaceResult {
    let store = store();
    let manager = manager(&store);
    let id = seed::<K>(&manager);

    let t1 = Deleter::<_, K>::new("T1", manager.clone(), id)
        .with_lock_mode(t1_mode)
        .with_pause(t1_pause)
        .failing_after_write(t1_fails)
        .spawn();
    thread::sleep(T2_START);
    let t2 = Updater::<_, K>::new("T2", manager.clone(), id)
        .with_lock_mode(t2_mode)
        .with_pause(T2_PAUSE)
        .spawn();
    finish::<K>(&manager, id, t1, t2)
}

fn finish<K: EntityKind>(
    manager: &TxManager<MemoryStore>,
    id: EntityId,
    t1: WorkerHandle,
    t2: WorkerHandle,
) -> RaceResult {
    // Unlocked reads never wait for the workers' locks
    peek::<K>(manager, id);
    let t1 = t1.join();
    let t2 = t2.join();
    RaceResult {
        entity: peek::<K>(manager, id),
        t1,
        t2,
    }
}
