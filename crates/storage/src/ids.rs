//! Identifier generation
//!
//! Identifiers are drawn before the insert reaches the table, so a
//! randomized strategy can produce a clash with an existing row. The
//! resulting `DuplicateKey` is what the retry engine treats as an
//! identifier-generation race.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use retrytx_core::EntityId;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of identifiers for newly created rows
pub trait IdGenerator: Send + Sync {
    /// Draw the next identifier
    fn next_id(&self) -> EntityId;
}

/// Monotonic identifiers starting at 1
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    /// Start at 1
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Start at `first`
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> EntityId {
        EntityId::new(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// Uniformly random identifiers in `1..=max`
#[derive(Debug)]
pub struct RandomIds {
    max: u64,
    rng: Mutex<StdRng>,
}

impl RandomIds {
    /// Seed from OS entropy; `max` below 1 is raised to 1
    pub fn new(max: u64) -> Self {
        Self {
            max: max.max(1),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic sequence for a given seed
    pub fn with_seed(max: u64, seed: u64) -> Self {
        Self {
            max: max.max(1),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl IdGenerator for RandomIds {
    fn next_id(&self) -> EntityId {
        EntityId::new(self.rng.lock().gen_range(1..=self.max))
    }
}

/// Replays a fixed list of identifiers, then continues sequentially
///
/// Makes identifier clashes reproducible.
#[derive(Debug)]
pub struct ScriptedIds {
    script: Mutex<VecDeque<u64>>,
    fallback: SequentialIds,
}

impl ScriptedIds {
    /// Replay `script`, then count up from `fallback_start`
    pub fn new(script: impl IntoIterator<Item = u64>, fallback_start: u64) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: SequentialIds::starting_at(fallback_start),
        }
    }
}

impl IdGenerator for ScriptedIds {
    fn next_id(&self) -> EntityId {
        match self.script.lock().pop_front() {
            Some(raw) => EntityId::new(raw),
            None => self.fallback.next_id(),
        }
    }
}
