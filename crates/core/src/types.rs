//! Core types for retrytx
//!
//! This module defines the foundational types:
//! - EntityId: Storage-assigned row identifier
//! - LockMode: Concurrency-control strategy selected per read
//! - TableRef: Table name plus versioning capability, passed to storage
//! - EntityKind: Capability tag selecting the entity variant

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a persisted entity
///
/// Assigned by the storage engine when a create is flushed and never
/// changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Wrap a raw identifier
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw identifier
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Concurrency-control strategy for a single read
///
/// Row locks acquired by `Shared` and `Exclusive` reads are held until the
/// owning transaction commits or rolls back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// No database-level lock; last committer wins
    #[default]
    None,
    /// Read lock: blocks exclusive requests of other transactions
    Shared,
    /// Write lock: blocks every other lock request on the row
    Exclusive,
    /// Version check at write time (versioned entities only)
    Optimistic,
}

impl LockMode {
    /// Whether reading under this mode may block the caller
    pub fn is_blocking(&self) -> bool {
        matches!(self, LockMode::Shared | LockMode::Exclusive)
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockMode::None => "none",
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
            LockMode::Optimistic => "optimistic",
        };
        f.write_str(name)
    }
}

/// Table handle passed to storage operations
///
/// Carries the versioning capability so the storage engine knows whether
/// to maintain and check the `version` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableRef {
    /// Table name
    pub name: &'static str,
    /// Whether rows carry an optimistic version
    pub versioned: bool,
}

impl TableRef {
    /// Create a table reference
    pub const fn new(name: &'static str, versioned: bool) -> Self {
        Self { name, versioned }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Capability tag for an entity variant
///
/// One entity representation serves both variants; repositories branch on
/// `VERSIONED` instead of on a type hierarchy.
pub trait EntityKind: Send + Sync + 'static {
    /// Table the entities of this kind live in
    const TABLE: &'static str;
    /// Whether the storage engine maintains an optimistic version
    const VERSIONED: bool;

    /// Table reference handed to the storage engine
    fn table() -> TableRef {
        TableRef::new(Self::TABLE, Self::VERSIONED)
    }
}

/// Entity kind without optimistic versioning
#[derive(Debug, Clone, Copy, Default)]
pub struct NonVersioned;

impl EntityKind for NonVersioned {
    const TABLE: &'static str = "non_versioned_entity";
    const VERSIONED: bool = false;
}

/// Entity kind with an optimistic version column
#[derive(Debug, Clone, Copy, Default)]
pub struct Versioned;

impl EntityKind for Versioned {
    const TABLE: &'static str = "versioned_entity";
    const VERSIONED: bool = true;
}
