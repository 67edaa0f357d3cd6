//! Core types and traits for retrytx
//!
//! This crate defines the foundational types used throughout the system:
//! - Entity: One row representation with an optional version capability
//! - EntityId, LockMode, TableRef: Identifiers and per-read lock strategy
//! - EntityKind: Capability tag selecting versioned or non-versioned rows
//! - Error: `StoreError` (storage boundary) and `TxError` (unit of work)
//! - Traits: Storage engine contracts (`Storage`, `Session`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entity;
pub mod error;
pub mod traits;
pub mod types;

pub use entity::Entity;
pub use error::{StoreError, StoreResult, TxError, TxResult};
pub use traits::{Session, Storage};
pub use types::{EntityId, EntityKind, LockMode, NonVersioned, TableRef, Versioned};
