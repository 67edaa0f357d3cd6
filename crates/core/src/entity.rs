//! Entity model
//!
//! A single row representation for both entity variants. The optional
//! `version` field is the versioning capability: `Some` for rows of a
//! versioned table, `None` otherwise.

use crate::types::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A persisted record
///
/// `content` is the only field application code mutates. `change_count`
/// and `version` are maintained by the storage engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    id: Option<EntityId>,
    content: String,
    change_count: u32,
    version: Option<u32>,
}

impl Entity {
    /// Create a transient entity that has not been persisted yet
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            change_count: 0,
            version: None,
        }
    }

    /// Rebuild a stored row
    ///
    /// Used by storage engines when materializing rows.
    pub fn from_parts(
        id: EntityId,
        content: String,
        change_count: u32,
        version: Option<u32>,
    ) -> Self {
        Self {
            id: Some(id),
            content,
            change_count,
            version,
        }
    }

    /// Identifier, `None` until the entity has been created
    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    /// Current payload
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replace the payload
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    /// Number of updates applied to this row
    pub fn change_count(&self) -> u32 {
        self.change_count
    }

    /// Optimistic version, present only for versioned rows
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    /// Whether this row carries an optimistic version
    pub fn is_versioned(&self) -> bool {
        self.version.is_some()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "Entity [id={}", id)?,
            None => write!(f, "Entity [id=<transient>")?,
        }
        if let Some(version) = self.version {
            write!(f, ", version={}", version)?;
        }
        write!(
            f,
            ", change_count={}, content={}]",
            self.change_count, self.content
        )
    }
}
