//! Lock-aware entity repository for retrytx
//!
//! `EntityRepository<K>` performs create/find/update/delete against one
//! entity kind through a `TxContext`. Every write is flushed immediately so
//! that identifier clashes, constraint violations and version conflicts
//! surface inside the unit of work instead of at commit.
//!
//! ## Failure mapping
//!
//! ```text
//! create, id clash with a visible row  -> TxError::AlreadyExists (retryable)
//! create, any other uniqueness failure -> original StoreError    (fatal)
//! absent row (non-versioned)           -> TxError::NotFound      (fatal)
//! absent row (versioned update)        -> StoreError::VersionConflict { found: None }
//! everything else                      -> StoreError passed through
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use retrytx_concurrency::TxContext;
use retrytx_core::{
    Entity, EntityId, EntityKind, LockMode, Session, Storage, StoreError, TxError, TxResult,
};
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

/// CRUD facade over entities of kind `K`
pub struct EntityRepository<K: EntityKind> {
    _kind: PhantomData<K>,
}

impl<K: EntityKind> EntityRepository<K> {
    /// Create a repository
    pub const fn new() -> Self {
        Self { _kind: PhantomData }
    }

    /// Persist a new entity and return its stored state
    ///
    /// The storage assigns the identifier. A duplicate-identifier failure is
    /// re-checked: if a row occupies the generated identifier the failure is
    /// reported as `TxError::AlreadyExists`, otherwise the original storage
    /// failure is returned.
    pub fn create<S: Storage>(&self, ctx: &mut TxContext<S>, entity: Entity) -> TxResult<Entity> {
        let table = K::table();
        let session = ctx.session()?;
        let id = session.create(table, &entity)?;

        if let Err(e) = session.flush() {
            if !e.is_insert_constraint_violation() {
                return Err(e.into());
            }
            return match session.reload(table, id)? {
                Some(_) => {
                    debug!(target: "retrytx::txn", table = K::TABLE, %id, "Generated identifier already taken");
                    Err(TxError::AlreadyExists {
                        table: K::TABLE.to_string(),
                        id,
                        source: e,
                    })
                }
                None => Err(e.into()),
            };
        }

        session
            .reload(table, id)?
            .ok_or_else(|| TxError::not_found(K::TABLE, id))
    }

    /// Look up an entity under the given lock mode
    ///
    /// `Optimistic` is only valid for versioned kinds; the storage rejects
    /// it otherwise.
    pub fn find<S: Storage>(
        &self,
        ctx: &mut TxContext<S>,
        id: EntityId,
        mode: LockMode,
    ) -> TxResult<Option<Entity>> {
        Ok(ctx.session()?.find(K::table(), id, mode)?)
    }

    /// Update an existing entity and return its new stored state
    ///
    /// Existence is re-verified first. On a versioned kind a vanished row
    /// means the submitted version is stale, and it is reported as a
    /// version conflict so the unit of work re-reads.
    pub fn update<S: Storage>(&self, ctx: &mut TxContext<S>, entity: Entity) -> TxResult<Entity> {
        let id = Self::persistent_id(&entity)?;
        if ctx.session()?.find(K::table(), id, LockMode::None)?.is_none() {
            return Err(Self::vanished(&entity, id));
        }
        self.update_unchecked(ctx, entity)
    }

    /// Update without the existence pre-check
    ///
    /// The storage still verifies existence and version under the row lock.
    pub fn update_unchecked<S: Storage>(
        &self,
        ctx: &mut TxContext<S>,
        entity: Entity,
    ) -> TxResult<Entity> {
        let table = K::table();
        let id = Self::persistent_id(&entity)?;
        let session = ctx.session()?;
        session.update(table, &entity)?;
        session.flush()?;
        session
            .reload(table, id)?
            .ok_or_else(|| TxError::not_found(K::TABLE, id))
    }

    /// Delete the entity with the given identifier and return it
    pub fn delete<S: Storage>(&self, ctx: &mut TxContext<S>, id: EntityId) -> TxResult<Entity> {
        match ctx.session()?.find(K::table(), id, LockMode::None)? {
            Some(entity) => self.delete_entity(ctx, &entity),
            None => Err(TxError::not_found(K::TABLE, id)),
        }
    }

    /// Delete an already loaded entity and return it
    ///
    /// Versioned kinds are version-checked by the storage.
    pub fn delete_entity<S: Storage>(
        &self,
        ctx: &mut TxContext<S>,
        entity: &Entity,
    ) -> TxResult<Entity> {
        let session = ctx.session()?;
        session.delete(K::table(), entity)?;
        session.flush()?;
        Ok(entity.clone())
    }

    fn persistent_id(entity: &Entity) -> TxResult<EntityId> {
        entity.id().ok_or_else(|| {
            StoreError::Unsupported("entity has not been persisted".to_string()).into()
        })
    }

    fn vanished(entity: &Entity, id: EntityId) -> TxError {
        if K::VERSIONED {
            StoreError::VersionConflict {
                table: K::TABLE.to_string(),
                id,
                expected: entity.version(),
                found: None,
            }
            .into()
        } else {
            TxError::not_found(K::TABLE, id)
        }
    }
}

impl<K: EntityKind> Default for EntityRepository<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityKind> Clone for EntityRepository<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: EntityKind> Copy for EntityRepository<K> {}

impl<K: EntityKind> fmt::Debug for EntityRepository<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRepository")
            .field("table", &K::TABLE)
            .finish()
    }
}
