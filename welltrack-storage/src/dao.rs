//! Typed async access to the local store.
//!
//! [`EntityDao`] is the seam the sync handlers use to reach on-device data.
//! [`SqliteDao`] runs the blocking [`LocalStore`] calls on tokio's blocking pool.

use crate::error::{StorageError, StorageResult};
use crate::store::LocalStore;
use async_trait::async_trait;
use std::marker::PhantomData;
use welltrack_model::SyncableEntity;
use welltrack_types::{ChangeSet, EntityId, UserId, Version};

/// Per-entity-type data access used during sync.
#[async_trait]
pub trait EntityDao<T: SyncableEntity>: Send + Sync {
    /// Loads a live record.
    async fn get(&self, id: &EntityId) -> StorageResult<Option<T>>;

    /// Stores a record that now matches the cloud copy. The row is left clean.
    /// Returns false, writing nothing, if the row holds a newer local edit.
    async fn upsert(&self, entity: &T) -> StorageResult<bool>;

    /// Removes a record and its tombstone. Absent rows are not an error.
    async fn delete(&self, id: &EntityId) -> StorageResult<()>;

    /// Dirty rows and tombstones owned by `user_id`.
    async fn pending_changes(&self, user_id: &UserId) -> StorageResult<ChangeSet>;

    /// Clears the dirty flag for `id` unless it was edited after `up_to`.
    async fn clear_pending(&self, id: &EntityId, up_to: Version) -> StorageResult<bool>;
}

/// [`EntityDao`] over a shared [`LocalStore`].
pub struct SqliteDao<T> {
    store: LocalStore,
    _entity: PhantomData<fn() -> T>,
}

impl<T> SqliteDao<T> {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }
}

impl<T> Clone for SqliteDao<T> {
    fn clone(&self) -> Self {
        Self::new(self.store.clone())
    }
}

async fn blocking<R, F>(f: F) -> StorageResult<R>
where
    F: FnOnce() -> StorageResult<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
}

#[async_trait]
impl<T: SyncableEntity> EntityDao<T> for SqliteDao<T> {
    async fn get(&self, id: &EntityId) -> StorageResult<Option<T>> {
        let store = self.store.clone();
        let id = id.clone();
        blocking(move || store.load::<T>(&id)).await
    }

    async fn upsert(&self, entity: &T) -> StorageResult<bool> {
        let store = self.store.clone();
        let id = entity.id().clone();
        let user_id = entity.user_id().clone();
        let version = entity.version();
        let payload = serde_json::to_string(entity)?;
        blocking(move || store.upsert_synced(T::ENTITY_TYPE, &id, &user_id, version, &payload))
            .await
    }

    async fn delete(&self, id: &EntityId) -> StorageResult<()> {
        let store = self.store.clone();
        let id = id.clone();
        blocking(move || store.delete(T::ENTITY_TYPE, &id)).await
    }

    async fn pending_changes(&self, user_id: &UserId) -> StorageResult<ChangeSet> {
        let store = self.store.clone();
        let user_id = user_id.clone();
        blocking(move || store.pending_changes(T::ENTITY_TYPE, &user_id)).await
    }

    async fn clear_pending(&self, id: &EntityId, up_to: Version) -> StorageResult<bool> {
        let store = self.store.clone();
        let id = id.clone();
        blocking(move || store.clear_pending(T::ENTITY_TYPE, &id, up_to)).await
    }
}
