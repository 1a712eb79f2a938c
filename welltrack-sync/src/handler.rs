//! Per-entity-type sync handlers.
//!
//! [`EntitySyncHandler`] is the uniform contract the coordinator drives.
//! [`EntityHandler`] implements it once, generically, on top of an
//! [`EntityDao`], a [`RemoteBackend`] and a [`FieldEncryptor`]; each entity
//! type gets its own instantiation.

use crate::error::SyncResult;
use crate::remote::RemoteBackend;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;
use welltrack_crypto::FieldEncryptor;
use welltrack_model::{
    BiomarkerEntry, HealthMetric, Meal, Recipe, RemoteRecord, SensitiveFieldsConfig, Supplement,
    SyncableEntity,
};
use welltrack_storage::{EntityDao, LocalStore, SqliteDao};
use welltrack_types::{ChangeSet, EntityId, UserId, Version};

/// Entity-specific persistence, transport and encryption operations.
///
/// Cloud copies are [`RemoteRecord`]s whose sensitive attributes are sealed;
/// local copies are plaintext entities.
#[async_trait]
pub trait EntitySyncHandler: Send + Sync {
    type Entity: SyncableEntity;

    /// Discriminator used for routing and status bookkeeping.
    fn entity_type(&self) -> &'static str {
        <Self::Entity as SyncableEntity>::ENTITY_TYPE
    }

    /// Version of a local entity (its last-modified second).
    fn entity_version(&self, entity: &Self::Entity) -> Version {
        entity.version()
    }

    async fn get_local_entity(&self, id: &EntityId) -> SyncResult<Option<Self::Entity>>;

    /// Reads the cloud copy. Transport failures are logged and reported as
    /// `None`, the same as a missing record.
    async fn get_cloud_entity(&self, id: &EntityId) -> Option<RemoteRecord>;

    /// Upserts a local copy that now matches the cloud. A newer local edit
    /// made since the copy was read is kept and stays pending.
    async fn save_local_entity(&self, entity: &Self::Entity) -> SyncResult<()>;

    /// Upserts the sealed record and returns the backend's canonical copy.
    async fn upload_to_cloud(&self, record: &RemoteRecord) -> SyncResult<RemoteRecord>;

    async fn delete_local_entity(&self, id: &EntityId) -> SyncResult<()>;

    async fn delete_cloud_entity(&self, id: &EntityId) -> SyncResult<()>;

    /// Seals the configured sensitive attributes of `entity`.
    fn encrypt_sensitive_data(&self, entity: &Self::Entity) -> SyncResult<RemoteRecord>;

    /// Opens the sealed attributes of `record` and rebuilds the entity.
    fn decrypt_sensitive_data(&self, record: &RemoteRecord) -> SyncResult<Self::Entity>;

    /// Locally edited and deleted ids of `user_id` that the cloud has not seen.
    async fn local_changes(&self, user_id: &UserId) -> SyncResult<ChangeSet>;

    /// Cloud ids of `user_id` changed at or after `since`.
    async fn cloud_changes_since(&self, user_id: &UserId, since: Version)
    -> SyncResult<ChangeSet>;

    /// Clears the local dirty flag (or tombstone) for `id` up to `version`.
    async fn mark_local_synced(&self, id: &EntityId, version: Version) -> SyncResult<()>;
}

/// Generic handler, instantiated once per entity type.
pub struct EntityHandler<T: SyncableEntity> {
    dao: Arc<dyn EntityDao<T>>,
    remote: Arc<dyn RemoteBackend>,
    encryptor: Arc<dyn FieldEncryptor>,
    _entity: PhantomData<fn() -> T>,
}

pub type HealthMetricSyncHandler = EntityHandler<HealthMetric>;
pub type BiomarkerSyncHandler = EntityHandler<BiomarkerEntry>;
pub type MealSyncHandler = EntityHandler<Meal>;
pub type RecipeSyncHandler = EntityHandler<Recipe>;
pub type SupplementSyncHandler = EntityHandler<Supplement>;

impl<T: SyncableEntity> EntityHandler<T> {
    pub fn new(
        dao: Arc<dyn EntityDao<T>>,
        remote: Arc<dyn RemoteBackend>,
        encryptor: Arc<dyn FieldEncryptor>,
    ) -> Self {
        Self {
            dao,
            remote,
            encryptor,
            _entity: PhantomData,
        }
    }

    /// Handler whose local side is a [`SqliteDao`] over `store`.
    pub fn over_store(
        store: LocalStore,
        remote: Arc<dyn RemoteBackend>,
        encryptor: Arc<dyn FieldEncryptor>,
    ) -> Self {
        Self::new(Arc::new(SqliteDao::<T>::new(store)), remote, encryptor)
    }

    fn sensitive_fields(&self) -> &'static [&'static str] {
        SensitiveFieldsConfig::fields_for(T::ENTITY_TYPE)
    }
}

#[async_trait]
impl<T: SyncableEntity> EntitySyncHandler for EntityHandler<T> {
    type Entity = T;

    async fn get_local_entity(&self, id: &EntityId) -> SyncResult<Option<T>> {
        Ok(self.dao.get(id).await?)
    }

    async fn get_cloud_entity(&self, id: &EntityId) -> Option<RemoteRecord> {
        match self.remote.fetch(T::ENTITY_TYPE, id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    "Cloud read of {} {} failed, treating as absent: {}",
                    T::ENTITY_TYPE,
                    id,
                    e
                );
                None
            }
        }
    }

    async fn save_local_entity(&self, entity: &T) -> SyncResult<()> {
        self.dao.upsert(entity).await?;
        Ok(())
    }

    async fn upload_to_cloud(&self, record: &RemoteRecord) -> SyncResult<RemoteRecord> {
        self.remote.upsert(record).await
    }

    async fn delete_local_entity(&self, id: &EntityId) -> SyncResult<()> {
        Ok(self.dao.delete(id).await?)
    }

    async fn delete_cloud_entity(&self, id: &EntityId) -> SyncResult<()> {
        self.remote.soft_delete(T::ENTITY_TYPE, id).await
    }

    fn encrypt_sensitive_data(&self, entity: &T) -> SyncResult<RemoteRecord> {
        let attributes = entity.to_attributes()?;
        let sealed = self
            .encryptor
            .encrypt_fields(attributes, self.sensitive_fields())?;
        Ok(RemoteRecord::for_entity(entity, sealed))
    }

    fn decrypt_sensitive_data(&self, record: &RemoteRecord) -> SyncResult<T> {
        record.expect_type::<T>()?;
        let opened = self
            .encryptor
            .decrypt_fields(record.attributes.clone(), self.sensitive_fields())?;
        Ok(T::from_attributes(opened)?)
    }

    async fn local_changes(&self, user_id: &UserId) -> SyncResult<ChangeSet> {
        Ok(self.dao.pending_changes(user_id).await?)
    }

    async fn cloud_changes_since(&self, user_id: &UserId, since: Version) -> SyncResult<ChangeSet> {
        self.remote.changed_since(T::ENTITY_TYPE, user_id, since).await
    }

    async fn mark_local_synced(&self, id: &EntityId, version: Version) -> SyncResult<()> {
        self.dao.clear_pending(id, version).await?;
        Ok(())
    }
}
