//! Explicit entity-type → handler registry.

use crate::error::{SyncError, SyncResult};
use crate::handler::{
    BiomarkerSyncHandler, EntitySyncHandler, HealthMetricSyncHandler, MealSyncHandler,
    RecipeSyncHandler, SupplementSyncHandler,
};
use crate::reconcile::{reconcile_entity, Candidate, Resolution};
use crate::remote::RemoteBackend;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use welltrack_crypto::FieldEncryptor;
use welltrack_storage::LocalStore;
use welltrack_types::{ChangeSet, UserId, Version};

/// Type-erased view of an [`EntitySyncHandler`], as the coordinator sees it.
#[async_trait]
pub trait RegisteredHandler: Send + Sync {
    fn entity_type(&self) -> &'static str;

    async fn local_changes(&self, user_id: &UserId) -> SyncResult<ChangeSet>;

    async fn cloud_changes_since(&self, user_id: &UserId, since: Version)
    -> SyncResult<ChangeSet>;

    async fn reconcile(&self, candidate: &Candidate) -> SyncResult<Resolution>;
}

#[async_trait]
impl<H> RegisteredHandler for H
where
    H: EntitySyncHandler + 'static,
{
    fn entity_type(&self) -> &'static str {
        EntitySyncHandler::entity_type(self)
    }

    async fn local_changes(&self, user_id: &UserId) -> SyncResult<ChangeSet> {
        EntitySyncHandler::local_changes(self, user_id).await
    }

    async fn cloud_changes_since(&self, user_id: &UserId, since: Version) -> SyncResult<ChangeSet> {
        EntitySyncHandler::cloud_changes_since(self, user_id, since).await
    }

    async fn reconcile(&self, candidate: &Candidate) -> SyncResult<Resolution> {
        reconcile_entity(self, candidate).await
    }
}

/// Handlers keyed by entity type.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<&'static str, Arc<dyn RegisteredHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under its entity type.
    pub fn register<H>(&mut self, handler: H) -> SyncResult<()>
    where
        H: EntitySyncHandler + 'static,
    {
        self.register_shared(Arc::new(handler))
    }

    /// Registers an already shared handler.
    pub fn register_shared(&mut self, handler: Arc<dyn RegisteredHandler>) -> SyncResult<()> {
        let entity_type = handler.entity_type();
        if self.handlers.contains_key(entity_type) {
            return Err(SyncError::DuplicateHandler(entity_type.to_string()));
        }
        self.handlers.insert(entity_type, handler);
        Ok(())
    }

    pub fn get(&self, entity_type: &str) -> Option<Arc<dyn RegisteredHandler>> {
        self.handlers.get(entity_type).cloned()
    }

    /// Like [`get`](Self::get), failing with [`SyncError::UnknownEntityType`].
    pub fn require(&self, entity_type: &str) -> SyncResult<Arc<dyn RegisteredHandler>> {
        self.get(entity_type)
            .ok_or_else(|| SyncError::UnknownEntityType(entity_type.to_string()))
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.handlers.contains_key(entity_type)
    }

    /// Registered entity types, in sorted order.
    pub fn entity_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    pub fn handlers(&self) -> impl Iterator<Item = &Arc<dyn RegisteredHandler>> {
        self.handlers.values()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Registry with a handler for every built-in entity type, all sharing one
/// local store, backend and encryptor.
pub fn default_registry(
    store: LocalStore,
    remote: Arc<dyn RemoteBackend>,
    encryptor: Arc<dyn FieldEncryptor>,
) -> SyncResult<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();
    registry.register(HealthMetricSyncHandler::over_store(
        store.clone(),
        Arc::clone(&remote),
        Arc::clone(&encryptor),
    ))?;
    registry.register(BiomarkerSyncHandler::over_store(
        store.clone(),
        Arc::clone(&remote),
        Arc::clone(&encryptor),
    ))?;
    registry.register(MealSyncHandler::over_store(
        store.clone(),
        Arc::clone(&remote),
        Arc::clone(&encryptor),
    ))?;
    registry.register(RecipeSyncHandler::over_store(
        store.clone(),
        Arc::clone(&remote),
        Arc::clone(&encryptor),
    ))?;
    registry.register(SupplementSyncHandler::over_store(store, remote, encryptor))?;
    Ok(registry)
}
