//! Shared fixtures for sync tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use welltrack_crypto::{FieldEncryptor, FieldKey, KeyedFieldEncryptor};
use welltrack_model::{HealthMetric, RemoteRecord, SyncableEntity};
use welltrack_storage::LocalStore;
use welltrack_sync::{
    default_registry, EntitySyncHandler, HealthMetricSyncHandler, MemoryBackend,
    MemoryStatusStore, RemoteBackend, SessionContext, SyncConfig, SyncCoordinator, SyncResult,
    UserProfile,
};
use welltrack_types::{ChangeSet, DeviceId, EntityId, UserId, Version};

pub const USER: &str = "user-1";

/// Routes `tracing` output to the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deterministic key so sealed fixtures are reproducible across helpers.
pub fn test_key() -> FieldKey {
    FieldKey::from_bytes([7u8; 32])
}

pub fn encryptor() -> Arc<dyn FieldEncryptor> {
    Arc::new(KeyedFieldEncryptor::new(test_key()))
}

pub fn session() -> SessionContext {
    SessionContext::with_active(DeviceId::from("device-1"), UserProfile::new(USER, "Sam"))
}

pub fn metric(id: &str, secs: i64) -> HealthMetric {
    HealthMetric {
        id: EntityId::from(id),
        user_id: UserId::from(USER),
        metric_type: "heart_rate".into(),
        value: 61.0,
        unit: "bpm".into(),
        timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        source: "watch".into(),
        metadata: Some(r#"{"device":"watch","hrv":42}"#.into()),
        notes: Some("resting".into()),
        confidence: 0.9,
        is_manual_entry: false,
    }
}

/// Local store, in-memory backend and status store wired into a coordinator
/// with the default registry.
pub struct Fixture {
    pub store: LocalStore,
    pub remote: Arc<MemoryBackend>,
    pub status: Arc<MemoryStatusStore>,
    pub coordinator: SyncCoordinator,
    pub session: SessionContext,
}

impl Fixture {
    pub fn new() -> Self {
        init_tracing();
        let store = LocalStore::open_in_memory().unwrap();
        let remote = Arc::new(MemoryBackend::new());
        let status = Arc::new(MemoryStatusStore::new());
        let registry = default_registry(store.clone(), remote.clone(), encryptor()).unwrap();
        let coordinator = SyncCoordinator::new(registry, status.clone(), SyncConfig::default());
        Self {
            store,
            remote,
            status,
            coordinator,
            session: session(),
        }
    }

    /// Handler over the fixture's store and backend, for sealing fixtures.
    pub fn metric_handler(&self) -> HealthMetricSyncHandler {
        HealthMetricSyncHandler::over_store(self.store.clone(), self.remote.clone(), encryptor())
    }

    /// Puts a sealed copy of `metric` in the cloud without counting a call.
    pub async fn seed_cloud(&self, metric: &HealthMetric) -> RemoteRecord {
        let record = self.metric_handler().encrypt_sensitive_data(metric).unwrap();
        self.remote.insert(record.clone()).await;
        record
    }

    /// Stores `metric` locally as already synced.
    pub fn seed_local_synced(&self, metric: &HealthMetric) {
        let payload = serde_json::to_string(metric).unwrap();
        self.store
            .upsert_synced(
                HealthMetric::ENTITY_TYPE,
                &metric.id,
                &metric.user_id,
                metric.version(),
                &payload,
            )
            .unwrap();
    }
}

// ── Counting handler ─────────────────────────────────────────────

/// Write calls observed by a [`CountingHandler`].
#[derive(Debug, Default)]
pub struct WriteCounts {
    pub save_local: AtomicUsize,
    pub delete_local: AtomicUsize,
    pub upload: AtomicUsize,
    pub delete_cloud: AtomicUsize,
}

impl WriteCounts {
    pub fn total(&self) -> usize {
        self.save_local.load(Ordering::SeqCst)
            + self.delete_local.load(Ordering::SeqCst)
            + self.upload.load(Ordering::SeqCst)
            + self.delete_cloud.load(Ordering::SeqCst)
    }
}

/// Delegating handler that counts writes to either side.
pub struct CountingHandler<H> {
    pub inner: H,
    pub counts: Arc<WriteCounts>,
}

impl<H> CountingHandler<H> {
    pub fn new(inner: H) -> (Self, Arc<WriteCounts>) {
        let counts = Arc::new(WriteCounts::default());
        (
            Self {
                inner,
                counts: Arc::clone(&counts),
            },
            counts,
        )
    }
}

#[async_trait]
impl<H: EntitySyncHandler> EntitySyncHandler for CountingHandler<H> {
    type Entity = H::Entity;

    async fn get_local_entity(&self, id: &EntityId) -> SyncResult<Option<H::Entity>> {
        self.inner.get_local_entity(id).await
    }

    async fn get_cloud_entity(&self, id: &EntityId) -> Option<RemoteRecord> {
        self.inner.get_cloud_entity(id).await
    }

    async fn save_local_entity(&self, entity: &H::Entity) -> SyncResult<()> {
        self.counts.save_local.fetch_add(1, Ordering::SeqCst);
        self.inner.save_local_entity(entity).await
    }

    async fn upload_to_cloud(&self, record: &RemoteRecord) -> SyncResult<RemoteRecord> {
        self.counts.upload.fetch_add(1, Ordering::SeqCst);
        self.inner.upload_to_cloud(record).await
    }

    async fn delete_local_entity(&self, id: &EntityId) -> SyncResult<()> {
        self.counts.delete_local.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_local_entity(id).await
    }

    async fn delete_cloud_entity(&self, id: &EntityId) -> SyncResult<()> {
        self.counts.delete_cloud.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_cloud_entity(id).await
    }

    fn encrypt_sensitive_data(&self, entity: &H::Entity) -> SyncResult<RemoteRecord> {
        self.inner.encrypt_sensitive_data(entity)
    }

    fn decrypt_sensitive_data(&self, record: &RemoteRecord) -> SyncResult<H::Entity> {
        self.inner.decrypt_sensitive_data(record)
    }

    async fn local_changes(&self, user_id: &UserId) -> SyncResult<ChangeSet> {
        self.inner.local_changes(user_id).await
    }

    async fn cloud_changes_since(&self, user_id: &UserId, since: Version) -> SyncResult<ChangeSet> {
        self.inner.cloud_changes_since(user_id, since).await
    }

    async fn mark_local_synced(&self, id: &EntityId, version: Version) -> SyncResult<()> {
        self.inner.mark_local_synced(id, version).await
    }
}

// ── Stalling backend ─────────────────────────────────────────────

/// Backend whose writes never complete. Reads go to the wrapped backend.
pub struct StallingBackend {
    pub inner: Arc<MemoryBackend>,
}

#[async_trait]
impl RemoteBackend for StallingBackend {
    fn name(&self) -> &'static str {
        "stalling"
    }

    async fn fetch(&self, entity_type: &str, id: &EntityId) -> SyncResult<Option<RemoteRecord>> {
        self.inner.fetch(entity_type, id).await
    }

    async fn upsert(&self, _record: &RemoteRecord) -> SyncResult<RemoteRecord> {
        std::future::pending().await
    }

    async fn soft_delete(&self, _entity_type: &str, _id: &EntityId) -> SyncResult<()> {
        std::future::pending().await
    }

    async fn changed_since(
        &self,
        entity_type: &str,
        user_id: &UserId,
        since: Version,
    ) -> SyncResult<ChangeSet> {
        self.inner.changed_since(entity_type, user_id, since).await
    }
}

// ── Interleaved edit backend ─────────────────────────────────────

/// Backend that records a local edit right after the first upsert lands,
/// the way the app can write while a pass is uploading.
pub struct EditDuringUploadBackend {
    pub inner: Arc<MemoryBackend>,
    pub store: LocalStore,
    pub edit: std::sync::Mutex<Option<HealthMetric>>,
}

impl EditDuringUploadBackend {
    pub fn new(inner: Arc<MemoryBackend>, store: LocalStore, edit: HealthMetric) -> Self {
        Self {
            inner,
            store,
            edit: std::sync::Mutex::new(Some(edit)),
        }
    }
}

#[async_trait]
impl RemoteBackend for EditDuringUploadBackend {
    fn name(&self) -> &'static str {
        "edit-during-upload"
    }

    async fn fetch(&self, entity_type: &str, id: &EntityId) -> SyncResult<Option<RemoteRecord>> {
        self.inner.fetch(entity_type, id).await
    }

    async fn upsert(&self, record: &RemoteRecord) -> SyncResult<RemoteRecord> {
        let stored = self.inner.upsert(record).await?;
        if let Some(edit) = self.edit.lock().unwrap().take() {
            self.store.record_local_edit(&edit).unwrap();
        }
        Ok(stored)
    }

    async fn soft_delete(&self, entity_type: &str, id: &EntityId) -> SyncResult<()> {
        self.inner.soft_delete(entity_type, id).await
    }

    async fn changed_since(
        &self,
        entity_type: &str,
        user_id: &UserId,
        since: Version,
    ) -> SyncResult<ChangeSet> {
        self.inner.changed_since(entity_type, user_id, since).await
    }
}
