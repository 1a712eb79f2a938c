//! Process-local backend for tests and offline development.

use super::RemoteBackend;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use serde_json::Map;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use welltrack_model::RemoteRecord;
use welltrack_types::{ChangeSet, EntityId, UserId, Version};

type Key = (String, EntityId);

/// Snapshot of how often each backend operation was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub fetch: usize,
    pub upsert: usize,
    pub soft_delete: usize,
    pub changed_since: usize,
}

impl CallCounts {
    /// Upserts plus soft deletes.
    pub fn writes(&self) -> usize {
        self.upsert + self.soft_delete
    }
}

#[derive(Debug, Default)]
struct Counters {
    fetch: AtomicUsize,
    upsert: AtomicUsize,
    soft_delete: AtomicUsize,
    changed_since: AtomicUsize,
}

/// In-memory [`RemoteBackend`] with call counters and failure injection.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<Key, RemoteRecord>>,
    counters: Counters,
    fail_reads: AtomicBool,
    fail_fetches: AtomicBool,
    fail_writes: AtomicBool,
    failing_ids: RwLock<HashSet<EntityId>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record directly, bypassing counters.
    pub async fn insert(&self, record: RemoteRecord) {
        self.records
            .write()
            .await
            .insert((record.entity_type.clone(), record.id.clone()), record);
    }

    /// Raw stored row, including soft-deleted ones.
    pub async fn get(&self, entity_type: &str, id: &EntityId) -> Option<RemoteRecord> {
        self.records
            .read()
            .await
            .get(&(entity_type.to_string(), id.clone()))
            .cloned()
    }

    /// Number of live rows of `entity_type`.
    pub async fn live_count(&self, entity_type: &str) -> usize {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.entity_type == entity_type && !r.deleted)
            .count()
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            fetch: self.counters.fetch.load(Ordering::SeqCst),
            upsert: self.counters.upsert.load(Ordering::SeqCst),
            soft_delete: self.counters.soft_delete.load(Ordering::SeqCst),
            changed_since: self.counters.changed_since.load(Ordering::SeqCst),
        }
    }

    pub fn reset_calls(&self) {
        self.counters.fetch.store(0, Ordering::SeqCst);
        self.counters.upsert.store(0, Ordering::SeqCst);
        self.counters.soft_delete.store(0, Ordering::SeqCst);
        self.counters.changed_since.store(0, Ordering::SeqCst);
    }

    /// Makes every `fetch` and `changed_since` fail with a network error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes `fetch` fail while the change feed keeps working.
    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Makes every `upsert` and `soft_delete` fail with a network error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes writes to `id` fail until cleared.
    pub async fn fail_writes_for(&self, id: EntityId) {
        self.failing_ids.write().await.insert(id);
    }

    pub async fn clear_failures(&self) {
        self.fail_reads.store(false, Ordering::SeqCst);
        self.fail_fetches.store(false, Ordering::SeqCst);
        self.fail_writes.store(false, Ordering::SeqCst);
        self.failing_ids.write().await.clear();
    }

    fn check_reads(&self) -> SyncResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::Network("injected read failure".into()));
        }
        Ok(())
    }

    async fn check_writes(&self, id: &EntityId) -> SyncResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) || self.failing_ids.read().await.contains(id) {
            return Err(SyncError::Network(format!("injected write failure for {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch(&self, entity_type: &str, id: &EntityId) -> SyncResult<Option<RemoteRecord>> {
        self.counters.fetch.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(SyncError::Network(format!("injected fetch failure for {id}")));
        }
        Ok(self.get(entity_type, id).await.filter(|r| !r.deleted))
    }

    async fn upsert(&self, record: &RemoteRecord) -> SyncResult<RemoteRecord> {
        self.counters.upsert.fetch_add(1, Ordering::SeqCst);
        self.check_writes(&record.id).await?;
        let mut stored = record.clone();
        stored.deleted = false;
        self.insert(stored.clone()).await;
        Ok(stored)
    }

    async fn soft_delete(&self, entity_type: &str, id: &EntityId) -> SyncResult<()> {
        self.counters.soft_delete.fetch_add(1, Ordering::SeqCst);
        self.check_writes(id).await?;
        let mut records = self.records.write().await;
        if let Some(row) = records.get_mut(&(entity_type.to_string(), id.clone())) {
            row.deleted = true;
            row.attributes = Map::new();
            row.version = row.version.max(Version::now());
        }
        Ok(())
    }

    async fn changed_since(
        &self,
        entity_type: &str,
        user_id: &UserId,
        since: Version,
    ) -> SyncResult<ChangeSet> {
        self.counters.changed_since.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        let records = self.records.read().await;
        let mut rows: Vec<&RemoteRecord> = records
            .values()
            .filter(|r| r.entity_type == entity_type && &r.user_id == user_id && r.version >= since)
            .collect();
        rows.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.id.cmp(&b.id)));

        let mut changes = ChangeSet::new();
        for row in rows {
            if row.deleted {
                changes.push_deleted(row.id.clone(), row.version);
            } else {
                changes.push_changed(row.id.clone(), row.version);
            }
        }
        Ok(changes)
    }
}
