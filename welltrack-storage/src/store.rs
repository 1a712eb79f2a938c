//! SQLite-backed local store.
//!
//! One `entities` table holds every record type as a JSON payload keyed by
//! `(entity_type, id)`. Two flags drive sync:
//! - `dirty`: edited on this device and not yet reconciled with the cloud
//! - `deleted`: tombstone left by a local delete until the cloud learns of it
//!
//! Writes made by the app go through `record_local_*` and set `dirty`.
//! Writes made by sync go through `upsert_synced` / `delete` and leave rows clean.
//! A sync write never replaces a dirty row that carries a newer version, so an
//! edit made while a pass is running survives and stays pending.

use crate::cache::LruCache;
use crate::error::{StorageError, StorageResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use welltrack_model::SyncableEntity;
use welltrack_types::{ChangeSet, EntityId, UserId, Version};

/// Default number of payloads kept in the read cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

type CacheKey = (String, String);

/// Shared handle to the on-device database. Cloning is cheap.
#[derive(Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
    cache: Arc<Mutex<LruCache<CacheKey, String>>>,
}

impl LocalStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_cache(path, DEFAULT_CACHE_CAPACITY)
    }

    /// Opens a store with a custom read-cache capacity.
    pub fn open_with_cache(path: impl AsRef<Path>, cache_capacity: usize) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, cache_capacity)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, DEFAULT_CACHE_CAPACITY)
    }

    fn from_connection(conn: Connection, cache_capacity: usize) -> StorageResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            cache: Arc::new(Mutex::new(LruCache::new(cache_capacity))),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entities (
                entity_type TEXT NOT NULL,
                id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                payload TEXT,
                dirty INTEGER NOT NULL DEFAULT 0,
                deleted INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (entity_type, id)
            );

            CREATE INDEX IF NOT EXISTS idx_entities_pending
                ON entities (entity_type, user_id, dirty);
            ",
        )?;
        Ok(())
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn cache(&self) -> StorageResult<MutexGuard<'_, LruCache<CacheKey, String>>> {
        self.cache.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn invalidate(&self, entity_type: &str, id: &EntityId) -> StorageResult<()> {
        self.cache()?
            .remove(&(entity_type.to_string(), id.as_str().to_string()));
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Returns the JSON payload of a live (non-tombstoned) row.
    pub fn get_payload(&self, entity_type: &str, id: &EntityId) -> StorageResult<Option<String>> {
        let key = (entity_type.to_string(), id.as_str().to_string());
        if let Some(hit) = self.cache()?.get(&key) {
            return Ok(Some(hit));
        }

        let payload: Option<String> = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT payload FROM entities
                 WHERE entity_type = ?1 AND id = ?2 AND deleted = 0",
                params![entity_type, id.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .flatten()
        };

        if let Some(p) = &payload {
            self.cache()?.put(key, p.clone());
        }
        Ok(payload)
    }

    /// Loads and decodes a live record.
    pub fn load<T: SyncableEntity>(&self, id: &EntityId) -> StorageResult<Option<T>> {
        self.get_payload(T::ENTITY_TYPE, id)?
            .map(|p| serde_json::from_str(&p).map_err(StorageError::from))
            .transpose()
    }

    /// Returns true if the row is dirty (edited or deleted locally, not yet synced).
    pub fn is_dirty(&self, entity_type: &str, id: &EntityId) -> StorageResult<bool> {
        let conn = self.conn()?;
        let dirty: Option<bool> = conn
            .query_row(
                "SELECT dirty FROM entities WHERE entity_type = ?1 AND id = ?2",
                params![entity_type, id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(dirty.unwrap_or(false))
    }

    /// Dirty rows and tombstones owned by `user_id`.
    pub fn pending_changes(&self, entity_type: &str, user_id: &UserId) -> StorageResult<ChangeSet> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, version, deleted FROM entities
             WHERE entity_type = ?1 AND user_id = ?2 AND dirty = 1
             ORDER BY version ASC",
        )?;
        let rows = stmt.query_map(params![entity_type, user_id.as_str()], |row| {
            let id: String = row.get(0)?;
            let version: i64 = row.get(1)?;
            let deleted: bool = row.get(2)?;
            Ok((id, version, deleted))
        })?;

        let mut changes = ChangeSet::new();
        for row in rows {
            let (id, version, deleted) = row?;
            let id = EntityId::from(id);
            let version = Version::from_secs(version);
            if deleted {
                changes.push_deleted(id, version);
            } else {
                changes.push_changed(id, version);
            }
        }
        Ok(changes)
    }

    /// Number of live rows of `entity_type`.
    pub fn count(&self, entity_type: &str) -> StorageResult<usize> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE entity_type = ?1 AND deleted = 0",
            params![entity_type],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    // ── App-facing writes ────────────────────────────────────────

    /// Saves a record edited on this device and marks it for upload.
    pub fn record_local_edit<T: SyncableEntity>(&self, entity: &T) -> StorageResult<()> {
        let payload = serde_json::to_string(entity)?;
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO entities (entity_type, id, user_id, version, payload, dirty, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, 0)
                 ON CONFLICT (entity_type, id) DO UPDATE SET
                    user_id = excluded.user_id,
                    version = excluded.version,
                    payload = excluded.payload,
                    dirty = 1,
                    deleted = 0",
                params![
                    T::ENTITY_TYPE,
                    entity.id().as_str(),
                    entity.user_id().as_str(),
                    entity.version().as_secs(),
                    payload
                ],
            )?;
        }
        self.cache()?
            .put((T::ENTITY_TYPE.to_string(), entity.id().as_str().to_string()), payload);
        Ok(())
    }

    /// Deletes a record on this device, leaving a tombstone for the next sync.
    pub fn record_local_delete(
        &self,
        entity_type: &str,
        id: &EntityId,
        user_id: &UserId,
        deleted_at: Version,
    ) -> StorageResult<()> {
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO entities (entity_type, id, user_id, version, payload, dirty, deleted)
                 VALUES (?1, ?2, ?3, ?4, NULL, 1, 1)
                 ON CONFLICT (entity_type, id) DO UPDATE SET
                    version = excluded.version,
                    payload = NULL,
                    dirty = 1,
                    deleted = 1",
                params![entity_type, id.as_str(), user_id.as_str(), deleted_at.as_secs()],
            )?;
        }
        debug!("Tombstoned {} {}", entity_type, id);
        self.invalidate(entity_type, id)
    }

    // ── Sync-facing writes ───────────────────────────────────────

    /// Upserts a record that already matches the cloud and leaves the row
    /// clean. A dirty row (or tombstone) with a newer version is kept as is.
    /// Returns false if the write was skipped for that reason.
    pub fn upsert_synced(
        &self,
        entity_type: &str,
        id: &EntityId,
        user_id: &UserId,
        version: Version,
        payload: &str,
    ) -> StorageResult<bool> {
        let written = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO entities (entity_type, id, user_id, version, payload, dirty, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, 0)
                 ON CONFLICT (entity_type, id) DO UPDATE SET
                    user_id = excluded.user_id,
                    version = excluded.version,
                    payload = excluded.payload,
                    dirty = 0,
                    deleted = 0
                 WHERE entities.dirty = 0 OR entities.version <= excluded.version",
                params![entity_type, id.as_str(), user_id.as_str(), version.as_secs(), payload],
            )? > 0
        };

        if written {
            self.cache()?
                .put((entity_type.to_string(), id.as_str().to_string()), payload.to_string());
        } else {
            debug!("Kept newer local edit of {} {}", entity_type, id);
        }
        Ok(written)
    }

    /// Removes a row and any tombstone. Absent rows are not an error.
    pub fn delete(&self, entity_type: &str, id: &EntityId) -> StorageResult<()> {
        {
            let conn = self.conn()?;
            conn.execute(
                "DELETE FROM entities WHERE entity_type = ?1 AND id = ?2",
                params![entity_type, id.as_str()],
            )?;
        }
        self.invalidate(entity_type, id)
    }

    /// Marks a row reconciled. Rows edited after `up_to` stay dirty.
    /// Tombstones at or before `up_to` are removed. Returns true if a row
    /// was cleared.
    pub fn clear_pending(
        &self,
        entity_type: &str,
        id: &EntityId,
        up_to: Version,
    ) -> StorageResult<bool> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let removed = tx.execute(
            "DELETE FROM entities
             WHERE entity_type = ?1 AND id = ?2 AND deleted = 1 AND version <= ?3",
            params![entity_type, id.as_str(), up_to.as_secs()],
        )?;
        let cleaned = tx.execute(
            "UPDATE entities SET dirty = 0
             WHERE entity_type = ?1 AND id = ?2 AND deleted = 0 AND version <= ?3",
            params![entity_type, id.as_str(), up_to.as_secs()],
        )?;
        tx.commit()?;
        Ok(removed + cleaned > 0)
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").finish_non_exhaustive()
    }
}
