//! Per-user, per-entity-type sync checkpoints.
//!
//! A [`SyncStatus`] row is created on the first sync attempt for a
//! `(user, entity type)` pair and updated after every pass. Rows are only
//! removed when the user's data is wiped.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use welltrack_types::{UserId, Version};

/// Base delay before retrying after a failed pass.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on the retry delay.
pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(5 * 60);

/// Sync bookkeeping for one `(user, entity type)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub user_id: UserId,
    pub entity_type: String,
    /// Cloud changes at or after this version are considered on the next pass.
    pub last_synced_version: Version,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl SyncStatus {
    /// A status for a pair that has never synced.
    pub fn new(user_id: UserId, entity_type: impl Into<String>) -> Self {
        Self {
            user_id,
            entity_type: entity_type.into(),
            last_synced_version: Version::ZERO,
            last_attempt_at: None,
            last_success_at: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }

    /// Records a clean pass. The checkpoint never moves backwards.
    pub fn record_success(&mut self, checkpoint: Version, at: DateTime<Utc>) {
        self.last_synced_version = self.last_synced_version.max(checkpoint);
        self.last_attempt_at = Some(at);
        self.last_success_at = Some(at);
        self.consecutive_failures = 0;
        self.last_error = None;
    }

    /// Records a pass that left work for the next attempt.
    pub fn record_failure(&mut self, error: impl Into<String>, at: DateTime<Utc>) {
        self.last_attempt_at = Some(at);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.into());
    }

    /// Exponential backoff before the next attempt: zero after a success,
    /// otherwise `RETRY_BASE_DELAY * 2^failures`, capped at `RETRY_MAX_DELAY`.
    pub fn retry_delay(&self) -> Duration {
        if self.consecutive_failures == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(self.consecutive_failures).unwrap_or(u32::MAX);
        RETRY_BASE_DELAY
            .checked_mul(factor)
            .map_or(RETRY_MAX_DELAY, |d| d.min(RETRY_MAX_DELAY))
    }

    /// Returns true if the scheduler may attempt another pass at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_attempt_at {
            None => true,
            Some(last) => {
                let Ok(delay) = chrono::Duration::from_std(self.retry_delay()) else {
                    return false;
                };
                last.checked_add_signed(delay).is_none_or(|due| now >= due)
            }
        }
    }
}

/// Durable storage for [`SyncStatus`] rows.
#[async_trait]
pub trait SyncStatusStore: Send + Sync {
    async fn get(&self, user_id: &UserId, entity_type: &str) -> SyncResult<Option<SyncStatus>>;

    /// Last write wins.
    async fn set(&self, status: &SyncStatus) -> SyncResult<()>;

    async fn list_for_user(&self, user_id: &UserId) -> SyncResult<Vec<SyncStatus>>;

    /// Removes every row of `user_id`. Returns the number removed.
    async fn wipe_user(&self, user_id: &UserId) -> SyncResult<usize>;

    /// Returns the stored row, creating and persisting a fresh one if absent.
    async fn get_or_create(&self, user_id: &UserId, entity_type: &str) -> SyncResult<SyncStatus> {
        if let Some(status) = self.get(user_id, entity_type).await? {
            return Ok(status);
        }
        let status = SyncStatus::new(user_id.clone(), entity_type);
        self.set(&status).await?;
        Ok(status)
    }
}

// ── In-memory ────────────────────────────────────────────────────

/// Process-local status store.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    rows: RwLock<BTreeMap<(UserId, String), SyncStatus>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncStatusStore for MemoryStatusStore {
    async fn get(&self, user_id: &UserId, entity_type: &str) -> SyncResult<Option<SyncStatus>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&(user_id.clone(), entity_type.to_string())).cloned())
    }

    async fn set(&self, status: &SyncStatus) -> SyncResult<()> {
        self.rows.write().await.insert(
            (status.user_id.clone(), status.entity_type.clone()),
            status.clone(),
        );
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId) -> SyncResult<Vec<SyncStatus>> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|s| &s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn wipe_user(&self, user_id: &UserId) -> SyncResult<usize> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|(user, _), _| user != user_id);
        Ok(before - rows.len())
    }
}

// ── SQLite ───────────────────────────────────────────────────────

/// Status store backed by its own SQLite file, separate from entity data.
#[derive(Clone)]
pub struct SqliteStatusStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStatusStore {
    /// Opens (or creates) a status store at the given path.
    pub fn open(path: impl AsRef<Path>) -> SyncResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| SyncError::StatusStore(format!("failed to open status store: {e}")))?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory status store (for testing).
    pub fn open_in_memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            SyncError::StatusStore(format!("failed to open in-memory status store: {e}"))
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> SyncResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sync_status (
                user_id TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                last_synced_version INTEGER NOT NULL DEFAULT 0,
                last_attempt_at INTEGER,
                last_success_at INTEGER,
                consecutive_failures INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                PRIMARY KEY (user_id, entity_type)
            );
            ",
        )
        .map_err(|e| SyncError::StatusStore(format!("failed to init status schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<R, F>(&self, f: F) -> SyncResult<R>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| SyncError::StatusStore("status store lock poisoned".into()))?;
            f(&guard).map_err(|e| SyncError::StatusStore(format!("status query failed: {e}")))
        })
        .await
        .map_err(|e| SyncError::StatusStore(format!("status task failed: {e}")))?
    }
}

fn to_millis(at: Option<DateTime<Utc>>) -> Option<i64> {
    at.map(|t| t.timestamp_millis())
}

fn from_millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

fn status_from_row(row: &Row<'_>) -> rusqlite::Result<SyncStatus> {
    let user_id: String = row.get(0)?;
    let failures: i64 = row.get(5)?;
    Ok(SyncStatus {
        user_id: UserId::from(user_id),
        entity_type: row.get(1)?,
        last_synced_version: Version::from_secs(row.get(2)?),
        last_attempt_at: from_millis(row.get(3)?),
        last_success_at: from_millis(row.get(4)?),
        consecutive_failures: u32::try_from(failures).unwrap_or(u32::MAX),
        last_error: row.get(6)?,
    })
}

const SELECT_COLUMNS: &str = "SELECT user_id, entity_type, last_synced_version, last_attempt_at,
        last_success_at, consecutive_failures, last_error FROM sync_status";

#[async_trait]
impl SyncStatusStore for SqliteStatusStore {
    async fn get(&self, user_id: &UserId, entity_type: &str) -> SyncResult<Option<SyncStatus>> {
        let user_id = user_id.as_str().to_string();
        let entity_type = entity_type.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE user_id = ?1 AND entity_type = ?2"),
                params![user_id, entity_type],
                status_from_row,
            )
            .optional()
        })
        .await
    }

    async fn set(&self, status: &SyncStatus) -> SyncResult<()> {
        let status = status.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sync_status (user_id, entity_type, last_synced_version,
                    last_attempt_at, last_success_at, consecutive_failures, last_error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (user_id, entity_type) DO UPDATE SET
                    last_synced_version = excluded.last_synced_version,
                    last_attempt_at = excluded.last_attempt_at,
                    last_success_at = excluded.last_success_at,
                    consecutive_failures = excluded.consecutive_failures,
                    last_error = excluded.last_error",
                params![
                    status.user_id.as_str(),
                    status.entity_type,
                    status.last_synced_version.as_secs(),
                    to_millis(status.last_attempt_at),
                    to_millis(status.last_success_at),
                    i64::from(status.consecutive_failures),
                    status.last_error,
                ],
            )
            .map(|_| ())
        })
        .await
    }

    async fn list_for_user(&self, user_id: &UserId) -> SyncResult<Vec<SyncStatus>> {
        let user_id = user_id.as_str().to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY entity_type"
            ))?;
            let rows = stmt.query_map(params![user_id], status_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }

    async fn wipe_user(&self, user_id: &UserId) -> SyncResult<usize> {
        let user_id = user_id.as_str().to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM sync_status WHERE user_id = ?1", params![user_id])
        })
        .await
    }
}
