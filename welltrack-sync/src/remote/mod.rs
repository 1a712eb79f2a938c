//! Remote backend abstraction.
//!
//! A backend stores [`RemoteRecord`]s (sensitive attributes already sealed)
//! per entity type and reports which ids changed since a version.

mod memory;
mod rest;

pub use memory::{CallCounts, MemoryBackend};
pub use rest::RestBackend;

use crate::error::SyncResult;
use async_trait::async_trait;
use welltrack_model::RemoteRecord;
use welltrack_types::{ChangeSet, EntityId, UserId, Version};

/// Cloud-side record storage.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Returns the name of the backend.
    fn name(&self) -> &'static str;

    /// Fetches a live record. Soft-deleted rows are reported as absent.
    async fn fetch(&self, entity_type: &str, id: &EntityId) -> SyncResult<Option<RemoteRecord>>;

    /// Inserts or replaces a record and returns the stored canonical copy.
    async fn upsert(&self, record: &RemoteRecord) -> SyncResult<RemoteRecord>;

    /// Marks a record deleted. Absent records are not an error.
    async fn soft_delete(&self, entity_type: &str, id: &EntityId) -> SyncResult<()>;

    /// Ids of `user_id`'s records whose version is at or after `since`.
    /// Soft-deleted rows are reported in `deleted`.
    async fn changed_since(
        &self,
        entity_type: &str,
        user_id: &UserId,
        since: Version,
    ) -> SyncResult<ChangeSet>;
}
