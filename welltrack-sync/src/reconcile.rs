//! Per-entity reconciliation.
//!
//! A pass turns the local and cloud change sets into [`Candidate`]s, one per
//! id, and resolves each one independently:
//!
//! | local | cloud | action |
//! |---|---|---|
//! | present | absent | seal, upload, store the canonical copy locally |
//! | absent | present | open, store locally |
//! | newer | older | seal, upload, store the canonical copy locally |
//! | older | newer | open, store locally |
//! | equal | equal | nothing |
//! | absent | absent | delete on both sides |
//!
//! A local tombstone deletes the cloud copy; a cloud soft delete removes the
//! local copy. An id the cloud feed listed as live is never treated as absent
//! in the cloud: if its read comes back empty the candidate fails with a
//! retryable error and the checkpoint holds.
//!
//! Versions on both sides come from the entity itself, so the cloud copy is
//! opened before it is compared.

use crate::error::{SyncError, SyncResult};
use crate::handler::EntitySyncHandler;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;
use welltrack_types::{ChangeSet, EntityId, Version};

/// Which copy wins when both sides hold a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictOutcome {
    LocalWins,
    RemoteWins,
    /// Versions are equal; the copies are considered reconciled.
    NoOp,
}

/// Compares versions. Ties are not conflicts.
pub fn resolve_conflict(local: Version, remote: Version) -> ConflictOutcome {
    match local.cmp(&remote) {
        Ordering::Greater => ConflictOutcome::LocalWins,
        Ordering::Less => ConflictOutcome::RemoteWins,
        Ordering::Equal => ConflictOutcome::NoOp,
    }
}

/// An id to reconcile in this pass and why it was picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Edited on at least one side. `locally_dirty` is set when the local
    /// store reported it, `in_cloud_feed` when the cloud feed listed it live.
    Changed {
        id: EntityId,
        locally_dirty: bool,
        in_cloud_feed: bool,
    },
    /// Deleted on this device at `deleted_at`.
    DeletedLocally { id: EntityId, deleted_at: Version },
    /// Soft-deleted in the cloud and not edited locally.
    DeletedRemotely(EntityId),
}

impl Candidate {
    pub fn id(&self) -> &EntityId {
        match self {
            Self::Changed { id, .. }
            | Self::DeletedLocally { id, .. }
            | Self::DeletedRemotely(id) => id,
        }
    }
}

/// How a candidate was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// The local copy was uploaded.
    Pushed,
    /// The cloud copy was stored locally.
    Pulled,
    /// A deletion was propagated.
    Deleted,
    /// Nothing to do.
    NoOp,
}

/// Merges both change sets into one candidate per id.
///
/// Local intent takes precedence: a local tombstone beats any cloud change,
/// and a local edit beats a cloud delete (the edit is re-uploaded).
pub fn collect_candidates(local: &ChangeSet, cloud: &ChangeSet) -> Vec<Candidate> {
    let cloud_live: BTreeSet<&EntityId> = cloud.changed.iter().collect();
    let mut seen = HashSet::new();
    let mut candidates = Vec::with_capacity(local.len() + cloud.len());

    for id in &local.deleted {
        if seen.insert(id.clone()) {
            let deleted_at = local.version_of(id).unwrap_or_else(Version::now);
            candidates.push(Candidate::DeletedLocally {
                id: id.clone(),
                deleted_at,
            });
        }
    }
    for id in &local.changed {
        if seen.insert(id.clone()) {
            candidates.push(Candidate::Changed {
                id: id.clone(),
                locally_dirty: true,
                in_cloud_feed: cloud_live.contains(id),
            });
        }
    }
    for id in &cloud.deleted {
        if seen.insert(id.clone()) {
            candidates.push(Candidate::DeletedRemotely(id.clone()));
        }
    }
    for id in &cloud.changed {
        if seen.insert(id.clone()) {
            candidates.push(Candidate::Changed {
                id: id.clone(),
                locally_dirty: false,
                in_cloud_feed: true,
            });
        }
    }
    candidates
}

/// Resolves one candidate through `handler`.
pub async fn reconcile_entity<H>(handler: &H, candidate: &Candidate) -> SyncResult<Resolution>
where
    H: EntitySyncHandler + ?Sized,
{
    let resolution = match candidate {
        Candidate::DeletedLocally { id, deleted_at } => {
            handler.delete_cloud_entity(id).await?;
            handler.mark_local_synced(id, *deleted_at).await?;
            Resolution::Deleted
        }
        Candidate::DeletedRemotely(id) => {
            if handler.get_local_entity(id).await?.is_some() {
                handler.delete_local_entity(id).await?;
                Resolution::Deleted
            } else {
                Resolution::NoOp
            }
        }
        Candidate::Changed {
            id,
            locally_dirty,
            in_cloud_feed,
        } => reconcile_pair(handler, id, *locally_dirty, *in_cloud_feed).await?,
    };

    debug!(
        "Reconciled {} {}: {:?}",
        handler.entity_type(),
        candidate.id(),
        resolution
    );
    Ok(resolution)
}

async fn reconcile_pair<H>(
    handler: &H,
    id: &EntityId,
    locally_dirty: bool,
    in_cloud_feed: bool,
) -> SyncResult<Resolution>
where
    H: EntitySyncHandler + ?Sized,
{
    let local = handler.get_local_entity(id).await?;
    let cloud = handler.get_cloud_entity(id).await;

    match (local, cloud) {
        (_, None) if in_cloud_feed => Err(SyncError::CloudCopyUnavailable {
            entity_type: handler.entity_type().to_string(),
            id: id.to_string(),
        }),
        (Some(local), None) => push(handler, &local).await,
        (None, Some(cloud)) => pull(handler, &handler.decrypt_sensitive_data(&cloud)?).await,
        (Some(local), Some(cloud)) => {
            let remote = handler.decrypt_sensitive_data(&cloud)?;
            let local_version = handler.entity_version(&local);
            let remote_version = handler.entity_version(&remote);
            match resolve_conflict(local_version, remote_version) {
                ConflictOutcome::LocalWins => push(handler, &local).await,
                ConflictOutcome::RemoteWins => pull(handler, &remote).await,
                ConflictOutcome::NoOp => {
                    if locally_dirty {
                        handler.mark_local_synced(id, local_version).await?;
                    }
                    Ok(Resolution::NoOp)
                }
            }
        }
        // Only reachable for a locally reported id whose row went away during
        // the pass: the device deleted it, so the cloud copy goes too.
        (None, None) => {
            handler.delete_cloud_entity(id).await?;
            handler.delete_local_entity(id).await?;
            Ok(Resolution::Deleted)
        }
    }
}

async fn push<H>(handler: &H, local: &H::Entity) -> SyncResult<Resolution>
where
    H: EntitySyncHandler + ?Sized,
{
    let sealed = handler.encrypt_sensitive_data(local)?;
    let canonical = handler.upload_to_cloud(&sealed).await?;
    let stored = handler.decrypt_sensitive_data(&canonical)?;
    handler.save_local_entity(&stored).await?;
    Ok(Resolution::Pushed)
}

async fn pull<H>(handler: &H, remote: &H::Entity) -> SyncResult<Resolution>
where
    H: EntitySyncHandler + ?Sized,
{
    handler.save_local_entity(remote).await?;
    Ok(Resolution::Pulled)
}
