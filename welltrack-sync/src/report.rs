//! Results of sync passes.

use crate::reconcile::Resolution;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use welltrack_types::{EntityId, UserId, Version};

/// Overall outcome of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassOutcome {
    /// Every candidate reconciled and the checkpoint advanced.
    Success,
    /// Some work succeeded; the rest is retried next pass.
    PartialSuccess,
    /// Nothing succeeded, or the pass was aborted.
    Failed,
}

/// An entity that could not be reconciled this pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFailure {
    pub id: EntityId,
    pub error: String,
}

/// Result of one pass over one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeReport {
    pub entity_type: String,
    pub candidates: usize,
    pub pushed: usize,
    pub pulled: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failures: Vec<EntityFailure>,
    /// Set when the cloud change feed could not be read.
    pub feed_error: Option<String>,
    /// Set when the pass was aborted by a fatal error.
    pub fatal_error: Option<String>,
    /// Checkpoint stored at the end of the pass.
    pub checkpoint: Version,
    pub checkpoint_advanced: bool,
}

impl EntityTypeReport {
    pub fn new(entity_type: impl Into<String>, checkpoint: Version) -> Self {
        Self {
            entity_type: entity_type.into(),
            candidates: 0,
            pushed: 0,
            pulled: 0,
            deleted: 0,
            unchanged: 0,
            failures: Vec::new(),
            feed_error: None,
            fatal_error: None,
            checkpoint,
            checkpoint_advanced: false,
        }
    }

    /// Report for a pass that aborted before reconciling anything.
    pub fn aborted(entity_type: impl Into<String>, error: impl Into<String>) -> Self {
        let mut report = Self::new(entity_type, Version::ZERO);
        report.fatal_error = Some(error.into());
        report
    }

    pub fn record(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Pushed => self.pushed += 1,
            Resolution::Pulled => self.pulled += 1,
            Resolution::Deleted => self.deleted += 1,
            Resolution::NoOp => self.unchanged += 1,
        }
    }

    pub fn record_failure(&mut self, id: EntityId, error: impl Into<String>) {
        self.failures.push(EntityFailure {
            id,
            error: error.into(),
        });
    }

    /// Number of candidates resolved without error.
    pub fn succeeded(&self) -> usize {
        self.pushed + self.pulled + self.deleted + self.unchanged
    }

    /// Number of writes issued (uploads, local saves and deletions).
    pub fn writes(&self) -> usize {
        self.pushed + self.pulled + self.deleted
    }

    /// True when every candidate reconciled and the feed was read.
    pub fn is_clean(&self) -> bool {
        self.fatal_error.is_none() && self.feed_error.is_none() && self.failures.is_empty()
    }

    pub fn outcome(&self) -> PassOutcome {
        if self.fatal_error.is_some() {
            PassOutcome::Failed
        } else if self.is_clean() {
            PassOutcome::Success
        } else if self.succeeded() > 0 {
            PassOutcome::PartialSuccess
        } else {
            PassOutcome::Failed
        }
    }
}

/// Result of a pass over every registered entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entity_types: Vec<EntityTypeReport>,
}

impl SyncReport {
    pub fn get(&self, entity_type: &str) -> Option<&EntityTypeReport> {
        self.entity_types
            .iter()
            .find(|r| r.entity_type == entity_type)
    }

    pub fn total_pushed(&self) -> usize {
        self.entity_types.iter().map(|r| r.pushed).sum()
    }

    pub fn total_pulled(&self) -> usize {
        self.entity_types.iter().map(|r| r.pulled).sum()
    }

    pub fn total_deleted(&self) -> usize {
        self.entity_types.iter().map(|r| r.deleted).sum()
    }

    pub fn total_failures(&self) -> usize {
        self.entity_types.iter().map(|r| r.failures.len()).sum()
    }

    pub fn outcome(&self) -> PassOutcome {
        let outcomes: Vec<PassOutcome> = self.entity_types.iter().map(|r| r.outcome()).collect();
        if outcomes.iter().all(|o| *o == PassOutcome::Success) {
            PassOutcome::Success
        } else if outcomes.iter().all(|o| *o == PassOutcome::Failed) {
            PassOutcome::Failed
        } else {
            PassOutcome::PartialSuccess
        }
    }
}

/// Pending work and checkpoint for one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeStats {
    pub entity_type: String,
    /// Local edits and deletions not yet reconciled.
    pub pending_local: usize,
    pub last_synced_version: Version,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

/// Snapshot of sync state for the active user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub user_id: UserId,
    pub entity_types: Vec<EntityTypeStats>,
}

impl SyncStats {
    pub fn total_pending(&self) -> usize {
        self.entity_types.iter().map(|s| s.pending_local).sum()
    }

    /// Entity types whose last pass did not succeed.
    pub fn failing(&self) -> impl Iterator<Item = &EntityTypeStats> {
        self.entity_types
            .iter()
            .filter(|s| s.consecutive_failures > 0)
    }

    /// Most recent successful pass across all types.
    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.entity_types.iter().filter_map(|s| s.last_success_at).max()
    }
}
