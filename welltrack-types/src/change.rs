use crate::{EntityId, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Candidate ids reported by one side of a sync pass.
///
/// The local store reports dirty rows and tombstones; the cloud reports rows
/// changed since the last checkpoint. `high_watermark` is the largest version
/// the reporting side saw, used to advance the checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Ids that were created or modified.
    pub changed: Vec<EntityId>,
    /// Ids that were deleted.
    pub deleted: Vec<EntityId>,
    /// Largest version observed while building this set.
    pub high_watermark: Option<Version>,
    /// Version reported for each id.
    #[serde(default)]
    pub versions: BTreeMap<EntityId, Version>,
}

impl ChangeSet {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }

    /// Total number of ids in the set.
    pub fn len(&self) -> usize {
        self.changed.len() + self.deleted.len()
    }

    /// Records a changed id, raising the watermark if needed.
    pub fn push_changed(&mut self, id: EntityId, version: Version) {
        self.versions.insert(id.clone(), version);
        self.changed.push(id);
        self.observe(version);
    }

    /// Records a deleted id, raising the watermark if needed.
    pub fn push_deleted(&mut self, id: EntityId, version: Version) {
        self.versions.insert(id.clone(), version);
        self.deleted.push(id);
        self.observe(version);
    }

    /// Version reported for `id`, if it is in the set.
    pub fn version_of(&self, id: &EntityId) -> Option<Version> {
        self.versions.get(id).copied()
    }

    fn observe(&mut self, version: Version) {
        self.high_watermark = Some(match self.high_watermark {
            Some(current) => current.max(version),
            None => version,
        });
    }
}
