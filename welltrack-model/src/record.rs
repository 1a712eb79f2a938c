use crate::entity::SyncableEntity;
use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use welltrack_types::{EntityId, UserId, Version};

/// Cloud-side representation of a record.
///
/// `attributes` is the record's attribute map with its sensitive fields
/// already sealed. `deleted` marks a soft-deleted row that still appears in
/// the change feed so other devices learn about the deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: EntityId,
    pub user_id: UserId,
    pub entity_type: String,
    pub version: Version,
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub deleted: bool,
}

impl RemoteRecord {
    /// Wraps an (already sealed) attribute map for `entity`.
    pub fn for_entity<T: SyncableEntity>(entity: &T, attributes: Map<String, Value>) -> Self {
        Self {
            id: entity.id().clone(),
            user_id: entity.user_id().clone(),
            entity_type: T::ENTITY_TYPE.to_string(),
            version: entity.version(),
            attributes,
            deleted: false,
        }
    }

    /// Checks that this record belongs to entity type `T`.
    pub fn expect_type<T: SyncableEntity>(&self) -> ModelResult<()> {
        if self.entity_type != T::ENTITY_TYPE {
            return Err(ModelError::EntityTypeMismatch {
                expected: T::ENTITY_TYPE.to_string(),
                actual: self.entity_type.clone(),
            });
        }
        Ok(())
    }
}
