use crate::entity::SyncableEntity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use welltrack_types::{EntityId, UserId};

/// A supplement in the user's regimen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplement {
    pub id: EntityId,
    pub user_id: UserId,
    pub name: String,
    pub brand: Option<String>,
    pub dosage: f64,
    pub dosage_unit: String,
    pub frequency: String,
    pub dosage_notes: Option<String>,
    pub side_effects: Option<String>,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl SyncableEntity for Supplement {
    const ENTITY_TYPE: &'static str = "supplement";
    const SENSITIVE_FIELDS: &'static [&'static str] = &["dosage_notes", "side_effects"];

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn modified_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
