use crate::entity::SyncableEntity;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use welltrack_types::{EntityId, UserId};

/// A single health reading (heart rate, weight, sleep duration, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetric {
    pub id: EntityId,
    pub user_id: UserId,
    pub metric_type: String,
    pub value: f64,
    pub unit: String,
    /// When the reading was taken or last edited.
    pub timestamp: DateTime<Utc>,
    pub source: String,
    /// Free-form JSON blob from the source platform.
    pub metadata: Option<String>,
    pub notes: Option<String>,
    pub confidence: f64,
    pub is_manual_entry: bool,
}

impl SyncableEntity for HealthMetric {
    const ENTITY_TYPE: &'static str = "health_metric";
    const SENSITIVE_FIELDS: &'static [&'static str] = &["value", "metadata", "notes"];

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn modified_at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// A lab result for one biomarker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomarkerEntry {
    pub id: EntityId,
    pub user_id: UserId,
    pub test_type: String,
    pub biomarker_type: String,
    pub value: f64,
    pub unit: String,
    pub reference_range_min: Option<f64>,
    pub reference_range_max: Option<f64>,
    pub test_date: NaiveDate,
    pub notes: Option<String>,
    /// Raw panel output attached by the lab import.
    pub test_results: Option<String>,
    pub lab_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl BiomarkerEntry {
    /// Whether `value` falls inside the reference range. `None` when no
    /// range is recorded.
    pub fn is_within_range(&self) -> Option<bool> {
        match (self.reference_range_min, self.reference_range_max) {
            (None, None) => None,
            (min, max) => Some(
                min.is_none_or(|lo| self.value >= lo) && max.is_none_or(|hi| self.value <= hi),
            ),
        }
    }
}

impl SyncableEntity for BiomarkerEntry {
    const ENTITY_TYPE: &'static str = "biomarker";
    const SENSITIVE_FIELDS: &'static [&'static str] = &["value", "notes", "test_results"];

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
