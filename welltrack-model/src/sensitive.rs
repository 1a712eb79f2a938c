use crate::entity::SyncableEntity;
use crate::{BiomarkerEntry, HealthMetric, Meal, Recipe, Supplement};

/// Static lookup from entity type to the attributes that must be sealed.
///
/// Each entity declares its own `SENSITIVE_FIELDS`; this table lets code that
/// only holds the type discriminator (the wire layer, audits) find them.
pub struct SensitiveFieldsConfig;

const TABLE: &[(&str, &[&str])] = &[
    (HealthMetric::ENTITY_TYPE, HealthMetric::SENSITIVE_FIELDS),
    (BiomarkerEntry::ENTITY_TYPE, BiomarkerEntry::SENSITIVE_FIELDS),
    (Meal::ENTITY_TYPE, Meal::SENSITIVE_FIELDS),
    (Recipe::ENTITY_TYPE, Recipe::SENSITIVE_FIELDS),
    (Supplement::ENTITY_TYPE, Supplement::SENSITIVE_FIELDS),
    ("user", &["email", "phone_number", "medical_notes"]),
];

impl SensitiveFieldsConfig {
    /// Sensitive attributes for `entity_type`. Unknown types have none.
    pub fn fields_for(entity_type: &str) -> &'static [&'static str] {
        TABLE
            .iter()
            .find(|(ty, _)| *ty == entity_type)
            .map(|(_, fields)| *fields)
            .unwrap_or(&[])
    }

    /// Whether `field` is sealed for `entity_type`.
    pub fn is_sensitive(entity_type: &str, field: &str) -> bool {
        Self::fields_for(entity_type).contains(&field)
    }

    /// All entity types with a registered entry.
    pub fn entity_types() -> impl Iterator<Item = &'static str> {
        TABLE.iter().map(|(ty, _)| *ty)
    }
}
