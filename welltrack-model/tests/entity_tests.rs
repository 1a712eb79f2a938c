use chrono::{NaiveDate, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use welltrack_model::{
    BiomarkerEntry, HealthMetric, Meal, MealType, ModelError, Recipe, RemoteRecord, Supplement,
    SyncableEntity,
};
use welltrack_types::{EntityId, UserId, Version};

fn heart_rate(id: &str, secs: i64) -> HealthMetric {
    HealthMetric {
        id: EntityId::from(id),
        user_id: UserId::from("user-1"),
        metric_type: "heart_rate".into(),
        value: 61.0,
        unit: "bpm".into(),
        timestamp: Utc.timestamp_opt(secs, 250_000_000).unwrap(),
        source: "manual".into(),
        metadata: Some(r#"{"device":"watch"}"#.into()),
        notes: None,
        confidence: 1.0,
        is_manual_entry: true,
    }
}

fn biomarker(min: Option<f64>, max: Option<f64>, value: f64) -> BiomarkerEntry {
    BiomarkerEntry {
        id: EntityId::from("b1"),
        user_id: UserId::from("user-1"),
        test_type: "lipid_panel".into(),
        biomarker_type: "ldl".into(),
        value,
        unit: "mg/dL".into(),
        reference_range_min: min,
        reference_range_max: max,
        test_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        notes: None,
        test_results: None,
        lab_name: Some("Quest".into()),
        updated_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    }
}

// ── Versions ─────────────────────────────────────────────────────

#[test]
fn health_metric_version_is_timestamp_seconds() {
    let metric = heart_rate("abc", 1_700_000_000);
    assert_eq!(metric.version(), Version::from_secs(1_700_000_000));
}

#[test]
fn entity_type_discriminators_are_distinct() {
    let types = [
        HealthMetric::ENTITY_TYPE,
        BiomarkerEntry::ENTITY_TYPE,
        Meal::ENTITY_TYPE,
        Recipe::ENTITY_TYPE,
        Supplement::ENTITY_TYPE,
    ];
    let unique: std::collections::HashSet<_> = types.iter().collect();
    assert_eq!(unique.len(), types.len());
}

// ── Attribute projection ─────────────────────────────────────────

#[test]
fn to_attributes_is_flat_map() {
    let metric = heart_rate("abc", 1_700_000_000);
    let attrs = metric.to_attributes().unwrap();

    assert_eq!(attrs["id"], json!("abc"));
    assert_eq!(attrs["user_id"], json!("user-1"));
    assert_eq!(attrs["value"], json!(61.0));
    assert_eq!(attrs["notes"], serde_json::Value::Null);
    for field in HealthMetric::SENSITIVE_FIELDS {
        assert!(attrs.contains_key(*field), "{field} missing from projection");
    }
}

#[test]
fn attributes_roundtrip() {
    let metric = heart_rate("abc", 1_700_000_000);
    let back = HealthMetric::from_attributes(metric.to_attributes().unwrap()).unwrap();
    assert_eq!(back, metric);
}

#[test]
fn from_attributes_rejects_garbage() {
    let mut attrs = heart_rate("abc", 1).to_attributes().unwrap();
    attrs.insert("value".into(), json!({"encrypted": "x"}));
    let err = HealthMetric::from_attributes(attrs).unwrap_err();
    assert!(matches!(err, ModelError::Serialization(_)));
}

#[test]
fn meal_type_serializes_snake_case() {
    let meal = Meal {
        id: EntityId::from("m1"),
        user_id: UserId::from("user-1"),
        recipe_id: None,
        name: "Oats".into(),
        meal_type: MealType::Breakfast,
        consumed_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        portions: 1.0,
        notes: Some("felt full".into()),
        health_notes: None,
        rating: Some(4.5),
        is_favorite: false,
        updated_at: Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
    };
    let attrs = meal.to_attributes().unwrap();
    assert_eq!(attrs["meal_type"], json!("breakfast"));
    assert_eq!(meal.version(), Version::from_secs(1_700_000_100));
}

#[test]
fn recipe_total_time() {
    let recipe = Recipe {
        id: EntityId::from("r1"),
        user_id: UserId::from("user-1"),
        name: "Chili".into(),
        prep_time_minutes: 15,
        cook_time_minutes: 45,
        servings: 4,
        instructions: vec!["Brown beef".into(), "Simmer".into()],
        tags: vec!["batch".into()],
        source_url: None,
        rating: None,
        created_at: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
        updated_at: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
    };
    assert_eq!(recipe.total_time_minutes(), 60);
    assert!(Recipe::SENSITIVE_FIELDS.is_empty());
}

// ── Biomarker ranges ─────────────────────────────────────────────

#[test]
fn biomarker_range_checks() {
    assert_eq!(biomarker(None, None, 100.0).is_within_range(), None);
    assert_eq!(biomarker(Some(0.0), Some(130.0), 100.0).is_within_range(), Some(true));
    assert_eq!(biomarker(Some(0.0), Some(99.0), 100.0).is_within_range(), Some(false));
    assert_eq!(biomarker(Some(120.0), None, 100.0).is_within_range(), Some(false));
    assert_eq!(biomarker(None, Some(100.0), 100.0).is_within_range(), Some(true));
}

// ── RemoteRecord ─────────────────────────────────────────────────

#[test]
fn remote_record_for_entity() {
    let metric = heart_rate("abc", 1_700_000_000);
    let record = RemoteRecord::for_entity(&metric, metric.to_attributes().unwrap());

    assert_eq!(record.id, metric.id);
    assert_eq!(record.user_id, metric.user_id);
    assert_eq!(record.entity_type, "health_metric");
    assert_eq!(record.version, metric.version());
    assert!(!record.deleted);
    assert!(record.expect_type::<HealthMetric>().is_ok());
}

#[test]
fn remote_record_type_mismatch() {
    let metric = heart_rate("abc", 1);
    let record = RemoteRecord::for_entity(&metric, Default::default());
    let err = record.expect_type::<Meal>().unwrap_err();
    assert_eq!(
        err.to_string(),
        "entity type mismatch: expected meal, got health_metric"
    );
}

#[test]
fn remote_record_deleted_defaults_false() {
    let json = json!({
        "id": "abc",
        "user_id": "user-1",
        "entity_type": "meal",
        "version": 5,
        "attributes": {}
    });
    let record: RemoteRecord = serde_json::from_value(json).unwrap();
    assert!(!record.deleted);
    assert_eq!(record.version, Version::from_secs(5));
}
