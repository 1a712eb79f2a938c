use pretty_assertions::assert_eq;
use serde_json::{json, Map};
use welltrack_model::RemoteRecord;
use welltrack_sync::{RemoteBackend, RestBackend, RestBackendConfig, SyncError};
use welltrack_types::{EntityId, UserId, Version};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> RestBackend {
    RestBackend::new(RestBackendConfig {
        base_url: server.uri(),
        api_key: "anon-key".into(),
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap()
}

fn record(id: &str, version: i64) -> RemoteRecord {
    let mut attributes = Map::new();
    attributes.insert("unit".into(), json!("bpm"));
    attributes.insert(
        "value".into(),
        json!({"encrypted": "AAAA", "iv": "BBBB", "isEncrypted": true}),
    );
    RemoteRecord {
        id: EntityId::from(id),
        user_id: UserId::from("user-1"),
        entity_type: "health_metric".into(),
        version: Version::from_secs(version),
        attributes,
        deleted: false,
    }
}

// ── Config ──────────────────────────────────────────────────────

#[test]
fn config_defaults() {
    let cfg = RestBackendConfig::default();
    assert_eq!(cfg.rest_path, "rest/v1");
    assert_eq!(cfg.timeout_secs, 30);
    assert_eq!(cfg.table_for("health_metric"), "health_metrics");
    assert_eq!(cfg.table_for("workout"), "workouts");
}

#[test]
fn config_table_url_normalizes_slashes() {
    let cfg = RestBackendConfig {
        base_url: "https://example.test/".into(),
        rest_path: "/rest/v1/".into(),
        ..Default::default()
    };
    assert_eq!(
        cfg.table_url("meal"),
        "https://example.test/rest/v1/meals"
    );
}

#[test]
fn config_partial_json_keeps_defaults() {
    let cfg: RestBackendConfig =
        serde_json::from_str(r#"{"base_url":"https://x.test","api_key":"k"}"#).unwrap();
    assert_eq!(cfg.base_url, "https://x.test");
    assert_eq!(cfg.rest_path, "rest/v1");
    assert_eq!(cfg.tables.len(), 5);
}

#[test]
fn backend_name() {
    let backend = RestBackend::new(RestBackendConfig::default()).unwrap();
    assert_eq!(backend.name(), "rest");
}

// ── Fetch ───────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_returns_first_row() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/health_metrics"))
        .and(query_param("id", "eq.abc"))
        .and(query_param("deleted", "eq.false"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([record("abc", 42)])))
        .expect(1)
        .mount(&server)
        .await;

    let fetched = backend(&server)
        .fetch("health_metric", &EntityId::from("abc"))
        .await
        .unwrap();
    assert_eq!(fetched, Some(record("abc", 42)));
}

#[tokio::test]
async fn fetch_empty_result_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/health_metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let fetched = backend(&server)
        .fetch("health_metric", &EntityId::from("missing"))
        .await
        .unwrap();
    assert!(fetched.is_none());
}

#[tokio::test]
async fn fetch_uses_session_token_when_set() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer user-jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend(&server);
    backend.set_access_token(Some("user-jwt".into())).await;
    backend
        .fetch("health_metric", &EntityId::from("abc"))
        .await
        .unwrap();
}

#[tokio::test]
async fn fetch_server_error_is_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = backend(&server)
        .fetch("health_metric", &EntityId::from("abc"))
        .await
        .unwrap_err();
    match err {
        SyncError::Remote { status, ref message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!err.is_fatal());
    assert!(err.is_retryable());
}

#[tokio::test]
async fn fetch_garbage_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = backend(&server)
        .fetch("health_metric", &EntityId::from("abc"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Protocol(_)));
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let backend = RestBackend::new(RestBackendConfig {
        base_url: "http://127.0.0.1:1".into(),
        timeout_secs: 2,
        ..Default::default()
    })
    .unwrap();

    let err = backend
        .fetch("health_metric", &EntityId::from("abc"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Network(_)));
}

// ── Upsert ──────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_posts_with_merge_preference() {
    let server = MockServer::start().await;
    let mut canonical = record("abc", 42);
    canonical
        .attributes
        .insert("server_note".into(), json!("stamped"));

    Mock::given(method("POST"))
        .and(path("/rest/v1/health_metrics"))
        .and(header(
            "prefer",
            "resolution=merge-duplicates,return=representation",
        ))
        .and(body_partial_json(json!({"id": "abc", "version": 42})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([canonical.clone()])))
        .expect(1)
        .mount(&server)
        .await;

    let stored = backend(&server).upsert(&record("abc", 42)).await.unwrap();
    assert_eq!(stored, canonical);
}

#[tokio::test]
async fn upsert_without_representation_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(&server)
        .await;

    let err = backend(&server).upsert(&record("abc", 1)).await.unwrap_err();
    assert!(matches!(err, SyncError::Protocol(_)));
}

#[tokio::test]
async fn upsert_rejection_is_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(409).set_body_string("conflict"))
        .mount(&server)
        .await;

    let err = backend(&server).upsert(&record("abc", 1)).await.unwrap_err();
    assert!(matches!(err, SyncError::Remote { status: 409, .. }));
    assert!(!err.is_retryable());
}

// ── Soft delete ─────────────────────────────────────────────────

#[tokio::test]
async fn soft_delete_patches_row() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/meals"))
        .and(query_param("id", "eq.m1"))
        .and(body_partial_json(json!({"deleted": true, "attributes": {}})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server)
        .soft_delete("meal", &EntityId::from("m1"))
        .await
        .unwrap();
}

// ── Change feed ─────────────────────────────────────────────────

#[tokio::test]
async fn changed_since_splits_changes_and_deletions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/health_metrics"))
        .and(query_param("user_id", "eq.user-1"))
        .and(query_param("version", "gte.100"))
        .and(query_param("select", "id,version,deleted"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a", "version": 100, "deleted": false},
            {"id": "b", "version": 150, "deleted": true},
            {"id": "c", "version": 120, "deleted": false}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let changes = backend(&server)
        .changed_since("health_metric", &UserId::from("user-1"), Version::from_secs(100))
        .await
        .unwrap();

    assert_eq!(changes.changed, vec![EntityId::from("a"), EntityId::from("c")]);
    assert_eq!(changes.deleted, vec![EntityId::from("b")]);
    assert_eq!(changes.high_watermark, Some(Version::from_secs(150)));
}

#[tokio::test]
async fn changed_since_encodes_user_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("user_id", "eq.a b&c"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let changes = backend(&server)
        .changed_since("health_metric", &UserId::from("a b&c"), Version::ZERO)
        .await
        .unwrap();
    assert!(changes.is_empty());
}
