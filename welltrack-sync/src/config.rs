//! Sync and backend configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Coordinator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on entities reconciled concurrently within one entity type.
    pub max_concurrent_entities: usize,
    /// Human-readable device name, used in logs.
    pub device_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_entities: 4,
            device_name: "welltrack-device".to_string(),
        }
    }
}

impl SyncConfig {
    /// Effective concurrency. Zero is treated as sequential.
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_entities.max(1)
    }
}

/// Settings for the hosted REST backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestBackendConfig {
    /// Project URL (e.g. `https://xyz.supabase.co`).
    pub base_url: String,
    /// Path prefix of the REST API.
    pub rest_path: String,
    /// Public API key sent with every request.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Entity type → table name overrides.
    pub tables: BTreeMap<String, String>,
}

impl Default for RestBackendConfig {
    fn default() -> Self {
        let tables = [
            ("health_metric", "health_metrics"),
            ("biomarker", "biomarker_entries"),
            ("meal", "meals"),
            ("recipe", "recipes"),
            ("supplement", "supplements"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            base_url: "http://localhost:54321".to_string(),
            rest_path: "rest/v1".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
            tables,
        }
    }
}

impl RestBackendConfig {
    /// Table holding rows of `entity_type`. Unmapped types use `{entity_type}s`.
    pub fn table_for(&self, entity_type: &str) -> String {
        self.tables
            .get(entity_type)
            .cloned()
            .unwrap_or_else(|| format!("{entity_type}s"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `{base_url}/{rest_path}/{table}` with redundant slashes removed.
    pub fn table_url(&self, entity_type: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.rest_path.trim_matches('/'),
            self.table_for(entity_type)
        )
    }
}
