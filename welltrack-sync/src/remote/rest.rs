//! PostgREST-style REST backend.
//!
//! Each entity type maps to one table whose rows have the shape of
//! [`RemoteRecord`]. Reads filter on `deleted=eq.false`; deletes are soft so
//! the change feed can report them to other devices.

use super::RemoteBackend;
use crate::config::RestBackendConfig;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use welltrack_model::RemoteRecord;
use welltrack_types::{ChangeSet, EntityId, UserId, Version};

/// Row shape returned by the change feed.
#[derive(Debug, Deserialize)]
struct ChangeRow {
    id: EntityId,
    version: Version,
    #[serde(default)]
    deleted: bool,
}

/// [`RemoteBackend`] over a hosted REST API.
pub struct RestBackend {
    config: RestBackendConfig,
    client: Client,
    access_token: Arc<RwLock<Option<String>>>,
}

impl RestBackend {
    /// Creates a backend. Fails if the HTTP client cannot be built.
    pub fn new(config: RestBackendConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn config(&self) -> &RestBackendConfig {
        &self.config
    }

    /// Sets the signed-in user's token. Without one, the API key is used as
    /// the bearer token.
    pub async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .access_token
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.config.api_key.clone());
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> SyncResult<Response> {
        let response = self
            .authorized(request)
            .await
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("{what} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::Remote {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn rows<T: serde::de::DeserializeOwned>(
        response: Response,
        what: &str,
    ) -> SyncResult<Vec<T>> {
        response
            .json()
            .await
            .map_err(|e| SyncError::Protocol(format!("failed to parse {what} response: {e}")))
    }
}

#[async_trait]
impl RemoteBackend for RestBackend {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn fetch(&self, entity_type: &str, id: &EntityId) -> SyncResult<Option<RemoteRecord>> {
        let url = format!(
            "{}?id=eq.{}&deleted=eq.false",
            self.config.table_url(entity_type),
            urlencoding::encode(id.as_str())
        );

        let response = match self.send(self.client.get(&url), "fetch").await {
            Err(SyncError::Remote { status: 404, .. }) => return Ok(None),
            other => other?,
        };
        let rows: Vec<RemoteRecord> = Self::rows(response, "fetch").await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert(&self, record: &RemoteRecord) -> SyncResult<RemoteRecord> {
        let url = self.config.table_url(&record.entity_type);
        let request = self
            .client
            .post(&url)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(record);

        let response = self.send(request, "upsert").await?;
        let rows: Vec<RemoteRecord> = Self::rows(response, "upsert").await?;
        let canonical = rows
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::Protocol("upsert returned no rows".into()))?;

        debug!("Upserted {} {} ({})", record.entity_type, record.id, canonical.version);
        Ok(canonical)
    }

    async fn soft_delete(&self, entity_type: &str, id: &EntityId) -> SyncResult<()> {
        let url = format!(
            "{}?id=eq.{}",
            self.config.table_url(entity_type),
            urlencoding::encode(id.as_str())
        );
        let body = serde_json::json!({
            "deleted": true,
            "attributes": {},
            "version": Version::now(),
        });

        self.send(self.client.patch(&url).json(&body), "soft delete")
            .await?;
        debug!("Soft-deleted {} {}", entity_type, id);
        Ok(())
    }

    async fn changed_since(
        &self,
        entity_type: &str,
        user_id: &UserId,
        since: Version,
    ) -> SyncResult<ChangeSet> {
        let url = format!(
            "{}?user_id=eq.{}&version=gte.{}&select=id,version,deleted&order=version.asc",
            self.config.table_url(entity_type),
            urlencoding::encode(user_id.as_str()),
            since.as_secs()
        );

        let response = self.send(self.client.get(&url), "change feed").await?;
        let rows: Vec<ChangeRow> = Self::rows(response, "change feed").await?;

        let mut changes = ChangeSet::new();
        for row in rows {
            if row.deleted {
                changes.push_deleted(row.id, row.version);
            } else {
                changes.push_changed(row.id, row.version);
            }
        }
        Ok(changes)
    }
}
