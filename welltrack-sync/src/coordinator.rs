//! Sync coordinator.
//!
//! Runs one reconciliation pass per registered entity type, in sequence.
//! Within a type, candidates are reconciled concurrently up to
//! `SyncConfig::max_concurrent_entities`; each id appears once per pass so
//! writes to a single id never overlap.
//!
//! The status write at the end of a type's pass is the commit point. Nothing
//! about the checkpoint is persisted before it, so a pass that is cancelled
//! (its future dropped) leaves the checkpoint where it was.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::reconcile::collect_candidates;
use crate::registry::{HandlerRegistry, RegisteredHandler};
use crate::report::{EntityTypeReport, EntityTypeStats, SyncReport, SyncStats};
use crate::session::SessionContext;
use crate::status::{SyncStatus, SyncStatusStore};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};
use welltrack_types::{ChangeSet, UserId};

/// Drives reconciliation for every registered entity type.
pub struct SyncCoordinator {
    registry: HandlerRegistry,
    status: Arc<dyn SyncStatusStore>,
    config: SyncConfig,
}

impl SyncCoordinator {
    pub fn new(
        registry: HandlerRegistry,
        status: Arc<dyn SyncStatusStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            registry,
            status,
            config,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn status_store(&self) -> &Arc<dyn SyncStatusStore> {
        &self.status
    }

    /// Syncs every registered entity type for the active user.
    ///
    /// A fatal error in one type is recorded in its report and does not stop
    /// the remaining types. Fails only if no profile is active or the status
    /// store cannot be read.
    pub async fn sync_all(&self, session: &SessionContext) -> SyncResult<SyncReport> {
        let user_id = session.require_user()?.clone();
        let started_at = Utc::now();
        info!(
            "Starting sync for {} on {} ({} entity types)",
            user_id,
            self.config.device_name,
            self.registry.len()
        );

        let mut entity_types = Vec::with_capacity(self.registry.len());
        for handler in self.registry.handlers() {
            match self.run_pass(&user_id, handler.as_ref()).await {
                Ok(report) => entity_types.push(report),
                Err(e) => {
                    warn!("Sync of {} aborted: {}", handler.entity_type(), e);
                    entity_types
                        .push(EntityTypeReport::aborted(handler.entity_type(), e.to_string()));
                }
            }
        }

        let report = SyncReport {
            user_id,
            started_at,
            finished_at: Utc::now(),
            entity_types,
        };
        info!(
            "Sync finished: {:?} (pushed={}, pulled={}, deleted={}, failed={})",
            report.outcome(),
            report.total_pushed(),
            report.total_pulled(),
            report.total_deleted(),
            report.total_failures()
        );
        Ok(report)
    }

    /// Syncs a single entity type for the active user.
    pub async fn sync_entity_type(
        &self,
        session: &SessionContext,
        entity_type: &str,
    ) -> SyncResult<EntityTypeReport> {
        let user_id = session.require_user()?;
        let handler = self.registry.require(entity_type)?;
        self.run_pass(user_id, handler.as_ref()).await
    }

    /// Pending local work and checkpoint state per entity type.
    pub async fn stats(&self, session: &SessionContext) -> SyncResult<SyncStats> {
        let user_id = session.require_user()?;
        let mut entity_types = Vec::with_capacity(self.registry.len());

        for handler in self.registry.handlers() {
            let entity_type = handler.entity_type();
            let pending = handler.local_changes(user_id).await?;
            let status = self
                .status
                .get(user_id, entity_type)
                .await?
                .unwrap_or_else(|| SyncStatus::new(user_id.clone(), entity_type));

            entity_types.push(EntityTypeStats {
                entity_type: entity_type.to_string(),
                pending_local: pending.len(),
                last_synced_version: status.last_synced_version,
                last_success_at: status.last_success_at,
                consecutive_failures: status.consecutive_failures,
                last_error: status.last_error,
            });
        }

        Ok(SyncStats {
            user_id: user_id.clone(),
            entity_types,
        })
    }

    async fn run_pass(
        &self,
        user_id: &UserId,
        handler: &dyn RegisteredHandler,
    ) -> SyncResult<EntityTypeReport> {
        let entity_type = handler.entity_type();
        let mut status = self.status.get_or_create(user_id, entity_type).await?;
        let since = status.last_synced_version;
        let mut report = EntityTypeReport::new(entity_type, since);

        let outcome = self.reconcile_all(user_id, handler, &mut report).await;
        let now = Utc::now();

        if let Err(e) = outcome {
            status.record_failure(e.to_string(), now);
            self.status.set(&status).await?;
            return Err(e);
        }

        if report.is_clean() {
            status.record_success(report.checkpoint, now);
            report.checkpoint_advanced = status.last_synced_version > since;
        } else {
            let summary = report
                .feed_error
                .clone()
                .or_else(|| report.failures.first().map(|f| format!("{}: {}", f.id, f.error)))
                .unwrap_or_default();
            status.record_failure(summary, now);
        }
        report.checkpoint = status.last_synced_version;
        self.status.set(&status).await?;

        info!(
            "Synced {}: {:?} (candidates={}, pushed={}, pulled={}, deleted={}, failed={})",
            entity_type,
            report.outcome(),
            report.candidates,
            report.pushed,
            report.pulled,
            report.deleted,
            report.failures.len()
        );
        Ok(report)
    }

    /// Reconciles every candidate. On success `report.checkpoint` holds the
    /// candidate checkpoint (the cloud high watermark, never below the old one).
    async fn reconcile_all(
        &self,
        user_id: &UserId,
        handler: &dyn RegisteredHandler,
        report: &mut EntityTypeReport,
    ) -> SyncResult<()> {
        let entity_type = handler.entity_type();
        let since = report.checkpoint;

        let local = handler.local_changes(user_id).await?;
        let cloud = match handler.cloud_changes_since(user_id, since).await {
            Ok(changes) => changes,
            Err(e) if !e.is_fatal() => {
                warn!(
                    "Change feed for {} unavailable, pushing local changes only: {}",
                    entity_type, e
                );
                report.feed_error = Some(e.to_string());
                ChangeSet::new()
            }
            Err(e) => return Err(e),
        };
        if let Some(high) = cloud.high_watermark {
            report.checkpoint = report.checkpoint.max(high);
        }

        let candidates = collect_candidates(&local, &cloud);
        report.candidates = candidates.len();
        debug!(
            "{} candidates for {} since {} ({} local, {} cloud)",
            candidates.len(),
            entity_type,
            since,
            local.len(),
            cloud.len()
        );

        let mut results = stream::iter(candidates)
            .map(|candidate| async move {
                let result = handler.reconcile(&candidate).await;
                (candidate, result)
            })
            .buffer_unordered(self.config.concurrency());

        while let Some((candidate, result)) = results.next().await {
            match result {
                Ok(resolution) => report.record(resolution),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Failed to sync {} {}: {}", entity_type, candidate.id(), e);
                    report.record_failure(candidate.id().clone(), e.to_string());
                }
            }
        }
        Ok(())
    }
}

