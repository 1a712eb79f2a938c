//! Local/cloud reconciliation for WellTrack.
//!
//! # Layout
//!
//! - [`handler`]: the per-entity-type contract and its generic implementation
//! - [`registry`]: explicit entity type → handler map
//! - [`reconcile`]: conflict resolution and the per-entity algorithm
//! - [`coordinator`]: drives passes and commits checkpoints
//! - [`status`]: checkpoint persistence
//! - [`remote`]: cloud backends (REST and in-memory)
//! - [`session`]: the active profile, passed explicitly
//!
//! Sensitive attributes are sealed with a [`welltrack_crypto::FieldEncryptor`]
//! before they leave the device and opened after they arrive.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod handler;
pub mod reconcile;
pub mod registry;
pub mod remote;
pub mod report;
pub mod session;
pub mod status;

pub use config::{RestBackendConfig, SyncConfig};
pub use coordinator::SyncCoordinator;
pub use error::{SyncError, SyncResult};
pub use handler::{
    BiomarkerSyncHandler, EntityHandler, EntitySyncHandler, HealthMetricSyncHandler,
    MealSyncHandler, RecipeSyncHandler, SupplementSyncHandler,
};
pub use reconcile::{
    collect_candidates, reconcile_entity, resolve_conflict, Candidate, ConflictOutcome,
    Resolution,
};
pub use registry::{default_registry, HandlerRegistry, RegisteredHandler};
pub use remote::{CallCounts, MemoryBackend, RemoteBackend, RestBackend};
pub use report::{
    EntityFailure, EntityTypeReport, EntityTypeStats, PassOutcome, SyncReport, SyncStats,
};
pub use session::{ActiveSession, SessionContext, UserProfile};
pub use status::{MemoryStatusStore, SqliteStatusStore, SyncStatus, SyncStatusStore};
