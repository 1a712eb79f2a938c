//! Core type definitions for WellTrack sync.
//!
//! This crate defines the small, entity-agnostic types shared by every layer
//! of the sync subsystem:
//! - Entity, user and device identifiers (string ids, UUID v7 when minted locally)
//! - `Version`, the wall-clock derived version used for conflict comparison
//! - `ChangeSet`, the candidate set produced by the local store and the cloud
//!
//! Domain records (health metrics, meals, ...) live in `welltrack-model`.

mod change;
mod ids;
mod version;

pub use change::ChangeSet;
pub use ids::{DeviceId, EntityId, UserId};
pub use version::Version;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("empty identifier")]
    EmptyId,

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}
