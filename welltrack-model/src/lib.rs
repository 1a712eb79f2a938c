//! Syncable record model for WellTrack.
//!
//! Defines the types every sync layer agrees on:
//! - [`SyncableEntity`] — a user-owned record with a string id and a
//!   last-modified timestamp that doubles as its version
//! - the concrete records (health metrics, biomarkers, meals, recipes,
//!   supplements)
//! - [`RemoteRecord`] — the cloud representation, with sensitive attributes sealed
//! - [`SensitiveFieldsConfig`] — which attributes must be sealed per entity type

mod entity;
mod error;
mod health;
mod nutrition;
mod record;
mod sensitive;
mod supplement;

pub use entity::SyncableEntity;
pub use error::{ModelError, ModelResult};
pub use health::{BiomarkerEntry, HealthMetric};
pub use nutrition::{Meal, MealType, Recipe};
pub use record::RemoteRecord;
pub use sensitive::SensitiveFieldsConfig;
pub use supplement::Supplement;
