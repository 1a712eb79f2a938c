use crate::error::{ModelError, ModelResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use welltrack_types::{EntityId, UserId, Version};

/// A user-owned record that can be reconciled between the device and the cloud.
///
/// Implementors serialize to a flat JSON object whose keys are the attribute
/// names listed in `SENSITIVE_FIELDS`.
pub trait SyncableEntity:
    Serialize + DeserializeOwned + Clone + std::fmt::Debug + Send + Sync + 'static
{
    /// Stable discriminator used for routing and status bookkeeping.
    const ENTITY_TYPE: &'static str;

    /// Attributes sealed before the record leaves the device.
    const SENSITIVE_FIELDS: &'static [&'static str];

    fn id(&self) -> &EntityId;

    fn user_id(&self) -> &UserId;

    /// Last-modified time. Source of the record's version.
    fn modified_at(&self) -> DateTime<Utc>;

    /// Seconds since epoch of `modified_at`.
    fn version(&self) -> Version {
        Version::from_datetime(&self.modified_at())
    }

    /// Projects the record into an attribute map.
    fn to_attributes(&self) -> ModelResult<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(ModelError::NotAnObject),
        }
    }

    /// Rebuilds a record from an attribute map.
    fn from_attributes(attributes: Map<String, Value>) -> ModelResult<Self> {
        Ok(serde_json::from_value(Value::Object(attributes))?)
    }
}
