use thiserror::Error;

/// Result type for model projections.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while projecting records to and from attribute maps.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("record did not serialize to an object")]
    NotAnObject,

    #[error("entity type mismatch: expected {expected}, got {actual}")]
    EntityTypeMismatch { expected: String, actual: String },
}
