//! Error types for the sync layer.

use thiserror::Error;
use welltrack_crypto::CryptoError;
use welltrack_model::ModelError;
use welltrack_storage::StorageError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote backend could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The remote backend rejected the request.
    #[error("remote rejected request ({status}): {message}")]
    Remote { status: u16, message: String },

    /// The remote backend answered with something we could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The change feed reported a live record that could not be read back.
    #[error("cloud copy of {entity_type} {id} unavailable")]
    CloudCopyUnavailable { entity_type: String, id: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local store error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Sync status persistence error.
    #[error("status store error: {0}")]
    StatusStore(String),

    /// Field encryption or decryption failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Record projection failed.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// No profile is active in the session.
    #[error("no active session")]
    NoActiveSession,

    /// The profile is not known to the session.
    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    /// No handler is registered for the entity type.
    #[error("no handler registered for entity type '{0}'")]
    UnknownEntityType(String),

    /// A handler for the entity type is already registered.
    #[error("handler for entity type '{0}' already registered")]
    DuplicateHandler(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Returns true if the error aborts the whole pass for an entity type.
    ///
    /// Remote errors (transport, rejection, unreadable cloud copy) are scoped
    /// to the entity being reconciled; everything local is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Network(_)
                | Self::Remote { .. }
                | Self::Protocol(_)
                | Self::CloudCopyUnavailable { .. }
        )
    }

    /// Returns true if retrying later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::CloudCopyUnavailable { .. } => true,
            Self::Remote { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
