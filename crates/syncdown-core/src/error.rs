//! Error types for syncdown

use thiserror::Error;

/// Core syncdown errors
#[derive(Error, Debug)]
pub enum SyncdownError {
    // Envelope errors
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Envelope encoding failed: {0}")]
    EncodeFailed(String),

    // Storage errors
    #[error("Shared storage unavailable")]
    StorageUnavailable,

    #[error("Storage quota exceeded: needed {needed} bytes, limit {limit}")]
    QuotaExceeded { needed: usize, limit: usize },

    #[error("Storage error: {0}")]
    Storage(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncdownError {
    /// Whether the error came from the shared storage layer
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            SyncdownError::StorageUnavailable
                | SyncdownError::QuotaExceeded { .. }
                | SyncdownError::Storage(_)
        )
    }
}

/// Result type for syncdown operations
pub type SyncdownResult<T> = Result<T, SyncdownError>;
