//! Policy error types.

use thiserror::Error;

/// Policy store errors
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Policy is missing a field or names an unknown type or relation
    #[error("Malformed policy: {0}")]
    MalformedPolicy(String),

    /// No policy row or ownership grants the requested permission
    #[error("Failed to perform authorization over the entity")]
    Authorization,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] meshid_storage::StorageError),

    /// Internal error
    #[error("Internal policy error: {0}")]
    Internal(String),
}

/// Result type for policy operations
pub type Result<T> = std::result::Result<T, PolicyError>;
