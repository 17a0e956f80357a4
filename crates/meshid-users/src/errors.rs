//! Account subsystem error types.

use crate::types::Status;
use meshid_policy::PolicyError;
use meshid_storage::StorageError;
use thiserror::Error;

/// Account subsystem errors
#[derive(Debug, Error)]
pub enum UsersError {
    /// Invalid status or role, missing or oversized field
    #[error("Malformed entity specification: {0}")]
    MalformedEntity(String),

    /// Identity already taken
    #[error("Entity already exists")]
    Conflict,

    /// Entity not found
    #[error("Entity not found")]
    NotFound,

    /// Caller lacks the required permission
    #[error("Failed to perform authorization over the entity")]
    Authorization,

    /// Bad credentials or session; never says which
    #[error("Failed to perform authentication over the entity")]
    Authentication,

    /// Requested status equals the current one
    #[error("Status already assigned")]
    StatusAlreadyAssigned,

    /// Status change out of a terminal state
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: Status, to: Status },

    /// Store failure while creating an entity
    #[error("Failed to create entity in the db: {0}")]
    CreateEntity(#[source] StorageError),

    /// Store failure while updating an entity
    #[error("Failed to update entity in the db: {0}")]
    UpdateEntity(#[source] StorageError),

    /// Store failure while reading an entity
    #[error("Failed to retrieve entity from the db: {0}")]
    ViewEntity(#[source] StorageError),

    /// A write failed and undoing it also failed; stores disagree
    #[error("Failed to rollback after error ({cause}): {rollback}")]
    RollbackFailed {
        #[source]
        cause: Box<UsersError>,
        rollback: Box<UsersError>,
    },

    /// Policy store error
    #[error("Policy error: {0}")]
    Policy(#[source] PolicyError),

    /// Cryptographic error
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] meshid_crypto::CryptoError),

    /// Token issuer error
    #[error("Token error: {0}")]
    Token(String),

    /// Email delivery error
    #[error("Email error: {0}")]
    Email(String),
}

impl UsersError {
    /// True when the stores may now disagree and need reconciliation
    pub fn is_inconsistent(&self) -> bool {
        matches!(self, UsersError::RollbackFailed { .. })
    }
}

impl From<PolicyError> for UsersError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Authorization => UsersError::Authorization,
            PolicyError::MalformedPolicy(msg) => UsersError::MalformedEntity(msg),
            other => UsersError::Policy(other),
        }
    }
}

/// Result type for account operations
pub type Result<T> = std::result::Result<T, UsersError>;
