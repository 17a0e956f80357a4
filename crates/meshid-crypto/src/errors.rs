//! Credential hashing errors.

use thiserror::Error;

/// Hashing errors. Verification failures never say which part mismatched.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Argon2 could not hash, or the secret did not verify
    #[error("Secret hashing failed: {0}")]
    Argon2Failed(String),

    /// Stored digest is not a PHC string
    #[error("Stored secret digest is malformed")]
    InvalidHashFormat,

    /// Cost parameters out of Argon2's accepted range
    #[error("Rejected Argon2 parameters: {0}")]
    InvalidParameters(String),

    /// Empty or otherwise unusable secret
    #[error("Invalid secret input: {0}")]
    InvalidInput(String),
}

/// Result alias for hashing operations
pub type Result<T> = std::result::Result<T, CryptoError>;
