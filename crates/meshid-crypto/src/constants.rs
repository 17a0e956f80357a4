//! Hashing constants.

/// Number of BLAKE3 bytes kept when fingerprinting an identity for logs
pub const LOG_DIGEST_BYTES: usize = 8;

/// Argon2id parameters for account secrets
pub mod argon2_params {
    use argon2::{Params, Version};

    /// Memory cost: 64 MiB
    pub const MEMORY_COST: u32 = 64 * 1024;

    /// Time cost: 3 iterations
    pub const TIME_COST: u32 = 3;

    /// Parallelism: 1 thread
    pub const PARALLELISM: u32 = 1;

    /// Output length: 32 bytes
    pub const OUTPUT_LENGTH: usize = 32;

    /// Argon2 version
    pub const VERSION: Version = Version::V0x13;

    /// Build Argon2id parameters
    pub fn get_params() -> crate::Result<Params> {
        Params::new(MEMORY_COST, TIME_COST, PARALLELISM, Some(OUTPUT_LENGTH))
            .map_err(|e| crate::CryptoError::InvalidParameters(e.to_string()))
    }
}
