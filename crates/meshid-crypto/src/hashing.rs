//! Secret hashing using Argon2id, and log fingerprints using BLAKE3.

use crate::{constants::*, errors::*};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

/// One-way hashing of account secrets.
///
/// Both operations are deliberately slow and run on the calling task.
pub trait Hasher: Send + Sync {
    /// Hash a plaintext secret into a self-describing digest
    fn hash(&self, plaintext: &str) -> Result<String>;

    /// Compare a plaintext secret against a digest produced by [`Hasher::hash`]
    ///
    /// Returns `Ok(())` on a match.
    fn compare(&self, plaintext: &str, digest: &str) -> Result<()>;
}

/// Argon2id implementation of [`Hasher`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    /// Create a new hasher with the default Argon2id parameters
    pub fn new() -> Self {
        Self
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        Ok(Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2_params::VERSION,
            argon2_params::get_params()?,
        ))
    }
}

impl Hasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Err(CryptoError::InvalidInput("empty secret".to_string()));
        }

        let salt = generate_salt();
        let digest = self
            .argon2()?
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| CryptoError::Argon2Failed(e.to_string()))?;

        Ok(digest.to_string())
    }

    fn compare(&self, plaintext: &str, digest: &str) -> Result<()> {
        let parsed = PasswordHash::new(digest).map_err(|_| CryptoError::InvalidHashFormat)?;

        self.argon2()?
            .verify_password(plaintext.as_bytes(), &parsed)
            .map_err(|e| CryptoError::Argon2Failed(e.to_string()))
    }
}

/// Generate a random salt for secret hashing
pub fn generate_salt() -> SaltString {
    SaltString::generate(&mut rand::thread_rng())
}

/// Short hex fingerprint of an account identity, safe to put in logs
pub fn identity_digest(identity: &str) -> String {
    let hash = blake3::hash(identity.as_bytes());
    hex::encode(&hash.as_bytes()[..LOG_DIGEST_BYTES])
}
