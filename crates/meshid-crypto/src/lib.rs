//! # meshid-crypto
//!
//! Credential hashing primitives for meshid.
//!
//! Account secrets are stored only as Argon2id digests. Identities that need to
//! appear in logs are reduced to a short BLAKE3 fingerprint first.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod errors;
pub mod hashing;
pub mod utils;

pub use constants::*;
pub use errors::{CryptoError, Result};
pub use hashing::*;
pub use utils::current_timestamp;
