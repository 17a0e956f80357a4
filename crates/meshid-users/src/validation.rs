//! Account field validation.

use crate::errors::{Result, UsersError};
use crate::types::Client;
use regex::Regex;

/// Maximum display name length in characters
pub const MAX_NAME_LEN: usize = 1024;

/// Maximum identity length in characters
pub const MAX_IDENTITY_LEN: usize = 254;

/// Maximum number of tags
pub const MAX_TAGS: usize = 64;

/// Maximum number of metadata keys
pub const MAX_METADATA_KEYS: usize = 64;

/// Validate a login identity
pub fn validate_identity(identity: &str) -> Result<()> {
    if identity.trim().is_empty() {
        return Err(UsersError::MalformedEntity("missing identity".to_string()));
    }
    if identity.chars().count() > MAX_IDENTITY_LEN {
        return Err(UsersError::MalformedEntity(format!(
            "identity exceeds {} characters",
            MAX_IDENTITY_LEN
        )));
    }
    Ok(())
}

/// Validate a plaintext secret against the configured policy
pub fn validate_password(secret: &str, policy: &Regex) -> Result<()> {
    if secret.is_empty() {
        return Err(UsersError::MalformedEntity("missing secret".to_string()));
    }
    if !policy.is_match(secret) {
        return Err(UsersError::MalformedEntity(
            "password does not meet policy".to_string(),
        ));
    }
    Ok(())
}

/// Size limits enforced by the store
pub fn validate_client_fields(client: &Client) -> Result<()> {
    validate_identity(&client.credentials.identity)?;

    if client.name.chars().count() > MAX_NAME_LEN {
        return Err(UsersError::MalformedEntity(format!(
            "name exceeds {} characters",
            MAX_NAME_LEN
        )));
    }
    if client.tags.len() > MAX_TAGS {
        return Err(UsersError::MalformedEntity(format!(
            "more than {} tags",
            MAX_TAGS
        )));
    }
    if client.metadata.len() > MAX_METADATA_KEYS {
        return Err(UsersError::MalformedEntity(format!(
            "more than {} metadata keys",
            MAX_METADATA_KEYS
        )));
    }
    Ok(())
}
