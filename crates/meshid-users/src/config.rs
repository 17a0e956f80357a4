//! Account subsystem configuration.

use anyhow::{Context, Result};
use regex::Regex;

/// Default platform object every account is a member of
pub const DEFAULT_PLATFORM_ID: &str = "magistrala";

/// Default secret policy: at least eight characters
pub const DEFAULT_PASSWORD_REGEX: &str = "^.{8,}$";

/// Default cap on concurrent permission lookups per member listing
pub const DEFAULT_PERMISSION_CONCURRENCY: usize = 16;

/// Account subsystem configuration
#[derive(Debug, Clone)]
pub struct UsersConfig {
    /// Object id of the platform in the policy store
    pub platform_id: String,

    /// Secrets must match this pattern
    pub password_regex: Regex,

    /// Upper bound on concurrent `list_permissions` calls
    pub permission_concurrency: usize,
}

impl UsersConfig {
    /// Built-in defaults
    pub fn with_defaults() -> Result<Self> {
        Self::build(
            DEFAULT_PLATFORM_ID.to_string(),
            DEFAULT_PASSWORD_REGEX,
            DEFAULT_PERMISSION_CONCURRENCY,
        )
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let platform_id = std::env::var("MESHID_PLATFORM_ID")
            .unwrap_or_else(|_| DEFAULT_PLATFORM_ID.to_string());

        let password_regex = std::env::var("MESHID_PASSWORD_REGEX")
            .unwrap_or_else(|_| DEFAULT_PASSWORD_REGEX.to_string());

        let permission_concurrency = std::env::var("MESHID_PERMISSION_CONCURRENCY")
            .unwrap_or_else(|_| DEFAULT_PERMISSION_CONCURRENCY.to_string())
            .parse()
            .context("MESHID_PERMISSION_CONCURRENCY must be a positive integer")?;

        Self::build(platform_id, &password_regex, permission_concurrency)
    }

    fn build(platform_id: String, password_regex: &str, permission_concurrency: usize) -> Result<Self> {
        if platform_id.is_empty() {
            anyhow::bail!("platform id must not be empty");
        }
        if permission_concurrency == 0 {
            anyhow::bail!("permission concurrency must be at least 1");
        }

        let password_regex = Regex::new(password_regex)
            .with_context(|| format!("invalid password regex {:?}", password_regex))?;

        Ok(Self {
            platform_id,
            password_regex,
            permission_concurrency,
        })
    }
}
