//! Account subsystem trait definitions.

use crate::{errors::Result, types::*};
use async_trait::async_trait;

/// Persistent account store
///
/// Enforces identity uniqueness. Updates other than `change_status` only
/// apply to enabled accounts and report `NotFound` otherwise.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Persist a new account
    async fn save(&self, client: Client) -> Result<Client>;

    /// Get an account by ID
    async fn retrieve_by_id(&self, id: &str) -> Result<Client>;

    /// Get an account by login identity
    async fn retrieve_by_identity(&self, identity: &str) -> Result<Client>;

    /// Filtered, ordered page of accounts
    async fn retrieve_all(&self, page: &Page) -> Result<ClientsPage>;

    /// Substring search over name and identity; basic info only
    async fn search_clients(&self, page: &Page) -> Result<ClientsPage>;

    /// Update name and metadata
    async fn update(&self, client: &Client) -> Result<Client>;

    /// Replace tags
    async fn update_tags(&self, client: &Client) -> Result<Client>;

    /// Change login identity
    async fn update_identity(&self, client: &Client) -> Result<Client>;

    /// Replace secret digest
    async fn update_secret(&self, client: &Client) -> Result<Client>;

    /// Replace role
    async fn update_role(&self, client: &Client) -> Result<Client>;

    /// Replace status
    async fn change_status(&self, client: &Client) -> Result<Client>;

    /// Succeeds iff the account is an enabled admin
    async fn check_super_admin(&self, id: &str) -> Result<()>;
}

/// Issues session tokens for an authenticated subject
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self, user_id: &str, domain_id: Option<&str>) -> Result<Token>;

    async fn refresh(&self, refresh_token: &str, domain_id: Option<&str>) -> Result<Token>;
}

/// Delivers password reset notifications
#[async_trait]
pub trait Emailer: Send + Sync {
    async fn send_password_reset(
        &self,
        to: &[String],
        host: &str,
        user: &str,
        token: &str,
    ) -> Result<()>;
}

/// Allocates account IDs
pub trait IdProvider: Send + Sync {
    fn id(&self) -> Result<String>;
}

/// Random UUIDv4 IDs
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn id(&self) -> Result<String> {
        Ok(uuid::Uuid::new_v4().to_string())
    }
}

/// Account service façade
#[async_trait]
pub trait IdentityService: Send + Sync {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Register an account. Registering for someone else needs a super admin.
    async fn register_client(
        &self,
        session: &Session,
        client: Client,
        self_register: bool,
    ) -> Result<Client>;

    async fn view_client(&self, session: &Session, id: &str) -> Result<Client>;

    async fn view_profile(&self, session: &Session) -> Result<Client>;

    async fn list_clients(&self, session: &Session, page: Page) -> Result<ClientsPage>;

    async fn search_users(&self, session: &Session, page: Page) -> Result<ClientsPage>;

    async fn update_client(&self, session: &Session, client: Client) -> Result<Client>;

    async fn update_client_tags(&self, session: &Session, client: Client) -> Result<Client>;

    async fn update_client_identity(
        &self,
        session: &Session,
        id: &str,
        identity: &str,
    ) -> Result<Client>;

    /// Change role, keeping the platform `administrator` relation in step
    async fn update_client_role(&self, session: &Session, id: &str, role: Role)
        -> Result<Client>;

    async fn enable_client(&self, session: &Session, id: &str) -> Result<Client>;

    async fn disable_client(&self, session: &Session, id: &str) -> Result<Client>;

    async fn delete_client(&self, session: &Session, id: &str) -> Result<Client>;

    // ========================================================================
    // Credentials
    // ========================================================================

    async fn issue_token(
        &self,
        identity: &str,
        secret: &str,
        domain_id: Option<&str>,
    ) -> Result<Token>;

    async fn refresh_token(
        &self,
        session: &Session,
        refresh_token: &str,
        domain_id: Option<&str>,
    ) -> Result<Token>;

    /// Rotate the caller's secret after re-authenticating with the old one
    async fn update_client_secret(
        &self,
        session: &Session,
        old_secret: &str,
        new_secret: &str,
    ) -> Result<Client>;

    /// Set the caller's secret; the session must come from a reset token
    async fn reset_secret(&self, session: &Session, new_secret: &str) -> Result<()>;

    async fn generate_reset_token(&self, identity: &str, host: &str) -> Result<()>;

    async fn send_password_reset(
        &self,
        host: &str,
        identity: &str,
        user: &str,
        token: &str,
    ) -> Result<()>;

    // ========================================================================
    // External identity providers
    // ========================================================================

    /// Sign in an existing enabled account by identity, or register a new
    /// user for an identity seen for the first time
    async fn oauth_callback(&self, client: Client) -> Result<Client>;

    /// Add the platform bootstrap policies if the account is not a member yet
    async fn oauth_add_client_policy(&self, client: &Client) -> Result<()>;

    // ========================================================================
    // Membership
    // ========================================================================

    async fn list_members(
        &self,
        session: &Session,
        kind: ObjectKind,
        object_id: &str,
        page: Page,
    ) -> Result<MembersPage>;

    /// Resolve the session to a live account ID
    async fn identify(&self, session: &Session) -> Result<String>;
}
