//! Account service implementation.

mod clients;
mod coordinator;
mod credentials;
mod members;
mod oauth;

pub use coordinator::{role_policy_change, PolicyChange, PolicyConsistencyCoordinator, SagaStep};
pub use members::PermissionResolver;

use crate::{config::UsersConfig, errors::*, traits::*, types::*};
use async_trait::async_trait;
use meshid_crypto::Hasher;
use meshid_policy::PolicyStore;
use std::sync::Arc;

/// Account service implementation
pub struct IdentityServiceImpl<R, P, T>
where
    R: IdentityStore,
    P: PolicyStore,
    T: TokenIssuer,
{
    clients: Arc<R>,
    policies: Arc<P>,
    tokens: Arc<T>,
    hasher: Arc<dyn Hasher>,
    emailer: Arc<dyn Emailer>,
    ids: Arc<dyn IdProvider>,
    config: UsersConfig,
    coordinator: PolicyConsistencyCoordinator<P>,
    resolver: PermissionResolver<R, P>,
}

impl<R, P, T> IdentityServiceImpl<R, P, T>
where
    R: IdentityStore,
    P: PolicyStore,
    T: TokenIssuer,
{
    /// Create a new account service
    pub fn new(
        config: UsersConfig,
        clients: Arc<R>,
        policies: Arc<P>,
        tokens: Arc<T>,
        hasher: Arc<dyn Hasher>,
        emailer: Arc<dyn Emailer>,
        ids: Arc<dyn IdProvider>,
    ) -> Self {
        let coordinator = PolicyConsistencyCoordinator::new(Arc::clone(&policies));
        let resolver = PermissionResolver::new(
            Arc::clone(&clients),
            Arc::clone(&policies),
            config.permission_concurrency,
        );

        Self {
            clients,
            policies,
            tokens,
            hasher,
            emailer,
            ids,
            config,
            coordinator,
            resolver,
        }
    }

    /// Platform object id used for bootstrap and role policies
    pub fn platform_id(&self) -> &str {
        &self.config.platform_id
    }
}

#[async_trait]
impl<R, P, T> IdentityService for IdentityServiceImpl<R, P, T>
where
    R: IdentityStore + 'static,
    P: PolicyStore + 'static,
    T: TokenIssuer + 'static,
{
    async fn register_client(
        &self,
        session: &Session,
        client: Client,
        self_register: bool,
    ) -> Result<Client> {
        self.register_client_internal(session, client, self_register)
            .await
    }

    async fn view_client(&self, session: &Session, id: &str) -> Result<Client> {
        self.view_client_internal(session, id).await
    }

    async fn view_profile(&self, session: &Session) -> Result<Client> {
        self.view_profile_internal(session).await
    }

    async fn list_clients(&self, session: &Session, page: Page) -> Result<ClientsPage> {
        self.list_clients_internal(session, page).await
    }

    async fn search_users(&self, session: &Session, page: Page) -> Result<ClientsPage> {
        self.search_users_internal(session, page).await
    }

    async fn update_client(&self, session: &Session, client: Client) -> Result<Client> {
        self.update_client_internal(session, client).await
    }

    async fn update_client_tags(&self, session: &Session, client: Client) -> Result<Client> {
        self.update_client_tags_internal(session, client).await
    }

    async fn update_client_identity(
        &self,
        session: &Session,
        id: &str,
        identity: &str,
    ) -> Result<Client> {
        self.update_client_identity_internal(session, id, identity)
            .await
    }

    async fn update_client_role(
        &self,
        session: &Session,
        id: &str,
        role: Role,
    ) -> Result<Client> {
        self.update_client_role_internal(session, id, role).await
    }

    async fn enable_client(&self, session: &Session, id: &str) -> Result<Client> {
        self.change_status_internal(session, id, Status::Enabled)
            .await
    }

    async fn disable_client(&self, session: &Session, id: &str) -> Result<Client> {
        self.change_status_internal(session, id, Status::Disabled)
            .await
    }

    async fn delete_client(&self, session: &Session, id: &str) -> Result<Client> {
        self.change_status_internal(session, id, Status::Deleted)
            .await
    }

    async fn issue_token(
        &self,
        identity: &str,
        secret: &str,
        domain_id: Option<&str>,
    ) -> Result<Token> {
        self.issue_token_internal(identity, secret, domain_id).await
    }

    async fn refresh_token(
        &self,
        session: &Session,
        refresh_token: &str,
        domain_id: Option<&str>,
    ) -> Result<Token> {
        self.refresh_token_internal(session, refresh_token, domain_id)
            .await
    }

    async fn update_client_secret(
        &self,
        session: &Session,
        old_secret: &str,
        new_secret: &str,
    ) -> Result<Client> {
        self.update_client_secret_internal(session, old_secret, new_secret)
            .await
    }

    async fn reset_secret(&self, session: &Session, new_secret: &str) -> Result<()> {
        self.reset_secret_internal(session, new_secret).await
    }

    async fn generate_reset_token(&self, identity: &str, host: &str) -> Result<()> {
        self.generate_reset_token_internal(identity, host).await
    }

    async fn send_password_reset(
        &self,
        host: &str,
        identity: &str,
        user: &str,
        token: &str,
    ) -> Result<()> {
        self.send_password_reset_internal(host, identity, user, token)
            .await
    }

    async fn oauth_callback(&self, client: Client) -> Result<Client> {
        self.oauth_callback_internal(client).await
    }

    async fn oauth_add_client_policy(&self, client: &Client) -> Result<()> {
        self.oauth_add_client_policy_internal(client).await
    }

    async fn list_members(
        &self,
        session: &Session,
        kind: ObjectKind,
        object_id: &str,
        page: Page,
    ) -> Result<MembersPage> {
        self.list_members_internal(session, kind, object_id, page)
            .await
    }

    async fn identify(&self, session: &Session) -> Result<String> {
        self.identify_internal(session).await
    }
}
