//! Account lifecycle operations.

use super::{IdentityServiceImpl, SagaStep};
use crate::{errors::*, traits::*, types::*, validation::*};
use meshid_crypto::identity_digest;
use meshid_policy::{
    encode_domain_user_id, switch_to_permission, AccessRequest, ObjectType, Permission,
    PolicyStore,
};
use tracing::{info, warn};

impl<R, P, T> IdentityServiceImpl<R, P, T>
where
    R: IdentityStore + 'static,
    P: PolicyStore + 'static,
    T: TokenIssuer + 'static,
{
    /// Register an account, writing its bootstrap policies first
    pub(crate) async fn register_client_internal(
        &self,
        session: &Session,
        mut client: Client,
        self_register: bool,
    ) -> Result<Client> {
        if !self_register {
            self.check_super_admin(session).await?;
        }

        client.id = self.ids.id()?;

        if client.credentials.secret.is_empty() {
            return Err(UsersError::MalformedEntity("missing secret".to_string()));
        }
        validate_identity(&client.credentials.identity)?;
        validate_password(&client.credentials.secret, &self.config.password_regex)?;
        client.credentials.secret = self.hasher.hash(&client.credentials.secret)?;

        self.persist_registration(session, client).await
    }

    /// Save a validated account with its secret already hashed, writing its
    /// bootstrap policies first
    pub(crate) async fn persist_registration(
        &self,
        session: &Session,
        mut client: Client,
    ) -> Result<Client> {
        if client.status == Status::Deleted {
            return Err(UsersError::MalformedEntity(
                "invalid client status".to_string(),
            ));
        }

        if client.owner_id.is_none() && !session.user_id.is_empty() {
            client.owner_id = Some(session.user_id.clone());
        }
        client.created_at = current_timestamp();
        client.updated_at = None;
        client.updated_by = None;
        client.permissions.clear();

        let step = SagaStep::registration(&self.config.platform_id, &client.id, client.role);
        let saved = self
            .coordinator
            .run(&step, self.clients.save(client))
            .await?;

        info!(
            client_id = %saved.id,
            identity = %identity_digest(&saved.credentials.identity),
            role = ?saved.role,
            "Client registered"
        );
        Ok(saved.redacted())
    }

    pub(crate) async fn view_client_internal(&self, session: &Session, id: &str) -> Result<Client> {
        let client = self.clients.retrieve_by_id(id).await?;

        if session.user_id == id || self.is_super_admin(session).await? {
            return Ok(client.redacted());
        }
        Ok(client.basic_info())
    }

    pub(crate) async fn view_profile_internal(&self, session: &Session) -> Result<Client> {
        let client = self.clients.retrieve_by_id(&session.user_id).await?;
        Ok(client.redacted())
    }

    /// Super admins see every account; others see enabled users only
    pub(crate) async fn list_clients_internal(
        &self,
        session: &Session,
        page: Page,
    ) -> Result<ClientsPage> {
        if self.is_super_admin(session).await? {
            let mut result = self.clients.retrieve_all(&page).await?;
            result.clients = result.clients.into_iter().map(Client::redacted).collect();
            return Ok(result);
        }

        let page = Page {
            status: StatusFilter::Only(Status::Enabled),
            role: Some(Role::User),
            ..page
        };
        let mut result = self.clients.retrieve_all(&page).await?;
        result.clients = result.clients.iter().map(Client::basic_info).collect();
        Ok(result)
    }

    pub(crate) async fn search_users_internal(
        &self,
        session: &Session,
        page: Page,
    ) -> Result<ClientsPage> {
        self.identify_internal(session).await?;
        self.clients.search_clients(&page).await
    }

    pub(crate) async fn update_client_internal(
        &self,
        session: &Session,
        client: Client,
    ) -> Result<Client> {
        self.authorize_self_or_admin(session, &client.id).await?;

        let update = Client {
            id: client.id,
            name: client.name,
            metadata: client.metadata,
            updated_at: Some(current_timestamp()),
            updated_by: Some(session.user_id.clone()),
            ..Default::default()
        };
        Ok(self.clients.update(&update).await?.redacted())
    }

    pub(crate) async fn update_client_tags_internal(
        &self,
        session: &Session,
        client: Client,
    ) -> Result<Client> {
        self.authorize_self_or_admin(session, &client.id).await?;

        let update = Client {
            id: client.id,
            tags: client.tags,
            updated_at: Some(current_timestamp()),
            updated_by: Some(session.user_id.clone()),
            ..Default::default()
        };
        Ok(self.clients.update_tags(&update).await?.redacted())
    }

    pub(crate) async fn update_client_identity_internal(
        &self,
        session: &Session,
        id: &str,
        identity: &str,
    ) -> Result<Client> {
        self.authorize_self_or_admin(session, id).await?;
        validate_identity(identity)?;

        let update = Client {
            id: id.to_string(),
            credentials: Credentials {
                identity: identity.to_string(),
                secret: String::new(),
            },
            updated_at: Some(current_timestamp()),
            updated_by: Some(session.user_id.clone()),
            ..Default::default()
        };
        Ok(self.clients.update_identity(&update).await?.redacted())
    }

    /// Change an account's role, moving the platform `administrator`
    /// relation before the row is written
    pub(crate) async fn update_client_role_internal(
        &self,
        session: &Session,
        id: &str,
        role: Role,
    ) -> Result<Client> {
        self.check_super_admin(session).await?;
        self.policies
            .evaluate_access(&AccessRequest::new(
                id,
                ObjectType::Platform,
                self.config.platform_id.as_str(),
                Permission::Membership.as_str(),
            ))
            .await?;

        let current = self.clients.retrieve_by_id(id).await?;
        let step = SagaStep::role_change(&self.config.platform_id, id, current.role, role);

        let update = Client {
            id: id.to_string(),
            role,
            updated_at: Some(current_timestamp()),
            updated_by: Some(session.user_id.clone()),
            ..Default::default()
        };
        let saved = self
            .coordinator
            .run(&step, self.clients.update_role(&update))
            .await?;

        info!(client_id = %id, from = ?current.role, to = ?role, "Client role updated");
        Ok(saved.redacted())
    }

    /// Move an account to `target`, refusing no-op and out-of-Deleted moves
    pub(crate) async fn change_status_internal(
        &self,
        session: &Session,
        id: &str,
        target: Status,
    ) -> Result<Client> {
        self.authorize_self_or_admin(session, id).await?;

        let current = self.clients.retrieve_by_id(id).await?;
        if current.status == target {
            return Err(UsersError::StatusAlreadyAssigned);
        }
        if current.status == Status::Deleted {
            return Err(UsersError::InvalidTransition {
                from: current.status,
                to: target,
            });
        }

        let update = Client {
            id: id.to_string(),
            status: target,
            updated_at: Some(current_timestamp()),
            updated_by: Some(session.user_id.clone()),
            ..Default::default()
        };
        let saved = self.clients.change_status(&update).await?;

        info!(client_id = %id, from = %current.status, to = %target, "Client status changed");
        Ok(saved.redacted())
    }

    /// Members of an object, gated on the caller holding the switched
    /// permission there
    pub(crate) async fn list_members_internal(
        &self,
        session: &Session,
        kind: ObjectKind,
        object_id: &str,
        page: Page,
    ) -> Result<MembersPage> {
        let domain_id = session.domain_id.as_deref().filter(|d| !d.is_empty());

        if !self.is_super_admin(session).await? {
            // Member listings are domain scoped for everyone but super admins
            let Some(domain) = domain_id else {
                warn!(user_id = %session.user_id, object_id = %object_id, "Member listing without a domain");
                return Err(UsersError::Authorization);
            };

            let (object_type, _) = kind.descriptor();
            let requested = page
                .permission
                .as_deref()
                .unwrap_or(super::members::DEFAULT_MEMBER_PERMISSION);
            let caller = encode_domain_user_id(domain, &session.user_id);

            self.policies
                .evaluate_access(&AccessRequest::new(
                    caller,
                    object_type,
                    object_id,
                    switch_to_permission(requested),
                ))
                .await
                .inspect_err(|_| {
                    warn!(user_id = %session.user_id, object_id = %object_id, "Member listing denied")
                })?;
        }

        self.resolver
            .list_members(kind, domain_id, object_id, &page)
            .await
    }

    pub(crate) async fn identify_internal(&self, session: &Session) -> Result<String> {
        if session.user_id.is_empty() {
            return Err(UsersError::Authentication);
        }

        let client = match self.clients.retrieve_by_id(&session.user_id).await {
            Ok(client) => client,
            Err(UsersError::NotFound) => return Err(UsersError::Authentication),
            Err(err) => return Err(err),
        };
        if client.status == Status::Deleted {
            return Err(UsersError::Authentication);
        }

        Ok(client.id)
    }

    /// Super admin via session flag, stored role, or platform policy
    pub(crate) async fn check_super_admin(&self, session: &Session) -> Result<()> {
        if session.super_admin {
            return Ok(());
        }
        if session.user_id.is_empty() {
            return Err(UsersError::Authorization);
        }

        match self.clients.check_super_admin(&session.user_id).await {
            Ok(()) => return Ok(()),
            Err(UsersError::Authorization) | Err(UsersError::NotFound) => {}
            Err(err) => return Err(err),
        }

        self.policies
            .evaluate_access(&AccessRequest::new(
                session.user_id.as_str(),
                ObjectType::Platform,
                self.config.platform_id.as_str(),
                Permission::Admin.as_str(),
            ))
            .await?;
        Ok(())
    }

    pub(crate) async fn is_super_admin(&self, session: &Session) -> Result<bool> {
        match self.check_super_admin(session).await {
            Ok(()) => Ok(true),
            Err(UsersError::Authorization) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn authorize_self_or_admin(&self, session: &Session, id: &str) -> Result<()> {
        if !session.user_id.is_empty() && session.user_id == id {
            return Ok(());
        }
        self.check_super_admin(session).await
    }
}
