//! Accounts arriving through an external identity provider.

use super::{IdentityServiceImpl, SagaStep};
use crate::{errors::*, traits::*, types::*, validation::*};
use meshid_crypto::{generate_salt, identity_digest};
use meshid_policy::{AccessRequest, ObjectType, Permission, PolicyError, PolicyStore};
use tracing::{debug, info, warn};

impl<R, P, T> IdentityServiceImpl<R, P, T>
where
    R: IdentityStore + 'static,
    P: PolicyStore + 'static,
    T: TokenIssuer + 'static,
{
    /// Resolve a provider-verified identity to a local account.
    ///
    /// An existing enabled account is returned as is. An unknown identity is
    /// registered as a plain user with a random secret nobody knows, so the
    /// account can only sign in through the provider.
    pub(crate) async fn oauth_callback_internal(&self, client: Client) -> Result<Client> {
        let identity = client.credentials.identity.clone();
        validate_identity(&identity)?;

        match self.clients.retrieve_by_identity(&identity).await {
            Ok(existing) if existing.status == Status::Enabled => {
                info!(client_id = %existing.id, "OAuth sign-in for existing client");
                Ok(existing.redacted())
            }
            Ok(existing) => {
                warn!(
                    client_id = %existing.id,
                    status = %existing.status,
                    "OAuth sign-in for inactive client"
                );
                Err(UsersError::Authentication)
            }
            Err(UsersError::NotFound) => {
                let mut account = Client::new(client.name, identity, String::new());
                account.id = self.ids.id()?;
                account.metadata = client.metadata;
                account.role = Role::User;
                account.status = Status::Enabled;
                account.credentials.secret = self.hasher.hash(generate_salt().as_str())?;

                debug!(
                    identity = %identity_digest(&account.credentials.identity),
                    "Registering client from OAuth provider"
                );
                self.persist_registration(&Session::default(), account).await
            }
            Err(err) => Err(err),
        }
    }

    /// Write the platform bootstrap policies for `client` unless it is
    /// already a platform member
    pub(crate) async fn oauth_add_client_policy_internal(&self, client: &Client) -> Result<()> {
        if client.id.is_empty() {
            return Err(UsersError::MalformedEntity("missing id".to_string()));
        }

        let membership = self
            .policies
            .evaluate_access(&AccessRequest::new(
                client.id.as_str(),
                ObjectType::Platform,
                self.config.platform_id.as_str(),
                Permission::Membership.as_str(),
            ))
            .await;

        match membership {
            Ok(_) => {
                debug!(client_id = %client.id, "Platform membership already present");
                Ok(())
            }
            Err(PolicyError::Authorization) => {
                let step =
                    SagaStep::registration(&self.config.platform_id, &client.id, client.role);
                self.coordinator.apply(&step.forward).await?;
                info!(client_id = %client.id, "Platform membership added");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
