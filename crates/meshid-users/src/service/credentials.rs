//! Login, token refresh and secret management.

use super::IdentityServiceImpl;
use crate::{errors::*, traits::*, types::*, validation::validate_password};
use meshid_crypto::identity_digest;
use meshid_policy::PolicyStore;
use tracing::{debug, info, warn};

/// Compared against when the identity is unknown so that missing accounts
/// cost the same hashing work as wrong passwords
const DUMMY_DIGEST: &str =
    "$argon2id$v=19$m=65536,t=3,p=1$aGVsbG93b3JsZA$0123456789abcdef0123456789abcdef";

impl<R, P, T> IdentityServiceImpl<R, P, T>
where
    R: IdentityStore + 'static,
    P: PolicyStore + 'static,
    T: TokenIssuer + 'static,
{
    pub(crate) async fn issue_token_internal(
        &self,
        identity: &str,
        secret: &str,
        domain_id: Option<&str>,
    ) -> Result<Token> {
        let client = self.authenticate(identity, secret).await?;
        let token = self.tokens.issue(&client.id, domain_id).await?;

        info!(client_id = %client.id, "Token issued");
        Ok(token)
    }

    pub(crate) async fn refresh_token_internal(
        &self,
        session: &Session,
        refresh_token: &str,
        domain_id: Option<&str>,
    ) -> Result<Token> {
        let client = match self.clients.retrieve_by_id(&session.user_id).await {
            Ok(client) => client,
            Err(UsersError::NotFound) => return Err(UsersError::Authentication),
            Err(err) => return Err(err),
        };
        if client.status != Status::Enabled {
            debug!(client_id = %client.id, status = %client.status, "Refresh refused");
            return Err(UsersError::Authentication);
        }

        self.tokens.refresh(refresh_token, domain_id).await
    }

    /// Replace the caller's secret after re-verifying the old one
    pub(crate) async fn update_client_secret_internal(
        &self,
        session: &Session,
        old_secret: &str,
        new_secret: &str,
    ) -> Result<Client> {
        validate_password(new_secret, &self.config.password_regex)?;

        let current = self.clients.retrieve_by_id(&session.user_id).await?;
        self.authenticate(&current.credentials.identity, old_secret)
            .await?;

        let update = Client {
            id: current.id,
            credentials: Credentials {
                identity: current.credentials.identity,
                secret: self.hasher.hash(new_secret)?,
            },
            updated_at: Some(current_timestamp()),
            updated_by: Some(session.user_id.clone()),
            ..Default::default()
        };
        let saved = self.clients.update_secret(&update).await?;

        info!(client_id = %saved.id, "Client secret updated");
        Ok(saved.redacted())
    }

    /// Replace the caller's secret without the old one; the session comes
    /// from a reset token
    pub(crate) async fn reset_secret_internal(
        &self,
        session: &Session,
        new_secret: &str,
    ) -> Result<()> {
        validate_password(new_secret, &self.config.password_regex)?;

        let current = self.clients.retrieve_by_id(&session.user_id).await?;
        let update = Client {
            id: current.id,
            credentials: Credentials {
                identity: current.credentials.identity,
                secret: self.hasher.hash(new_secret)?,
            },
            updated_at: Some(current_timestamp()),
            updated_by: Some(session.user_id.clone()),
            ..Default::default()
        };
        self.clients.update_secret(&update).await?;

        info!(client_id = %session.user_id, "Client secret reset");
        Ok(())
    }

    /// Issue a reset token for `identity` and mail it.
    ///
    /// Delivery failures are logged, not returned.
    pub(crate) async fn generate_reset_token_internal(
        &self,
        identity: &str,
        host: &str,
    ) -> Result<()> {
        let client = self.clients.retrieve_by_identity(identity).await?;
        let token = self.tokens.issue(&client.id, None).await?;

        if let Err(err) = self
            .send_password_reset_internal(host, identity, &client.name, &token.access_token)
            .await
        {
            warn!(
                identity = %identity_digest(identity),
                error = %err,
                "Password reset email not delivered"
            );
        }
        Ok(())
    }

    pub(crate) async fn send_password_reset_internal(
        &self,
        host: &str,
        identity: &str,
        user: &str,
        token: &str,
    ) -> Result<()> {
        self.emailer
            .send_password_reset(&[identity.to_string()], host, user, token)
            .await
    }

    async fn authenticate(&self, identity: &str, secret: &str) -> Result<Client> {
        let client = match self.clients.retrieve_by_identity(identity).await {
            Ok(client) => client,
            Err(UsersError::NotFound) => {
                let _ = self.hasher.compare(secret, DUMMY_DIGEST);
                debug!(identity = %identity_digest(identity), "Login for unknown identity");
                return Err(UsersError::Authentication);
            }
            Err(err) => return Err(err),
        };

        if self
            .hasher
            .compare(secret, &client.credentials.secret)
            .is_err()
        {
            debug!(client_id = %client.id, "Login with wrong secret");
            return Err(UsersError::Authentication);
        }
        if client.status != Status::Enabled {
            debug!(client_id = %client.id, status = %client.status, "Login for inactive account");
            return Err(UsersError::Authentication);
        }

        Ok(client)
    }
}
