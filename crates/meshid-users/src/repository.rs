//! Account repository over key-value storage.

use crate::{
    errors::{Result, UsersError},
    traits::IdentityStore,
    types::*,
    validation::validate_client_fields,
};
use async_trait::async_trait;
use meshid_policy::{ObjectType, OwnershipResolver, PolicyError};
use meshid_storage::{BatchExt, Storage, StorageError, CF_CLIENTS, CF_CLIENTS_BY_IDENTITY};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// [`IdentityStore`] backed by [`Storage`]
///
/// Records live in `clients`, keyed by id. `clients_by_identity` maps each
/// identity to its id and is the uniqueness constraint.
pub struct StorageClientRepository<S: Storage> {
    storage: Arc<S>,
    // Serializes check-then-write on the identity index.
    write_lock: Mutex<()>,
}

impl<S: Storage> StorageClientRepository<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self, id: &str) -> Result<Option<Client>> {
        self.storage
            .get(CF_CLIENTS, &id.to_string())
            .await
            .map_err(UsersError::ViewEntity)
    }

    async fn load_all(&self) -> Result<Vec<Client>> {
        let rows: Vec<(Vec<u8>, Client)> = self
            .storage
            .scan_all(CF_CLIENTS)
            .await
            .map_err(UsersError::ViewEntity)?;
        Ok(rows.into_iter().map(|(_, client)| client).collect())
    }

    /// Load, check, mutate and write back one record
    async fn modify<F>(&self, id: &str, require_enabled: bool, apply: F) -> Result<Client>
    where
        F: FnOnce(&mut Client) + Send,
    {
        let _guard = self.write_lock.lock().await;

        let mut client = self.load(id).await?.ok_or(UsersError::NotFound)?;
        if require_enabled && client.status != Status::Enabled {
            return Err(UsersError::NotFound);
        }

        apply(&mut client);
        validate_client_fields(&client)?;

        self.storage
            .put(CF_CLIENTS, &client.id, &client)
            .await
            .map_err(UsersError::UpdateEntity)?;

        Ok(client)
    }

    fn matches(page: &Page, client: &Client) -> bool {
        if !page.ids.is_empty() && !page.ids.contains(&client.id) {
            return false;
        }
        if !page.status.matches(client.status) {
            return false;
        }
        if page.name.as_ref().is_some_and(|n| *n != client.name) {
            return false;
        }
        if page
            .identity
            .as_ref()
            .is_some_and(|i| *i != client.credentials.identity)
        {
            return false;
        }
        if page
            .username
            .as_ref()
            .is_some_and(|u| u != local_part(&client.credentials.identity))
        {
            return false;
        }
        if page.tag.as_ref().is_some_and(|t| !client.tags.contains(t)) {
            return false;
        }
        if page.role.is_some_and(|r| r != client.role) {
            return false;
        }
        page.metadata
            .iter()
            .all(|(k, v)| client.metadata.get(k) == Some(v))
    }

    fn search_matches(page: &Page, client: &Client) -> bool {
        if !page.status.matches(client.status) {
            return false;
        }
        let needles: Vec<String> = [&page.name, &page.identity]
            .into_iter()
            .flatten()
            .map(|n| n.to_lowercase())
            .collect();
        if needles.is_empty() {
            return true;
        }

        let name = client.name.to_lowercase();
        let identity = client.credentials.identity.to_lowercase();
        needles
            .iter()
            .any(|n| name.contains(n.as_str()) || identity.contains(n.as_str()))
    }

    fn sort(page: &Page, clients: &mut [Client]) {
        let descending = page
            .dir
            .as_deref()
            .is_some_and(|d| d.eq_ignore_ascii_case("desc"));

        clients.sort_by(|a, b| {
            let primary = match page.order.as_deref() {
                Some("name") => a.name.cmp(&b.name),
                Some("identity") | Some("email") => {
                    a.credentials.identity.cmp(&b.credentials.identity)
                }
                Some("updated_at") => a.updated_at.cmp(&b.updated_at),
                _ => a.created_at.cmp(&b.created_at),
            };
            let ordering = primary.then_with(|| a.id.cmp(&b.id));
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }

    fn paginate(page: &Page, clients: Vec<Client>) -> ClientsPage {
        let total = clients.len() as u64;
        let clients = clients
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect();

        ClientsPage {
            total,
            offset: page.offset,
            limit: page.limit,
            clients,
        }
    }
}

fn local_part(identity: &str) -> &str {
    identity.split('@').next().unwrap_or(identity)
}

#[async_trait]
impl<S: Storage + 'static> IdentityStore for StorageClientRepository<S> {
    async fn save(&self, client: Client) -> Result<Client> {
        validate_client_fields(&client)?;
        if client.id.is_empty() {
            return Err(UsersError::MalformedEntity("missing id".to_string()));
        }

        let _guard = self.write_lock.lock().await;

        let identity_taken = self
            .storage
            .exists(CF_CLIENTS_BY_IDENTITY, &client.credentials.identity)
            .await
            .map_err(UsersError::CreateEntity)?;
        let id_taken = self
            .storage
            .exists(CF_CLIENTS, &client.id)
            .await
            .map_err(UsersError::CreateEntity)?;
        if identity_taken || id_taken {
            return Err(UsersError::Conflict);
        }

        let mut batch = self.storage.batch();
        let staged: std::result::Result<(), StorageError> = (|| {
            batch.put(CF_CLIENTS, &client.id, &client)?;
            batch.put(CF_CLIENTS_BY_IDENTITY, &client.credentials.identity, &client.id)
        })();
        staged.map_err(UsersError::CreateEntity)?;
        batch.commit().await.map_err(UsersError::CreateEntity)?;

        debug!(client_id = %client.id, "Client saved");
        Ok(client)
    }

    async fn retrieve_by_id(&self, id: &str) -> Result<Client> {
        self.load(id).await?.ok_or(UsersError::NotFound)
    }

    async fn retrieve_by_identity(&self, identity: &str) -> Result<Client> {
        let id: Option<String> = self
            .storage
            .get(CF_CLIENTS_BY_IDENTITY, &identity.to_string())
            .await
            .map_err(UsersError::ViewEntity)?;

        match id {
            Some(id) => self.retrieve_by_id(&id).await,
            None => Err(UsersError::NotFound),
        }
    }

    async fn retrieve_all(&self, page: &Page) -> Result<ClientsPage> {
        let mut clients: Vec<Client> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|c| Self::matches(page, c))
            .collect();

        Self::sort(page, &mut clients);
        Ok(Self::paginate(page, clients))
    }

    async fn search_clients(&self, page: &Page) -> Result<ClientsPage> {
        let mut clients: Vec<Client> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|c| Self::search_matches(page, c))
            .collect();

        Self::sort(page, &mut clients);
        let mut result = Self::paginate(page, clients);
        result.clients = result.clients.iter().map(Client::basic_info).collect();
        Ok(result)
    }

    async fn update(&self, client: &Client) -> Result<Client> {
        let (name, metadata) = (client.name.clone(), client.metadata.clone());
        let (updated_at, updated_by) = (client.updated_at, client.updated_by.clone());
        self.modify(&client.id, true, move |c| {
            c.name = name;
            c.metadata = metadata;
            c.updated_at = updated_at;
            c.updated_by = updated_by;
        })
        .await
    }

    async fn update_tags(&self, client: &Client) -> Result<Client> {
        let tags = client.tags.clone();
        let (updated_at, updated_by) = (client.updated_at, client.updated_by.clone());
        self.modify(&client.id, true, move |c| {
            c.tags = tags;
            c.updated_at = updated_at;
            c.updated_by = updated_by;
        })
        .await
    }

    async fn update_identity(&self, client: &Client) -> Result<Client> {
        validate_client_fields(client)?;
        let _guard = self.write_lock.lock().await;

        let mut current = self.load(&client.id).await?.ok_or(UsersError::NotFound)?;
        if current.status != Status::Enabled {
            return Err(UsersError::NotFound);
        }

        let new_identity = client.credentials.identity.clone();
        if new_identity != current.credentials.identity {
            let taken = self
                .storage
                .exists(CF_CLIENTS_BY_IDENTITY, &new_identity)
                .await
                .map_err(UsersError::UpdateEntity)?;
            if taken {
                return Err(UsersError::Conflict);
            }
        }

        let old_identity = std::mem::replace(&mut current.credentials.identity, new_identity);
        current.updated_at = client.updated_at;
        current.updated_by = client.updated_by.clone();

        let mut batch = self.storage.batch();
        let staged: std::result::Result<(), StorageError> = (|| {
            batch.delete(CF_CLIENTS_BY_IDENTITY, &old_identity)?;
            batch.put(CF_CLIENTS_BY_IDENTITY, &current.credentials.identity, &current.id)?;
            batch.put(CF_CLIENTS, &current.id, &current)
        })();
        staged.map_err(UsersError::UpdateEntity)?;
        batch.commit().await.map_err(UsersError::UpdateEntity)?;

        Ok(current)
    }

    async fn update_secret(&self, client: &Client) -> Result<Client> {
        let secret = client.credentials.secret.clone();
        let (updated_at, updated_by) = (client.updated_at, client.updated_by.clone());
        self.modify(&client.id, true, move |c| {
            c.credentials.secret = secret;
            c.updated_at = updated_at;
            c.updated_by = updated_by;
        })
        .await
    }

    async fn update_role(&self, client: &Client) -> Result<Client> {
        let role = client.role;
        let (updated_at, updated_by) = (client.updated_at, client.updated_by.clone());
        self.modify(&client.id, true, move |c| {
            c.role = role;
            c.updated_at = updated_at;
            c.updated_by = updated_by;
        })
        .await
    }

    async fn change_status(&self, client: &Client) -> Result<Client> {
        let status = client.status;
        let (updated_at, updated_by) = (client.updated_at, client.updated_by.clone());
        self.modify(&client.id, false, move |c| {
            c.status = status;
            c.updated_at = updated_at;
            c.updated_by = updated_by;
        })
        .await
    }

    async fn check_super_admin(&self, id: &str) -> Result<()> {
        match self.load(id).await? {
            Some(client) if client.role == Role::Admin && client.status == Status::Enabled => {
                Ok(())
            }
            _ => Err(UsersError::Authorization),
        }
    }
}

#[async_trait]
impl<S: Storage + 'static> OwnershipResolver for StorageClientRepository<S> {
    async fn owner_of(
        &self,
        object_type: ObjectType,
        object: &str,
    ) -> meshid_policy::Result<Option<String>> {
        if object_type != ObjectType::User {
            return Ok(None);
        }

        let client = self
            .load(object)
            .await
            .map_err(|e| PolicyError::Internal(e.to_string()))?;
        Ok(client.and_then(|c| c.owner_id))
    }
}
