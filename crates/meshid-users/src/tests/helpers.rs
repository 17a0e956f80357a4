//! Test helpers and mocks for account service tests.

use crate::*;
use async_trait::async_trait;
use meshid_crypto::{CryptoError, Hasher};
use meshid_policy::{
    AccessRequest, Grant, ObjectType, Permission, Policy, PolicyFilter, PolicyRow, PolicyStore,
    StoragePolicyStore,
};
use meshid_storage::{RocksDbStorage, StorageError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const PLATFORM: &str = "magistrala";
pub const SECRET: &str = "longsecret1";

pub type TestService = IdentityServiceImpl<FlakyClientStore, FlakyPolicyStore, FakeTokenIssuer>;

/// Reversible stand-in for Argon2 so tests stay fast
#[derive(Default)]
pub struct FastHasher {
    pub compares: AtomicUsize,
}

impl Hasher for FastHasher {
    fn hash(&self, plaintext: &str) -> meshid_crypto::Result<String> {
        if plaintext.is_empty() {
            return Err(CryptoError::InvalidInput("empty secret".to_string()));
        }
        Ok(format!("hashed:{}", plaintext))
    }

    fn compare(&self, plaintext: &str, digest: &str) -> meshid_crypto::Result<()> {
        self.compares.fetch_add(1, Ordering::SeqCst);
        if digest == format!("hashed:{}", plaintext) {
            Ok(())
        } else {
            Err(CryptoError::Argon2Failed("mismatch".to_string()))
        }
    }
}

/// Token issuer that records every subject it issued for
#[derive(Default)]
pub struct FakeTokenIssuer {
    pub issued: Mutex<Vec<String>>,
    pub refreshed: AtomicUsize,
}

#[async_trait]
impl TokenIssuer for FakeTokenIssuer {
    async fn issue(&self, user_id: &str, domain_id: Option<&str>) -> Result<Token> {
        self.issued.lock().unwrap().push(user_id.to_string());
        Ok(Token {
            access_token: format!("access:{}:{}", user_id, domain_id.unwrap_or("-")),
            refresh_token: format!("refresh:{}", user_id),
        })
    }

    async fn refresh(&self, refresh_token: &str, _domain_id: Option<&str>) -> Result<Token> {
        self.refreshed.fetch_add(1, Ordering::SeqCst);
        Ok(Token {
            access_token: format!("access:{}", refresh_token),
            refresh_token: refresh_token.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: Vec<String>,
    pub host: String,
    pub user: String,
    pub token: String,
}

#[derive(Default)]
pub struct RecordingEmailer {
    pub sent: Mutex<Vec<SentEmail>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Emailer for RecordingEmailer {
    async fn send_password_reset(
        &self,
        to: &[String],
        host: &str,
        user: &str,
        token: &str,
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(UsersError::Email("smtp unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_vec(),
            host: host.to_string(),
            user: user.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }
}

/// Predictable ids: `client-1`, `client-2`, ...
#[derive(Default)]
pub struct SequentialIds {
    next: AtomicUsize,
}

impl IdProvider for SequentialIds {
    fn id(&self) -> Result<String> {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("client-{}", n))
    }
}

fn outage() -> StorageError {
    StorageError::Database("simulated outage".to_string())
}

/// Account store that counts writes and can be told to fail them
pub struct FlakyClientStore {
    pub inner: Arc<StorageClientRepository<RocksDbStorage>>,
    pub writes: AtomicUsize,
    pub fail_save: AtomicBool,
    pub fail_update_role: AtomicBool,
}

impl FlakyClientStore {
    fn new(inner: Arc<StorageClientRepository<RocksDbStorage>>) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
            fail_save: AtomicBool::new(false),
            fail_update_role: AtomicBool::new(false),
        }
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityStore for FlakyClientStore {
    async fn save(&self, client: Client) -> Result<Client> {
        self.record_write();
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(UsersError::CreateEntity(outage()));
        }
        self.inner.save(client).await
    }

    async fn retrieve_by_id(&self, id: &str) -> Result<Client> {
        self.inner.retrieve_by_id(id).await
    }

    async fn retrieve_by_identity(&self, identity: &str) -> Result<Client> {
        self.inner.retrieve_by_identity(identity).await
    }

    async fn retrieve_all(&self, page: &Page) -> Result<ClientsPage> {
        self.inner.retrieve_all(page).await
    }

    async fn search_clients(&self, page: &Page) -> Result<ClientsPage> {
        self.inner.search_clients(page).await
    }

    async fn update(&self, client: &Client) -> Result<Client> {
        self.record_write();
        self.inner.update(client).await
    }

    async fn update_tags(&self, client: &Client) -> Result<Client> {
        self.record_write();
        self.inner.update_tags(client).await
    }

    async fn update_identity(&self, client: &Client) -> Result<Client> {
        self.record_write();
        self.inner.update_identity(client).await
    }

    async fn update_secret(&self, client: &Client) -> Result<Client> {
        self.record_write();
        self.inner.update_secret(client).await
    }

    async fn update_role(&self, client: &Client) -> Result<Client> {
        self.record_write();
        if self.fail_update_role.load(Ordering::SeqCst) {
            return Err(UsersError::UpdateEntity(outage()));
        }
        self.inner.update_role(client).await
    }

    async fn change_status(&self, client: &Client) -> Result<Client> {
        self.record_write();
        self.inner.change_status(client).await
    }

    async fn check_super_admin(&self, id: &str) -> Result<()> {
        self.inner.check_super_admin(id).await
    }
}

/// Policy store that can fail mutations or selected permission lookups
pub struct FlakyPolicyStore {
    pub inner: StoragePolicyStore<RocksDbStorage>,
    pub fail_adds: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub fail_permissions_for: Mutex<HashSet<String>>,
    pub permission_lookups: AtomicUsize,
    pub lookups_in_flight: AtomicUsize,
    pub peak_lookups_in_flight: AtomicUsize,
}

impl FlakyPolicyStore {
    fn new(inner: StoragePolicyStore<RocksDbStorage>) -> Self {
        Self {
            inner,
            fail_adds: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            fail_permissions_for: Mutex::new(HashSet::new()),
            permission_lookups: AtomicUsize::new(0),
            lookups_in_flight: AtomicUsize::new(0),
            peak_lookups_in_flight: AtomicUsize::new(0),
        }
    }

    fn outage() -> meshid_policy::PolicyError {
        meshid_policy::PolicyError::Storage(outage())
    }

    fn deletes_fail(&self) -> bool {
        self.fail_deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyStore for FlakyPolicyStore {
    async fn add_policy(&self, policy: &Policy) -> meshid_policy::Result<()> {
        self.add_policies(std::slice::from_ref(policy)).await
    }

    async fn add_policies(&self, policies: &[Policy]) -> meshid_policy::Result<()> {
        if self.fail_adds.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.add_policies(policies).await
    }

    async fn delete_policy(&self, policy: &Policy) -> meshid_policy::Result<()> {
        self.delete_policies(std::slice::from_ref(policy)).await
    }

    async fn delete_policies(&self, policies: &[Policy]) -> meshid_policy::Result<()> {
        if self.deletes_fail() {
            return Err(Self::outage());
        }
        self.inner.delete_policies(policies).await
    }

    async fn delete_policy_filter(&self, filter: &PolicyFilter) -> meshid_policy::Result<()> {
        if self.deletes_fail() {
            return Err(Self::outage());
        }
        self.inner.delete_policy_filter(filter).await
    }

    async fn evaluate_access(&self, request: &AccessRequest) -> meshid_policy::Result<Grant> {
        self.inner.evaluate_access(request).await
    }

    async fn list_all_subjects(
        &self,
        object_type: ObjectType,
        object: &str,
        permission: Permission,
    ) -> meshid_policy::Result<Vec<String>> {
        self.inner
            .list_all_subjects(object_type, object, permission)
            .await
    }

    async fn list_permissions(
        &self,
        subject: &str,
        object_type: ObjectType,
        object: &str,
        filter: &[Permission],
    ) -> meshid_policy::Result<Vec<Permission>> {
        self.permission_lookups.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.lookups_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_lookups_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        // Hold the slot long enough for overlapping lookups to show up
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let failing = self.fail_permissions_for.lock().unwrap().contains(subject);
        let result = if failing {
            Err(Self::outage())
        } else {
            self.inner
                .list_permissions(subject, object_type, object, filter)
                .await
        };

        self.lookups_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn list_policies(&self, subject: &str) -> meshid_policy::Result<Vec<PolicyRow>> {
        self.inner.list_policies(subject).await
    }
}

pub struct TestContext {
    pub service: TestService,
    pub clients: Arc<FlakyClientStore>,
    pub policies: Arc<FlakyPolicyStore>,
    pub tokens: Arc<FakeTokenIssuer>,
    pub emailer: Arc<RecordingEmailer>,
    pub hasher: Arc<FastHasher>,
}

/// Service over a fresh RocksDB instance shared by both stores
pub fn create_test_context() -> TestContext {
    create_test_context_with(UsersConfig::with_defaults().unwrap())
}

pub fn create_test_context_with(config: UsersConfig) -> TestContext {
    let storage = Arc::new(RocksDbStorage::open_test().unwrap());
    let repository = Arc::new(StorageClientRepository::new(Arc::clone(&storage)));
    let policy_store =
        StoragePolicyStore::new(storage).with_ownership_resolver(repository.clone());

    let clients = Arc::new(FlakyClientStore::new(repository));
    let policies = Arc::new(FlakyPolicyStore::new(policy_store));
    let tokens = Arc::new(FakeTokenIssuer::default());
    let emailer = Arc::new(RecordingEmailer::default());
    let hasher = Arc::new(FastHasher::default());

    let service = IdentityServiceImpl::new(
        config,
        Arc::clone(&clients),
        Arc::clone(&policies),
        Arc::clone(&tokens),
        hasher.clone(),
        emailer.clone(),
        Arc::new(SequentialIds::default()),
    );

    TestContext {
        service,
        clients,
        policies,
        tokens,
        emailer,
        hasher,
    }
}

pub fn admin_session() -> Session {
    Session {
        super_admin: true,
        ..Session::new("root")
    }
}

pub fn user_session(id: &str) -> Session {
    Session::new(id)
}

pub fn domain_session(id: &str, domain_id: &str) -> Session {
    Session {
        domain_id: Some(domain_id.to_string()),
        ..Session::new(id)
    }
}

pub fn new_client(identity: &str, role: Role) -> Client {
    let mut client = Client::new(identity.split('@').next().unwrap_or(identity), identity, SECRET);
    client.role = role;
    client
}

impl TestContext {
    /// Register through the service with a super admin session
    pub async fn register(&self, identity: &str, role: Role) -> Client {
        self.service
            .register_client(&admin_session(), new_client(identity, role), false)
            .await
            .unwrap()
    }

    pub fn writes(&self) -> usize {
        self.clients.writes.load(Ordering::SeqCst)
    }

    /// Relations `subject` holds on the platform object
    pub async fn platform_relations(&self, subject: &str) -> Vec<meshid_policy::Relation> {
        self.policies
            .list_policies(subject)
            .await
            .unwrap()
            .into_iter()
            .filter(|row| row.object_type == ObjectType::Platform && row.object == PLATFORM)
            .flat_map(|row| row.relations)
            .collect()
    }
}
