//! Account type definitions.

use meshid_policy::{switch_to_permission, ObjectType, Permission};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub use meshid_crypto::current_timestamp;

/// Opaque key-value bag attached to an account
pub type Metadata = BTreeMap<String, String>;

/// Account role
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    User = 0x01,
    Admin = 0x02,
}

/// Stored account status
///
/// `Deleted` is terminal.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Enabled = 0x01,
    Disabled = 0x02,
    Deleted = 0x03,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Enabled => write!(f, "enabled"),
            Status::Disabled => write!(f, "disabled"),
            Status::Deleted => write!(f, "deleted"),
        }
    }
}

/// Status criterion for queries; `All` is never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusFilter {
    Only(Status),
    All,
}

impl Default for StatusFilter {
    fn default() -> Self {
        StatusFilter::Only(Status::Enabled)
    }
}

impl StatusFilter {
    pub fn matches(&self, status: Status) -> bool {
        match self {
            StatusFilter::Only(s) => *s == status,
            StatusFilter::All => true,
        }
    }
}

/// Login identity and secret. `secret` holds a digest once stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub identity: String,
    pub secret: String,
}

/// User or client account
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub tags: BTreeSet<String>,
    pub credentials: Credentials,
    pub metadata: Metadata,
    pub role: Role,
    pub status: Status,
    pub owner_id: Option<String>,
    pub created_at: u64,
    pub updated_at: Option<u64>,
    pub updated_by: Option<String>,
    /// Filled in by member listing; empty when stored
    pub permissions: Vec<Permission>,
}

impl Client {
    /// New enabled user account with a plaintext secret
    pub fn new(
        name: impl Into<String>,
        identity: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            credentials: Credentials {
                identity: identity.into(),
                secret: secret.into(),
            },
            ..Default::default()
        }
    }

    /// Public subset shown to callers without rights on the account
    pub fn basic_info(&self) -> Client {
        Client {
            id: self.id.clone(),
            name: self.name.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            ..Default::default()
        }
    }

    /// Copy with the secret digest blanked
    pub fn redacted(mut self) -> Client {
        self.credentials.secret.clear();
        self
    }
}

/// Query parameters for account listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
    pub ids: Vec<String>,
    pub name: Option<String>,
    pub identity: Option<String>,
    pub username: Option<String>,
    pub tag: Option<String>,
    pub status: StatusFilter,
    pub role: Option<Role>,
    pub metadata: Metadata,
    pub order: Option<String>,
    pub dir: Option<String>,
    /// Permission used when listing members
    pub permission: Option<String>,
    /// Attach each member's permissions when listing members
    pub list_perms: bool,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 10,
            ids: Vec::new(),
            name: None,
            identity: None,
            username: None,
            tag: None,
            status: StatusFilter::default(),
            role: None,
            metadata: Metadata::new(),
            order: None,
            dir: None,
            permission: None,
            list_perms: false,
        }
    }
}

/// One page of accounts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientsPage {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub clients: Vec<Client>,
}

/// One page of an object's members
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MembersPage {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub members: Vec<Client>,
}

/// Caller context validated upstream; never persisted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub user_id: String,
    pub domain_id: Option<String>,
    pub super_admin: bool,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

/// Access and refresh token pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
}

/// Kind of object whose members can be listed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Thing,
    Domain,
    Group,
}

/// How a requested permission is rewritten before lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionTransform {
    Unchanged,
    Switched,
}

impl PermissionTransform {
    pub fn apply<'a>(&self, permission: &'a str) -> &'a str {
        match self {
            PermissionTransform::Unchanged => permission,
            PermissionTransform::Switched => switch_to_permission(permission),
        }
    }
}

impl ObjectKind {
    /// Policy object type and permission rewrite for this kind
    pub fn descriptor(&self) -> (ObjectType, PermissionTransform) {
        match self {
            ObjectKind::Thing => (ObjectType::Thing, PermissionTransform::Unchanged),
            ObjectKind::Group => (ObjectType::Group, PermissionTransform::Unchanged),
            ObjectKind::Domain => (ObjectType::Domain, PermissionTransform::Switched),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter_default_is_enabled() {
        let filter = StatusFilter::default();
        assert!(filter.matches(Status::Enabled));
        assert!(!filter.matches(Status::Disabled));
        assert!(StatusFilter::All.matches(Status::Deleted));
    }

    #[test]
    fn test_basic_info_hides_private_fields() {
        let mut client = Client::new("alice", "a@example.com", "digest");
        client.id = "u1".to_string();
        client.tags.insert("ops".to_string());
        client.metadata.insert("k".to_string(), "v".to_string());
        client.role = Role::Admin;

        let info = client.basic_info();
        assert_eq!(info.id, "u1");
        assert_eq!(info.name, "alice");
        assert!(info.credentials.identity.is_empty());
        assert!(info.credentials.secret.is_empty());
        assert!(info.tags.is_empty());
        assert!(info.metadata.is_empty());
        assert_eq!(info.role, Role::User);
    }

    #[test]
    fn test_redacted_keeps_identity() {
        let client = Client::new("alice", "a@example.com", "digest").redacted();
        assert_eq!(client.credentials.identity, "a@example.com");
        assert!(client.credentials.secret.is_empty());
    }

    #[test]
    fn test_object_kind_descriptor() {
        let (ty, transform) = ObjectKind::Domain.descriptor();
        assert_eq!(ty, ObjectType::Domain);
        assert_eq!(transform.apply("administrator"), "admin");

        let (ty, transform) = ObjectKind::Thing.descriptor();
        assert_eq!(ty, ObjectType::Thing);
        assert_eq!(transform.apply("administrator"), "administrator");

        assert_eq!(ObjectKind::Group.descriptor().0, ObjectType::Group);
    }

    #[test]
    fn test_client_json_shape() {
        let client = Client::new("alice", "a@example.com", "digest");
        let json = serde_json::to_string(&client).unwrap();
        assert!(json.contains("\"identity\":\"a@example.com\""));
        assert!(json.contains("\"status\":\"Enabled\""));
    }
}
