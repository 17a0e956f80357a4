//! Policy type definitions.

use crate::errors::PolicyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Kind of entity on either side of a policy
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    User = 0x01,
    Group = 0x02,
    Thing = 0x03,
    Domain = 0x04,
    Platform = 0x05,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::User => "user",
            ObjectType::Group => "group",
            ObjectType::Thing => "thing",
            ObjectType::Domain => "domain",
            ObjectType::Platform => "platform",
        }
    }
}

/// Direct relation a subject holds on an object
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Relation {
    Administrator = 0x01,
    Editor = 0x02,
    Viewer = 0x03,
    Member = 0x04,
    Owner = 0x05,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Administrator => "administrator",
            Relation::Editor => "editor",
            Relation::Viewer => "viewer",
            Relation::Member => "member",
            Relation::Owner => "owner",
        }
    }
}

/// Permission derived from one or more relations
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Permission {
    Admin = 0x01,
    Delete = 0x02,
    Edit = 0x03,
    View = 0x04,
    Membership = 0x05,
    Share = 0x06,
    Publish = 0x07,
    Subscribe = 0x08,
}

impl Permission {
    pub const ALL: [Permission; 8] = [
        Permission::Admin,
        Permission::Delete,
        Permission::Edit,
        Permission::View,
        Permission::Membership,
        Permission::Share,
        Permission::Publish,
        Permission::Subscribe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Admin => "admin",
            Permission::Delete => "delete",
            Permission::Edit => "edit",
            Permission::View => "view",
            Permission::Membership => "membership",
            Permission::Share => "share",
            Permission::Publish => "publish",
            Permission::Subscribe => "subscribe",
        }
    }
}

macro_rules! impl_str_conversions {
    ($ty:ty, $what:literal, [$($variant:path),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = PolicyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                [$($variant),+]
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| PolicyError::MalformedPolicy(format!("unknown {}: {:?}", $what, s)))
            }
        }
    };
}

impl_str_conversions!(
    ObjectType,
    "object type",
    [
        ObjectType::User,
        ObjectType::Group,
        ObjectType::Thing,
        ObjectType::Domain,
        ObjectType::Platform,
    ]
);
impl_str_conversions!(
    Relation,
    "relation",
    [
        Relation::Administrator,
        Relation::Editor,
        Relation::Viewer,
        Relation::Member,
        Relation::Owner,
    ]
);
impl_str_conversions!(
    Permission,
    "permission",
    [
        Permission::Admin,
        Permission::Delete,
        Permission::Edit,
        Permission::View,
        Permission::Membership,
        Permission::Share,
        Permission::Publish,
        Permission::Subscribe,
    ]
);

/// A single relationship triple with optional extra actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub subject_type: ObjectType,
    pub subject: String,
    pub relation: Relation,
    pub object_type: ObjectType,
    pub object: String,
    pub actions: BTreeSet<String>,
    pub updated_by: Option<String>,
}

impl Policy {
    pub fn new(
        subject_type: ObjectType,
        subject: impl Into<String>,
        relation: Relation,
        object_type: ObjectType,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject_type,
            subject: subject.into(),
            relation,
            object_type,
            object: object.into(),
            actions: BTreeSet::new(),
            updated_by: None,
        }
    }

    pub fn with_actions<I, A>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_updated_by(mut self, updated_by: impl Into<String>) -> Self {
        self.updated_by = Some(updated_by.into());
        self
    }

    pub(crate) fn row_key(&self) -> (String, String) {
        (self.subject.clone(), self.object.clone())
    }
}

/// Persisted row: every relation and action one subject holds on one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRow {
    pub subject_type: ObjectType,
    pub subject: String,
    pub object_type: ObjectType,
    pub object: String,
    pub relations: BTreeSet<Relation>,
    pub actions: BTreeSet<String>,
    pub created_at: u64,
    pub updated_at: Option<u64>,
    pub updated_by: Option<String>,
}

/// Wildcard delete: drop `relation` for `subject` on every matching object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyFilter {
    pub subject: String,
    pub relation: Relation,
    /// Restrict to objects of this type; `None` matches all
    pub object_type: Option<ObjectType>,
}

/// Access check input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub subject: String,
    pub object_type: ObjectType,
    pub object: String,
    /// Permission name or custom action
    pub action: String,
}

impl AccessRequest {
    pub fn new(
        subject: impl Into<String>,
        object_type: ObjectType,
        object: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            object_type,
            object: object.into(),
            action: action.into(),
        }
    }
}

/// How a successful access check was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Policy,
    Ownership,
}

/// Map a relation name to the permission used when listing members by it.
///
/// Names that are not relations pass through unchanged.
pub fn switch_to_permission(relation: &str) -> &str {
    match relation {
        "administrator" => "admin",
        "editor" => "edit",
        "viewer" => "view",
        "member" => "membership",
        other => other,
    }
}

/// Join a domain and user id into a domain-scoped subject id
pub fn encode_domain_user_id(domain_id: &str, user_id: &str) -> String {
    if domain_id.is_empty() {
        return user_id.to_string();
    }
    format!("{}_{}", domain_id, user_id)
}

/// Split a domain-scoped subject id into `(domain_id, user_id)`.
///
/// A bare id is returned as the domain part with an empty user.
pub fn decode_domain_user_id(id: &str) -> (String, String) {
    let parts: Vec<&str> = id.split('_').collect();
    match parts.as_slice() {
        [domain, user] => (domain.to_string(), user.to_string()),
        [single] => (single.to_string(), String::new()),
        _ => (String::new(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for permission in Permission::ALL {
            assert_eq!(permission.as_str().parse::<Permission>().unwrap(), permission);
        }
        assert_eq!("domain".parse::<ObjectType>().unwrap(), ObjectType::Domain);
        assert_eq!("member".parse::<Relation>().unwrap(), Relation::Member);
    }

    #[test]
    fn test_unknown_name_is_malformed() {
        assert!(matches!(
            "superuser".parse::<Relation>(),
            Err(PolicyError::MalformedPolicy(_))
        ));
    }

    #[test]
    fn test_switch_to_permission() {
        assert_eq!(switch_to_permission("administrator"), "admin");
        assert_eq!(switch_to_permission("editor"), "edit");
        assert_eq!(switch_to_permission("viewer"), "view");
        assert_eq!(switch_to_permission("member"), "membership");
        assert_eq!(switch_to_permission("publish"), "publish");
    }

    #[test]
    fn test_domain_user_id_encoding() {
        assert_eq!(encode_domain_user_id("d1", "u1"), "d1_u1");
        assert_eq!(encode_domain_user_id("", "u1"), "u1");

        assert_eq!(
            decode_domain_user_id("d1_u1"),
            ("d1".to_string(), "u1".to_string())
        );
        assert_eq!(
            decode_domain_user_id("u1"),
            ("u1".to_string(), String::new())
        );
        assert_eq!(
            decode_domain_user_id("a_b_c"),
            (String::new(), String::new())
        );
    }

    #[test]
    fn test_policy_builder() {
        let policy = Policy::new(
            ObjectType::User,
            "u1",
            Relation::Member,
            ObjectType::Platform,
            "magistrala",
        )
        .with_actions(["read"])
        .with_updated_by("admin");

        assert_eq!(policy.row_key(), ("u1".to_string(), "magistrala".to_string()));
        assert!(policy.actions.contains("read"));
        assert_eq!(policy.updated_by.as_deref(), Some("admin"));
    }
}
