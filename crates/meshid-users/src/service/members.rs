//! Member resolution for things, groups and domains.

use crate::{errors::*, traits::*, types::*};
use futures::{stream, StreamExt, TryStreamExt};
use meshid_policy::{decode_domain_user_id, encode_domain_user_id, Permission, PolicyStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Permission used when a listing does not name one
pub const DEFAULT_MEMBER_PERMISSION: &str = "view";

/// Resolves an object's members and, on request, their permissions
pub struct PermissionResolver<R: IdentityStore, P: PolicyStore> {
    clients: Arc<R>,
    policies: Arc<P>,
    concurrency: usize,
}

impl<R: IdentityStore, P: PolicyStore> PermissionResolver<R, P> {
    pub fn new(clients: Arc<R>, policies: Arc<P>, concurrency: usize) -> Self {
        Self {
            clients,
            policies,
            concurrency: concurrency.max(1),
        }
    }

    /// Members holding `page.permission` over the object.
    ///
    /// With `page.list_perms`, each member's permissions are fetched
    /// concurrently under the subject the member's policy was written
    /// for. When an account holds the object both bare and scoped to
    /// `domain_id`, the scoped subject wins. Any failed lookup fails the
    /// whole call.
    pub async fn list_members(
        &self,
        kind: ObjectKind,
        domain_id: Option<&str>,
        object_id: &str,
        page: &Page,
    ) -> Result<MembersPage> {
        let (object_type, transform) = kind.descriptor();
        let requested = page
            .permission
            .as_deref()
            .unwrap_or(DEFAULT_MEMBER_PERMISSION);
        let permission: Permission = transform.apply(requested).parse()?;

        let subjects = self
            .policies
            .list_all_subjects(object_type, object_id, permission)
            .await?;
        let subjects = subjects_by_member(subjects, domain_id);

        if subjects.is_empty() {
            return Ok(MembersPage {
                total: 0,
                offset: page.offset,
                limit: page.limit,
                members: Vec::new(),
            });
        }

        let query = Page {
            ids: subjects.keys().cloned().collect(),
            ..page.clone()
        };
        let found = self.clients.retrieve_all(&query).await?;

        let members = if page.list_perms {
            self.attach_permissions(object_type, object_id, &subjects, found.clients)
                .await?
        } else {
            found.clients
        };

        debug!(
            object_id = %object_id,
            permission = %permission,
            members = members.len(),
            "Listed members"
        );

        Ok(MembersPage {
            total: found.total,
            offset: found.offset,
            limit: found.limit,
            members: members.into_iter().map(Client::redacted).collect(),
        })
    }

    async fn attach_permissions(
        &self,
        object_type: meshid_policy::ObjectType,
        object_id: &str,
        subjects: &BTreeMap<String, String>,
        members: Vec<Client>,
    ) -> Result<Vec<Client>> {
        let limit = self.concurrency.min(members.len()).max(1);
        let object_id = object_id.to_string();

        // `buffered` keeps order; dropping the stream on the first error
        // cancels every lookup still in flight.
        stream::iter(members.into_iter().map(|mut member| {
            let policies = Arc::clone(&self.policies);
            let object_id = object_id.clone();
            let subject = subjects
                .get(&member.id)
                .cloned()
                .unwrap_or_else(|| member.id.clone());
            async move {
                member.permissions = policies
                    .list_permissions(&subject, object_type, &object_id, &[])
                    .await?;
                Ok::<_, UsersError>(member)
            }
        }))
        .buffered(limit)
        .try_collect()
        .await
    }
}

/// Map each member's account id to the policy subject it was found under
fn subjects_by_member(subjects: Vec<String>, domain_id: Option<&str>) -> BTreeMap<String, String> {
    let mut members = BTreeMap::new();
    for subject in subjects {
        let id = member_id(&subject);
        if id.is_empty() {
            continue;
        }
        let scoped = domain_id
            .filter(|d| !d.is_empty())
            .map(|d| encode_domain_user_id(d, &id));
        if scoped.as_deref() == Some(subject.as_str()) {
            members.insert(id, subject);
        } else {
            members.entry(id).or_insert(subject);
        }
    }
    members
}

/// Account id from a policy subject, which may be domain scoped
fn member_id(subject: &str) -> String {
    match decode_domain_user_id(subject) {
        (domain, user) if user.is_empty() => domain,
        (_, user) => user,
    }
}
