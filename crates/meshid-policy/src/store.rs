//! Policy store trait and storage-backed implementation.

use crate::{
    errors::{PolicyError, Result},
    evaluator::PolicyEvaluator,
    types::*,
};
use async_trait::async_trait;
use meshid_crypto::current_timestamp;
use meshid_storage::{
    traits::deserialize_key, BatchExt, Storage, CF_POLICIES, CF_POLICIES_BY_OBJECT,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// ReBAC policy store
///
/// Adds are idempotent upserts. Deletes match exactly or by filter.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Add a single policy, merging into an existing row
    async fn add_policy(&self, policy: &Policy) -> Result<()>;

    /// Add policies atomically
    async fn add_policies(&self, policies: &[Policy]) -> Result<()>;

    /// Remove exactly this triple
    async fn delete_policy(&self, policy: &Policy) -> Result<()>;

    /// Remove these triples atomically
    async fn delete_policies(&self, policies: &[Policy]) -> Result<()>;

    /// Remove `filter.relation` for `filter.subject` across all objects
    async fn delete_policy_filter(&self, filter: &PolicyFilter) -> Result<()>;

    /// Check access, failing with [`PolicyError::Authorization`] when denied
    async fn evaluate_access(&self, request: &AccessRequest) -> Result<Grant>;

    /// Subjects holding `permission` over the object, sorted
    async fn list_all_subjects(
        &self,
        object_type: ObjectType,
        object: &str,
        permission: Permission,
    ) -> Result<Vec<String>>;

    /// Permissions `subject` holds over the object, limited to `filter`
    ///
    /// An empty filter uses the object type's default set.
    async fn list_permissions(
        &self,
        subject: &str,
        object_type: ObjectType,
        object: &str,
        filter: &[Permission],
    ) -> Result<Vec<Permission>>;

    /// Every row held by `subject`
    async fn list_policies(&self, subject: &str) -> Result<Vec<PolicyRow>>;
}

/// Resolves the declared owner of an object
#[async_trait]
pub trait OwnershipResolver: Send + Sync {
    /// Owner id of `object`, if it has one
    async fn owner_of(&self, object_type: ObjectType, object: &str) -> Result<Option<String>>;
}

/// Policy store over a key-value [`Storage`]
pub struct StoragePolicyStore<S: Storage> {
    storage: Arc<S>,
    ownership: Option<Arc<dyn OwnershipResolver>>,
    // Serializes read-modify-write of policy rows.
    write_lock: Mutex<()>,
}

enum RowChange {
    Put(PolicyRow),
    Remove,
}

impl<S: Storage> StoragePolicyStore<S> {
    /// Create a policy store without ownership fallback
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            ownership: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Enable the ownership shortcut using `resolver`
    pub fn with_ownership_resolver(mut self, resolver: Arc<dyn OwnershipResolver>) -> Self {
        self.ownership = Some(resolver);
        self
    }

    fn validate(policy: &Policy) -> Result<()> {
        if policy.subject.is_empty() {
            return Err(PolicyError::MalformedPolicy("missing subject".to_string()));
        }
        if policy.object.is_empty() {
            return Err(PolicyError::MalformedPolicy("missing object".to_string()));
        }
        Ok(())
    }

    async fn load_row(&self, subject: &str, object: &str) -> Result<Option<PolicyRow>> {
        let key = (subject.to_string(), object.to_string());
        Ok(self.storage.get(CF_POLICIES, &key).await?)
    }

    async fn owner_of(&self, object_type: ObjectType, object: &str) -> Result<Option<String>> {
        match &self.ownership {
            Some(resolver) => resolver.owner_of(object_type, object).await,
            None => Ok(None),
        }
    }

    /// Fold `policies` into their rows and stage the result
    async fn stage_adds(
        &self,
        policies: &[Policy],
    ) -> Result<BTreeMap<(String, String), RowChange>> {
        let now = current_timestamp();
        let mut rows: BTreeMap<(String, String), PolicyRow> = BTreeMap::new();

        for policy in policies {
            Self::validate(policy)?;
            let key = policy.row_key();

            if !rows.contains_key(&key) {
                let existing = self.load_row(&key.0, &key.1).await?;
                let row = match existing {
                    Some(mut row) => {
                        row.updated_at = Some(now);
                        row
                    }
                    None => PolicyRow {
                        subject_type: policy.subject_type,
                        subject: policy.subject.clone(),
                        object_type: policy.object_type,
                        object: policy.object.clone(),
                        relations: Default::default(),
                        actions: Default::default(),
                        created_at: now,
                        updated_at: None,
                        updated_by: None,
                    },
                };
                rows.insert(key.clone(), row);
            }

            if let Some(row) = rows.get_mut(&key) {
                row.object_type = policy.object_type;
                row.relations.insert(policy.relation);
                row.actions.extend(policy.actions.iter().cloned());
                if policy.updated_by.is_some() {
                    row.updated_by = policy.updated_by.clone();
                }
            }
        }

        Ok(rows
            .into_iter()
            .map(|(key, row)| (key, RowChange::Put(row)))
            .collect())
    }

    /// Strip the given relations (and actions) from rows and stage the result
    async fn stage_removals<'a, I>(
        &self,
        removals: I,
    ) -> Result<BTreeMap<(String, String), RowChange>>
    where
        I: IntoIterator<Item = (&'a str, &'a str, Relation, Option<&'a BTreeSet<String>>)>,
    {
        let now = current_timestamp();
        let mut rows: BTreeMap<(String, String), Option<PolicyRow>> = BTreeMap::new();

        for (subject, object, relation, actions) in removals {
            let key = (subject.to_string(), object.to_string());
            if !rows.contains_key(&key) {
                let existing = self.load_row(subject, object).await?;
                rows.insert(key.clone(), existing);
            }

            if let Some(Some(row)) = rows.get_mut(&key) {
                row.relations.remove(&relation);
                if let Some(actions) = actions {
                    row.actions.retain(|a| !actions.contains(a));
                }
                row.updated_at = Some(now);
            }
        }

        Ok(rows
            .into_iter()
            .filter_map(|(key, row)| {
                row.map(|row| {
                    let change = if row.relations.is_empty() {
                        RowChange::Remove
                    } else {
                        RowChange::Put(row)
                    };
                    (key, change)
                })
            })
            .collect())
    }

    async fn commit(&self, changes: BTreeMap<(String, String), RowChange>) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut batch = self.storage.batch();
        for ((subject, object), change) in &changes {
            let reverse_key = (object.clone(), subject.clone());
            match change {
                RowChange::Put(row) => {
                    batch.put(CF_POLICIES, &(subject.clone(), object.clone()), row)?;
                    batch.put(CF_POLICIES_BY_OBJECT, &reverse_key, &())?;
                }
                RowChange::Remove => {
                    batch.delete(CF_POLICIES, &(subject.clone(), object.clone()))?;
                    batch.delete(CF_POLICIES_BY_OBJECT, &reverse_key)?;
                }
            }
        }
        batch.commit().await?;

        debug!(rows = changes.len(), "Policy rows written");
        Ok(())
    }
}

#[async_trait]
impl<S: Storage + 'static> PolicyStore for StoragePolicyStore<S> {
    async fn add_policy(&self, policy: &Policy) -> Result<()> {
        self.add_policies(std::slice::from_ref(policy)).await
    }

    async fn add_policies(&self, policies: &[Policy]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let changes = self.stage_adds(policies).await?;
        self.commit(changes).await
    }

    async fn delete_policy(&self, policy: &Policy) -> Result<()> {
        self.delete_policies(std::slice::from_ref(policy)).await
    }

    async fn delete_policies(&self, policies: &[Policy]) -> Result<()> {
        for policy in policies {
            Self::validate(policy)?;
        }

        let _guard = self.write_lock.lock().await;
        let changes = self
            .stage_removals(
                policies
                    .iter()
                    .map(|p| {
                        (
                            p.subject.as_str(),
                            p.object.as_str(),
                            p.relation,
                            Some(&p.actions),
                        )
                    })
                    .collect::<Vec<_>>(),
            )
            .await?;
        self.commit(changes).await
    }

    async fn delete_policy_filter(&self, filter: &PolicyFilter) -> Result<()> {
        if filter.subject.is_empty() {
            return Err(PolicyError::MalformedPolicy("missing subject".to_string()));
        }

        let _guard = self.write_lock.lock().await;
        let rows = self.list_policies(&filter.subject).await?;
        let objects: Vec<String> = rows
            .into_iter()
            .filter(|row| row.relations.contains(&filter.relation))
            .filter(|row| filter.object_type.map_or(true, |t| row.object_type == t))
            .map(|row| row.object)
            .collect();

        debug!(
            subject = %filter.subject,
            relation = %filter.relation,
            objects = objects.len(),
            "Deleting policies by filter"
        );

        let changes = self
            .stage_removals(
                objects
                    .iter()
                    .map(|o| (filter.subject.as_str(), o.as_str(), filter.relation, None))
                    .collect::<Vec<_>>(),
            )
            .await?;
        self.commit(changes).await
    }

    async fn evaluate_access(&self, request: &AccessRequest) -> Result<Grant> {
        let row = self.load_row(&request.subject, &request.object).await?;

        let mut decision = PolicyEvaluator::evaluate(request, row.as_ref(), None);
        if decision.is_none() {
            let owner = self.owner_of(request.object_type, &request.object).await?;
            decision = PolicyEvaluator::evaluate(request, None, owner.as_deref());
        }

        match decision {
            Some(grant) => {
                debug!(
                    subject = %request.subject,
                    object = %request.object,
                    action = %request.action,
                    ?grant,
                    "Access granted"
                );
                Ok(grant)
            }
            None => Err(PolicyError::Authorization),
        }
    }

    async fn list_all_subjects(
        &self,
        object_type: ObjectType,
        object: &str,
        permission: Permission,
    ) -> Result<Vec<String>> {
        let index: Vec<(Vec<u8>, ())> = self
            .storage
            .get_by_prefix(CF_POLICIES_BY_OBJECT, &object.to_string())
            .await?;

        let mut subjects = Vec::new();
        for (raw_key, _) in index {
            let (_, subject): (String, String) = deserialize_key(&raw_key)?;
            if let Some(row) = self.load_row(&subject, object).await? {
                if row.object_type == object_type
                    && PolicyEvaluator::row_grants(&row, permission.as_str())
                {
                    subjects.push(subject);
                }
            }
        }

        subjects.sort();
        Ok(subjects)
    }

    async fn list_permissions(
        &self,
        subject: &str,
        object_type: ObjectType,
        object: &str,
        filter: &[Permission],
    ) -> Result<Vec<Permission>> {
        let filter = if filter.is_empty() {
            PolicyEvaluator::default_permission_filter(object_type)
        } else {
            filter
        };

        let owner = self.owner_of(object_type, object).await?;
        if owner.as_deref() == Some(subject) {
            return Ok(filter.to_vec());
        }

        let row = self
            .load_row(subject, object)
            .await?
            .filter(|row| row.object_type == object_type);

        Ok(match row {
            Some(row) => filter
                .iter()
                .copied()
                .filter(|p| PolicyEvaluator::row_grants(&row, p.as_str()))
                .collect(),
            None => Vec::new(),
        })
    }

    async fn list_policies(&self, subject: &str) -> Result<Vec<PolicyRow>> {
        let rows: Vec<(Vec<u8>, PolicyRow)> = self
            .storage
            .get_by_prefix(CF_POLICIES, &subject.to_string())
            .await?;
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }
}
