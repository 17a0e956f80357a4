//! Two-store writes with compensation.
//!
//! Every saga writes the policy store first and the account row second, so
//! compensation only ever undoes policy state that is known to be committed.

use crate::{errors::*, types::Role};
use meshid_policy::{ObjectType, Policy, PolicyFilter, PolicyStore, Relation};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, warn};

/// A policy store mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyChange {
    /// Upsert these policies
    Add(Vec<Policy>),
    /// Remove exactly these policies
    Remove(Vec<Policy>),
    /// Remove a relation from every object of the filter's subject
    RemoveRelation(PolicyFilter),
}

/// Forward policy change paired with the change that undoes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaStep {
    pub forward: PolicyChange,
    pub compensation: PolicyChange,
}

impl SagaStep {
    /// Bootstrap policies for a new account: `member` of the platform, and
    /// `administrator` too for admins
    pub fn registration(platform: &str, client_id: &str, role: Role) -> Self {
        let mut policies = vec![platform_policy(platform, client_id, Relation::Member)];
        if role == Role::Admin {
            policies.push(platform_policy(platform, client_id, Relation::Administrator));
        }

        Self {
            forward: PolicyChange::Add(policies.clone()),
            compensation: PolicyChange::Remove(policies),
        }
    }

    /// Move the platform `administrator` relation from `prior` to `next`
    pub fn role_change(platform: &str, client_id: &str, prior: Role, next: Role) -> Self {
        Self {
            forward: role_policy_change(platform, client_id, next),
            compensation: role_policy_change(platform, client_id, prior),
        }
    }
}

/// Policy change that makes the platform relations match `role`
pub fn role_policy_change(platform: &str, client_id: &str, role: Role) -> PolicyChange {
    match role {
        Role::Admin => PolicyChange::Add(vec![platform_policy(
            platform,
            client_id,
            Relation::Administrator,
        )]),
        Role::User => PolicyChange::RemoveRelation(PolicyFilter {
            subject: client_id.to_string(),
            relation: Relation::Administrator,
            object_type: Some(ObjectType::Platform),
        }),
    }
}

fn platform_policy(platform: &str, client_id: &str, relation: Relation) -> Policy {
    Policy::new(
        ObjectType::User,
        client_id,
        relation,
        ObjectType::Platform,
        platform,
    )
}

/// Sequences policy store writes ahead of account store writes
pub struct PolicyConsistencyCoordinator<P: PolicyStore> {
    policies: Arc<P>,
}

impl<P: PolicyStore> PolicyConsistencyCoordinator<P> {
    pub fn new(policies: Arc<P>) -> Self {
        Self { policies }
    }

    /// Apply one policy change
    pub async fn apply(&self, change: &PolicyChange) -> Result<()> {
        match change {
            PolicyChange::Add(policies) if policies.is_empty() => Ok(()),
            PolicyChange::Remove(policies) if policies.is_empty() => Ok(()),
            PolicyChange::Add(policies) => Ok(self.policies.add_policies(policies).await?),
            PolicyChange::Remove(policies) => Ok(self.policies.delete_policies(policies).await?),
            PolicyChange::RemoveRelation(filter) => {
                Ok(self.policies.delete_policy_filter(filter).await?)
            }
        }
    }

    /// Run `step.forward`, then `commit`.
    ///
    /// If `commit` fails, `step.compensation` is applied and the commit error
    /// is returned. If compensation fails as well, the result is
    /// [`UsersError::RollbackFailed`] carrying both errors.
    pub async fn run<T, F>(&self, step: &SagaStep, commit: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
        T: Send,
    {
        self.apply(&step.forward).await?;

        let err = match commit.await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match self.apply(&step.compensation).await {
            Ok(()) => {
                warn!(error = %err, "Account write failed, policy changes rolled back");
                Err(err)
            }
            Err(rollback) => {
                error!(
                    error = %err,
                    rollback_error = %rollback,
                    forward = ?step.forward,
                    "Policy rollback failed, stores are inconsistent"
                );
                Err(UsersError::RollbackFailed {
                    cause: Box::new(err),
                    rollback: Box::new(rollback),
                })
            }
        }
    }
}
