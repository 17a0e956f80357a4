//! Policy evaluator logic.

use crate::types::*;

/// Pure evaluation over policy rows
pub struct PolicyEvaluator;

impl PolicyEvaluator {
    /// Permissions implied by holding `relation` directly
    pub fn implied_permissions(relation: Relation) -> &'static [Permission] {
        use Permission::*;
        match relation {
            Relation::Administrator | Relation::Owner => &Permission::ALL,
            Relation::Editor => &[Edit, View, Membership, Share, Publish, Subscribe],
            Relation::Viewer => &[View, Membership, Subscribe],
            Relation::Member => &[Membership],
        }
    }

    /// Permissions reported by `list_permissions` when no filter is given
    pub fn default_permission_filter(object_type: ObjectType) -> &'static [Permission] {
        use Permission::*;
        match object_type {
            ObjectType::Thing => &[Admin, Delete, Edit, View, Share, Publish, Subscribe],
            ObjectType::Group => &[Admin, Delete, Edit, View, Share, Membership],
            ObjectType::Domain => &[Admin, Edit, View, Share, Membership],
            ObjectType::Platform => &[Admin, Membership],
            ObjectType::User => &[Admin, Delete, Edit, View],
        }
    }

    /// Whether a row grants `action`
    ///
    /// Matches an explicit action, a relation named `action`, or a relation
    /// implying the permission named `action`.
    pub fn row_grants(row: &PolicyRow, action: &str) -> bool {
        if row.actions.contains(action) {
            return true;
        }

        let permission = action.parse::<Permission>().ok();
        row.relations.iter().any(|relation| {
            relation.as_str() == action
                || permission
                    .map(|p| Self::implied_permissions(*relation).contains(&p))
                    .unwrap_or(false)
        })
    }

    /// Decide an access request
    ///
    /// Evaluation order:
    /// 1. A policy row for `(subject, object)` granting the action
    /// 2. Ownership of the object by the subject
    ///
    /// Returns `None` when neither applies.
    pub fn evaluate(
        request: &AccessRequest,
        row: Option<&PolicyRow>,
        owner: Option<&str>,
    ) -> Option<Grant> {
        // 1. Explicit policy
        if let Some(row) = row {
            if row.object_type == request.object_type && Self::row_grants(row, &request.action) {
                return Some(Grant::Policy);
            }
        }

        // 2. Ownership shortcut
        if owner == Some(request.subject.as_str()) {
            return Some(Grant::Ownership);
        }

        None
    }
}
