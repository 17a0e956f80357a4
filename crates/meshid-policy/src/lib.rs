//! # meshid-policy
//!
//! Relationship-based access control for meshid.
//!
//! Policies are `(subject, relation, object)` triples folded into one row per
//! `(subject, object)` pair. Access is granted by a matching row or, failing
//! that, by ownership of the object.

#![warn(clippy::all)]

pub mod errors;
pub mod evaluator;
pub mod store;
pub mod types;

pub use errors::{PolicyError, Result};
pub use evaluator::PolicyEvaluator;
pub use store::{OwnershipResolver, PolicyStore, StoragePolicyStore};
pub use types::*;
