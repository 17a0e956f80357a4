//! # meshid-users
//!
//! Account subsystem for meshid.
//!
//! This crate owns user and client accounts and keeps their authorization
//! state in step with the policy store:
//! - Registration and role changes written across both stores with compensation
//! - Credential issuance, refresh, rotation and reset
//! - Account status lifecycle
//! - Member listing with per-member permission enrichment

#![warn(clippy::all)]

pub mod config;
pub mod errors;
pub mod repository;
pub mod service;
pub mod traits;
pub mod types;
pub mod validation;


pub use config::UsersConfig;
pub use errors::{Result, UsersError};
pub use repository::StorageClientRepository;
pub use service::{
    IdentityServiceImpl, PermissionResolver, PolicyChange, PolicyConsistencyCoordinator, SagaStep,
};
pub use traits::{Emailer, IdProvider, IdentityService, IdentityStore, TokenIssuer, UuidProvider};
pub use types::*;
