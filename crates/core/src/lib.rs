//! `keygate-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult, StoreError};
pub use id::{LicenseId, OrgId, PermissionId, RoleId, SubTenantId, UserId};
