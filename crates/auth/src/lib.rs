//! `keygate-auth` — identity, tokens, and RBAC.
//!
//! This crate is intentionally decoupled from HTTP and storage: it holds the
//! claims model and HS256 token codec, the directory records
//! (organization / sub-tenant / user) with their storage ports, and the
//! permission resolver that computes a user's effective permission set.

pub mod claims;
pub mod directory;
pub mod permissions;
pub mod resolver;
pub mod roles;
pub mod token;

pub use claims::{AccessClaims, TokenValidationError, validate_claims};
pub use directory::{DirectoryStore, Organization, SubTenant, User};
pub use permissions::{Permission, PermissionName};
pub use resolver::{DEFAULT_ROLE_NAMES, PermissionResolver, RbacStore, ResolvedPermissions};
pub use roles::Role;
pub use token::Hs256TokenCodec;
