//! Directory records (organization, sub-tenant, user) and their storage port.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use keygate_core::{OrgId, StoreError, SubTenantId, UserId};
use keygate_license::LicenseStatus;

/// Top-level tenant. Owns zero or more sub-tenants and users, and exactly
/// one current license; `license_key`/`license_status` are the cached
/// mirror maintained by the license lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub domain: String,
    pub license_key: Option<String>,
    pub license_status: LicenseStatus,
    pub domain_verified: bool,
    pub blocked: bool,
}

impl Organization {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id: OrgId::new(),
            name: name.into(),
            domain: domain.into(),
            license_key: None,
            license_status: LicenseStatus::Active,
            domain_verified: false,
            blocked: false,
        }
    }
}

/// Isolated unit nested under an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTenant {
    pub id: SubTenantId,
    pub org_id: OrgId,
    pub name: String,
    pub settings: serde_json::Value,
    pub active: bool,
}

impl SubTenant {
    pub fn new(org_id: OrgId, name: impl Into<String>) -> Self {
        Self {
            id: SubTenantId::new(),
            org_id,
            name: name.into(),
            settings: serde_json::Value::Object(Default::default()),
            active: true,
        }
    }
}

/// A user account. Permissions come only from role assignment; the two
/// privilege flags short-circuit those checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub org_id: OrgId,
    pub sub_tenant_id: Option<SubTenantId>,
    /// Platform-wide privileged account; at most one may ever exist.
    pub super_identity: bool,
    /// Organization administrator.
    pub org_admin: bool,
}

impl User {
    pub fn new(org_id: OrgId, email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            email: email.into(),
            password_hash: password_hash.into(),
            org_id,
            sub_tenant_id: None,
            super_identity: false,
            org_admin: false,
        }
    }
}

/// Storage port for the directory.
///
/// Uniqueness is the store's problem, not the caller's: a second
/// super-identity or a duplicate organization domain must be rejected with
/// [`StoreError::Conflict`] at the store layer (conditional insert /
/// partial unique index), never via application-level check-then-act.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn create_org(&self, org: Organization) -> Result<(), StoreError>;
    async fn find_org(&self, id: OrgId) -> Result<Option<Organization>, StoreError>;

    async fn create_user(&self, user: User) -> Result<(), StoreError>;
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn create_sub_tenant(&self, tenant: SubTenant) -> Result<(), StoreError>;
    async fn find_sub_tenant(&self, id: SubTenantId) -> Result<Option<SubTenant>, StoreError>;
}

#[async_trait]
impl<S> DirectoryStore for Arc<S>
where
    S: DirectoryStore + ?Sized,
{
    async fn create_org(&self, org: Organization) -> Result<(), StoreError> {
        (**self).create_org(org).await
    }

    async fn find_org(&self, id: OrgId) -> Result<Option<Organization>, StoreError> {
        (**self).find_org(id).await
    }

    async fn create_user(&self, user: User) -> Result<(), StoreError> {
        (**self).create_user(user).await
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        (**self).find_user(id).await
    }

    async fn create_sub_tenant(&self, tenant: SubTenant) -> Result<(), StoreError> {
        (**self).create_sub_tenant(tenant).await
    }

    async fn find_sub_tenant(&self, id: SubTenantId) -> Result<Option<SubTenant>, StoreError> {
        (**self).find_sub_tenant(id).await
    }
}
