//! In-memory implementation of every storage port.
//!
//! Intended for tests/dev. Not optimized for performance. One struct backs
//! all three ports so the license mirror and the organization row live in
//! the same place, the way one relational schema would.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use keygate_auth::directory::{DirectoryStore, Organization, SubTenant, User};
use keygate_auth::permissions::{Permission, standard_catalog};
use keygate_auth::resolver::RbacStore;
use keygate_auth::roles::Role;
use keygate_core::{
    LicenseId, OrgId, PermissionId, RoleId, StoreError, SubTenantId, UserId,
};
use keygate_license::{License, LicenseStatus, LicenseStore};

#[derive(Default)]
struct Tables {
    orgs: HashMap<OrgId, Organization>,
    sub_tenants: HashMap<SubTenantId, SubTenant>,
    users: HashMap<UserId, User>,
    licenses: HashMap<LicenseId, License>,
    roles: HashMap<RoleId, Role>,
    permissions: Vec<Permission>,
    role_permissions: Vec<(RoleId, PermissionId)>,
    user_roles: Vec<(UserId, RoleId)>,
}

/// In-memory store backing all ports.
#[derive(Default)]
pub struct InMemoryStores {
    tables: RwLock<Tables>,
}

impl InMemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh store pre-loaded with the standard permission catalog.
    pub fn with_standard_catalog() -> Self {
        let store = Self::new();
        store.write().permissions = standard_catalog();
        store
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LicenseStore for InMemoryStores {
    async fn insert(&self, license: License) -> Result<(), StoreError> {
        let mut t = self.write();
        if t.licenses.values().any(|l| l.key == license.key) {
            return Err(StoreError::Conflict("duplicate license key".to_string()));
        }
        t.licenses.insert(license.id, license);
        Ok(())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<License>, StoreError> {
        Ok(self.read().licenses.values().find(|l| l.key == key).cloned())
    }

    async fn find_by_id(&self, id: LicenseId) -> Result<Option<License>, StoreError> {
        Ok(self.read().licenses.get(&id).cloned())
    }

    async fn org_exists(&self, org_id: OrgId) -> Result<bool, StoreError> {
        Ok(self.read().orgs.contains_key(&org_id))
    }

    async fn update_status(
        &self,
        id: LicenseId,
        status: LicenseStatus,
        revoked_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut t = self.write();
        let Some(row) = t.licenses.get_mut(&id) else {
            return Err(StoreError::Unavailable(format!("license {id} vanished")));
        };
        row.status = status;
        row.revoked_at = revoked_at.or(row.revoked_at);
        Ok(())
    }

    async fn mirror_to_org(
        &self,
        org_id: OrgId,
        key: Option<&str>,
        status: LicenseStatus,
    ) -> Result<(), StoreError> {
        let mut t = self.write();
        // Mirror is best-effort bookkeeping; a missing org row (license
        // issued before the org insert lands) is not an error.
        if let Some(org) = t.orgs.get_mut(&org_id) {
            org.license_key = key.map(str::to_string);
            org.license_status = status;
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for InMemoryStores {
    async fn create_org(&self, org: Organization) -> Result<(), StoreError> {
        let mut t = self.write();
        if t.orgs.values().any(|o| o.domain == org.domain) {
            return Err(StoreError::Conflict(format!(
                "domain '{}' already registered",
                org.domain
            )));
        }
        t.orgs.insert(org.id, org);
        Ok(())
    }

    async fn find_org(&self, id: OrgId) -> Result<Option<Organization>, StoreError> {
        Ok(self.read().orgs.get(&id).cloned())
    }

    async fn create_user(&self, user: User) -> Result<(), StoreError> {
        let mut t = self.write();
        // The uniqueness decision happens under the same lock as the insert,
        // mirroring the partial unique index the Postgres schema uses.
        if user.super_identity && t.users.values().any(|u| u.super_identity) {
            return Err(StoreError::Conflict(
                "a platform super-identity already exists".to_string(),
            ));
        }
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email '{}' already registered",
                user.email
            )));
        }
        t.users.insert(user.id, user);
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn create_sub_tenant(&self, tenant: SubTenant) -> Result<(), StoreError> {
        self.write().sub_tenants.insert(tenant.id, tenant);
        Ok(())
    }

    async fn find_sub_tenant(&self, id: SubTenantId) -> Result<Option<SubTenant>, StoreError> {
        Ok(self.read().sub_tenants.get(&id).cloned())
    }
}

#[async_trait]
impl RbacStore for InMemoryStores {
    async fn all_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        Ok(self.read().permissions.clone())
    }

    async fn create_role(
        &self,
        role: Role,
        permission_ids: &[PermissionId],
    ) -> Result<(), StoreError> {
        let mut t = self.write();
        if t.roles
            .values()
            .any(|r| r.org_id == role.org_id && r.name == role.name)
        {
            return Err(StoreError::Conflict(format!(
                "role '{}' already exists in this organization",
                role.name
            )));
        }
        for pid in permission_ids {
            t.role_permissions.push((role.id, *pid));
        }
        t.roles.insert(role.id, role);
        Ok(())
    }

    async fn find_role(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        Ok(self.read().roles.get(&id).cloned())
    }

    async fn find_role_by_name(
        &self,
        org_id: OrgId,
        name: &str,
    ) -> Result<Option<Role>, StoreError> {
        Ok(self
            .read()
            .roles
            .values()
            .find(|r| r.org_id == org_id && r.name == name)
            .cloned())
    }

    async fn roles_for_user(&self, user_id: UserId) -> Result<Vec<Role>, StoreError> {
        let t = self.read();
        Ok(t.user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, r)| t.roles.get(r).cloned())
            .collect())
    }

    async fn permissions_for_role(&self, role_id: RoleId) -> Result<Vec<Permission>, StoreError> {
        let t = self.read();
        Ok(t.role_permissions
            .iter()
            .filter(|(r, _)| *r == role_id)
            .filter_map(|(_, p)| t.permissions.iter().find(|perm| perm.id == *p).cloned())
            .collect())
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        let mut t = self.write();
        if t.user_roles.contains(&(user_id, role_id)) {
            return Err(StoreError::Conflict(
                "role already assigned to user".to_string(),
            ));
        }
        t.user_roles.push((user_id, role_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn at_most_one_super_identity_system_wide() {
        let store = InMemoryStores::new();

        let mut first = User::new(OrgId::new(), "root@platform", "hash");
        first.super_identity = true;
        store.create_user(first).await.unwrap();

        let mut second = User::new(OrgId::new(), "other@platform", "hash");
        second.super_identity = true;
        let err = store.create_user(second).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Ordinary users are unaffected.
        store
            .create_user(User::new(OrgId::new(), "user@acme", "hash"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn duplicate_domain_is_a_conflict() {
        let store = InMemoryStores::new();
        store
            .create_org(Organization::new("Acme", "acme.example"))
            .await
            .unwrap();

        let err = store
            .create_org(Organization::new("Acme Two", "acme.example"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn duplicate_role_name_per_org_is_a_conflict() {
        let store = InMemoryStores::with_standard_catalog();
        let org = OrgId::new();

        store
            .create_role(Role::new(org, "Operators", None), &[])
            .await
            .unwrap();
        let err = store
            .create_role(Role::new(org, "Operators", None), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // The same name in another org is fine.
        store
            .create_role(Role::new(OrgId::new(), "Operators", None), &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn mirror_updates_the_org_row() {
        let store = InMemoryStores::new();
        let org = Organization::new("Acme", "acme.example");
        let org_id = org.id;
        store.create_org(org).await.unwrap();

        store
            .mirror_to_org(org_id, Some("opaque-key"), LicenseStatus::Suspended)
            .await
            .unwrap();

        let org = store.find_org(org_id).await.unwrap().unwrap();
        assert_eq!(org.license_key.as_deref(), Some("opaque-key"));
        assert_eq!(org.license_status, LicenseStatus::Suspended);
    }
}
