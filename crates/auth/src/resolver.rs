//! Permission resolver (RBAC engine).
//!
//! Effective permissions are the de-duplicated union of everything granted
//! through assigned roles. Union over a set is commutative, so the order in
//! which roles are evaluated can never change the result.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use keygate_core::{OrgId, PermissionId, RoleId, StoreError, UserId};

use crate::directory::DirectoryStore;
use crate::permissions::{Permission, PermissionName};
use crate::roles::Role;

/// Names of the roles seeded for every new organization.
pub const DEFAULT_ROLE_NAMES: [&str; 3] = ["Administrator", "Manager", "Viewer"];

/// Actions granted to the Manager role on top of its fixed allow-list.
const MANAGER_ACTIONS: [&str; 2] = ["read", "create"];

/// Fixed allow-list granted to Manager regardless of action.
const MANAGER_ALLOW_LIST: [&str; 2] = ["api.use", "user.read"];

/// Storage port for roles, permissions, and their joins.
#[async_trait]
pub trait RbacStore: Send + Sync {
    /// The full global permission catalog.
    async fn all_permissions(&self) -> Result<Vec<Permission>, StoreError>;

    /// Create a role and grant it the given permissions in one step.
    async fn create_role(
        &self,
        role: Role,
        permission_ids: &[PermissionId],
    ) -> Result<(), StoreError>;

    /// Role lookup by id.
    async fn find_role(&self, id: RoleId) -> Result<Option<Role>, StoreError>;

    /// Role lookup by org-scoped unique name.
    async fn find_role_by_name(
        &self,
        org_id: OrgId,
        name: &str,
    ) -> Result<Option<Role>, StoreError>;

    /// All roles assigned to a user.
    async fn roles_for_user(&self, user_id: UserId) -> Result<Vec<Role>, StoreError>;

    /// All permissions granted to a role.
    async fn permissions_for_role(&self, role_id: RoleId) -> Result<Vec<Permission>, StoreError>;

    /// Assign a role to a user. A duplicate assignment is a
    /// [`StoreError::Conflict`], not a silent no-op.
    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> RbacStore for Arc<S>
where
    S: RbacStore + ?Sized,
{
    async fn all_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        (**self).all_permissions().await
    }

    async fn create_role(
        &self,
        role: Role,
        permission_ids: &[PermissionId],
    ) -> Result<(), StoreError> {
        (**self).create_role(role, permission_ids).await
    }

    async fn find_role(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        (**self).find_role(id).await
    }

    async fn find_role_by_name(
        &self,
        org_id: OrgId,
        name: &str,
    ) -> Result<Option<Role>, StoreError> {
        (**self).find_role_by_name(org_id, name).await
    }

    async fn roles_for_user(&self, user_id: UserId) -> Result<Vec<Role>, StoreError> {
        (**self).roles_for_user(user_id).await
    }

    async fn permissions_for_role(&self, role_id: RoleId) -> Result<Vec<Permission>, StoreError> {
        (**self).permissions_for_role(role_id).await
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        (**self).assign_role(user_id, role_id).await
    }
}

/// A user's resolved authorization state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPermissions {
    pub roles: Vec<Role>,
    pub permissions: HashSet<PermissionName>,
}

impl ResolvedPermissions {
    pub fn contains(&self, name: &PermissionName) -> bool {
        self.permissions.contains(name)
    }
}

/// Computes effective permissions and seeds per-organization defaults.
pub struct PermissionResolver<R, D> {
    rbac: R,
    directory: D,
}

impl<R, D> PermissionResolver<R, D>
where
    R: RbacStore,
    D: DirectoryStore,
{
    pub fn new(rbac: R, directory: D) -> Self {
        Self { rbac, directory }
    }

    /// Union of all permissions granted to the user through assigned roles.
    pub async fn resolve_for_user(
        &self,
        user_id: UserId,
    ) -> Result<ResolvedPermissions, StoreError> {
        let roles = self.rbac.roles_for_user(user_id).await?;

        let mut permissions = HashSet::new();
        for role in &roles {
            for permission in self.rbac.permissions_for_role(role.id).await? {
                permissions.insert(permission.name);
            }
        }

        Ok(ResolvedPermissions { roles, permissions })
    }

    /// Exact-name permission check. The super-identity bypasses the lookup
    /// entirely; an unknown user holds nothing.
    pub async fn user_has_permission(
        &self,
        user_id: UserId,
        name: &PermissionName,
    ) -> Result<bool, StoreError> {
        if let Some(user) = self.directory.find_user(user_id).await?
            && user.super_identity
        {
            return Ok(true);
        }

        Ok(self.resolve_for_user(user_id).await?.contains(name))
    }

    /// Seed the three default roles for a new organization.
    ///
    /// Idempotent: a role whose name already exists for the organization is
    /// skipped, so re-invocation is a no-op. Returns the roles created by
    /// this call.
    pub async fn create_default_roles(&self, org_id: OrgId) -> Result<Vec<Role>, StoreError> {
        let catalog = self.rbac.all_permissions().await?;
        let mut created = Vec::new();

        for name in DEFAULT_ROLE_NAMES {
            if self.rbac.find_role_by_name(org_id, name).await?.is_some() {
                tracing::debug!(%org_id, role = name, "default role already present, skipping");
                continue;
            }

            let grants: Vec<PermissionId> = catalog
                .iter()
                .filter(|p| default_role_grants(name, &p.name))
                .map(|p| p.id)
                .collect();

            let role = Role::new(org_id, name, Some(default_role_description(name)));
            self.rbac.create_role(role.clone(), &grants).await?;
            tracing::info!(%org_id, role = name, grants = grants.len(), "seeded default role");
            created.push(role);
        }

        Ok(created)
    }

    /// Assign a role to a user; duplicates surface as `Conflict`.
    pub async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        self.rbac.assign_role(user_id, role_id).await
    }
}

fn default_role_grants(role_name: &str, permission: &PermissionName) -> bool {
    match role_name {
        "Administrator" => true,
        "Manager" => {
            MANAGER_ALLOW_LIST.contains(&permission.as_str())
                || permission
                    .action()
                    .is_some_and(|a| MANAGER_ACTIONS.contains(&a))
        }
        "Viewer" => {
            permission.as_str() == "api.use" || permission.action() == Some("read")
        }
        _ => false,
    }
}

fn default_role_description(name: &str) -> String {
    match name {
        "Administrator" => "Full access to every permission in the catalog".to_string(),
        "Manager" => "Read and create access plus API usage".to_string(),
        "Viewer" => "Read-only access plus API usage".to_string(),
        other => format!("{other} role"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{Organization, SubTenant, User};
    use keygate_core::SubTenantId;
    use std::collections::HashMap;
    use std::sync::RwLock;

    #[derive(Default)]
    struct FakeRbac {
        permissions: RwLock<Vec<Permission>>,
        roles: RwLock<Vec<Role>>,
        role_grants: RwLock<HashMap<RoleId, Vec<PermissionId>>>,
        assignments: RwLock<Vec<(UserId, RoleId)>>,
    }

    #[async_trait]
    impl RbacStore for FakeRbac {
        async fn all_permissions(&self) -> Result<Vec<Permission>, StoreError> {
            Ok(self.permissions.read().unwrap().clone())
        }

        async fn create_role(
            &self,
            role: Role,
            permission_ids: &[PermissionId],
        ) -> Result<(), StoreError> {
            self.role_grants
                .write()
                .unwrap()
                .insert(role.id, permission_ids.to_vec());
            self.roles.write().unwrap().push(role);
            Ok(())
        }

        async fn find_role(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
            Ok(self.roles.read().unwrap().iter().find(|r| r.id == id).cloned())
        }

        async fn find_role_by_name(
            &self,
            org_id: OrgId,
            name: &str,
        ) -> Result<Option<Role>, StoreError> {
            Ok(self
                .roles
                .read()
                .unwrap()
                .iter()
                .find(|r| r.org_id == org_id && r.name == name)
                .cloned())
        }

        async fn roles_for_user(&self, user_id: UserId) -> Result<Vec<Role>, StoreError> {
            let assignments = self.assignments.read().unwrap();
            let roles = self.roles.read().unwrap();
            Ok(assignments
                .iter()
                .filter(|(u, _)| *u == user_id)
                .filter_map(|(_, r)| roles.iter().find(|role| role.id == *r).cloned())
                .collect())
        }

        async fn permissions_for_role(
            &self,
            role_id: RoleId,
        ) -> Result<Vec<Permission>, StoreError> {
            let grants = self.role_grants.read().unwrap();
            let permissions = self.permissions.read().unwrap();
            Ok(grants
                .get(&role_id)
                .map(|ids| {
                    permissions
                        .iter()
                        .filter(|p| ids.contains(&p.id))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
            let mut assignments = self.assignments.write().unwrap();
            if assignments.contains(&(user_id, role_id)) {
                return Err(StoreError::Conflict("role already assigned".to_string()));
            }
            assignments.push((user_id, role_id));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDirectory {
        users: RwLock<HashMap<UserId, User>>,
    }

    #[async_trait]
    impl DirectoryStore for FakeDirectory {
        async fn create_org(&self, _org: Organization) -> Result<(), StoreError> {
            Ok(())
        }

        async fn find_org(&self, _id: OrgId) -> Result<Option<Organization>, StoreError> {
            Ok(None)
        }

        async fn create_user(&self, user: User) -> Result<(), StoreError> {
            self.users.write().unwrap().insert(user.id, user);
            Ok(())
        }

        async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
            Ok(self.users.read().unwrap().get(&id).cloned())
        }

        async fn create_sub_tenant(&self, _tenant: SubTenant) -> Result<(), StoreError> {
            Ok(())
        }

        async fn find_sub_tenant(
            &self,
            _id: SubTenantId,
        ) -> Result<Option<SubTenant>, StoreError> {
            Ok(None)
        }
    }

    fn catalog() -> Vec<Permission> {
        [
            "api.use",
            "user.read",
            "user.create",
            "user.delete",
            "tenant.read",
            "tenant.create",
            "license.read",
            "license.revoke",
        ]
        .into_iter()
        .map(|name| Permission::new(name, None))
        .collect()
    }

    fn resolver() -> PermissionResolver<FakeRbac, FakeDirectory> {
        let rbac = FakeRbac::default();
        *rbac.permissions.write().unwrap() = catalog();
        PermissionResolver::new(rbac, FakeDirectory::default())
    }

    #[tokio::test]
    async fn union_is_commutative_across_assignment_order() {
        let r = resolver();
        let org = OrgId::new();
        let roles = r.create_default_roles(org).await.unwrap();
        let (a, b) = (roles[1].id, roles[2].id);

        let forward = UserId::new();
        r.assign_role(forward, a).await.unwrap();
        r.assign_role(forward, b).await.unwrap();

        let backward = UserId::new();
        r.assign_role(backward, b).await.unwrap();
        r.assign_role(backward, a).await.unwrap();

        let lhs = r.resolve_for_user(forward).await.unwrap();
        let rhs = r.resolve_for_user(backward).await.unwrap();
        assert_eq!(lhs.permissions, rhs.permissions);
    }

    #[tokio::test]
    async fn administrator_role_grants_full_catalog() {
        let r = resolver();
        let org = OrgId::new();
        let roles = r.create_default_roles(org).await.unwrap();
        let admin_role = roles.iter().find(|r| r.name == "Administrator").unwrap();

        let user = UserId::new();
        r.assign_role(user, admin_role.id).await.unwrap();

        let resolved = r.resolve_for_user(user).await.unwrap();
        let full: HashSet<PermissionName> =
            catalog().into_iter().map(|p| p.name).collect();
        assert_eq!(resolved.permissions, full);
    }

    #[tokio::test]
    async fn viewer_role_grants_only_reads_and_api_use() {
        let r = resolver();
        let roles = r.create_default_roles(OrgId::new()).await.unwrap();
        let viewer = roles.iter().find(|r| r.name == "Viewer").unwrap();

        let user = UserId::new();
        r.assign_role(user, viewer.id).await.unwrap();

        let resolved = r.resolve_for_user(user).await.unwrap();
        for p in &resolved.permissions {
            assert!(
                p.as_str() == "api.use" || p.action() == Some("read"),
                "viewer unexpectedly holds {p}"
            );
        }
        assert!(resolved.contains(&PermissionName::new("license.read")));
        assert!(!resolved.contains(&PermissionName::new("user.delete")));
    }

    #[tokio::test]
    async fn default_role_bootstrap_is_idempotent() {
        let r = resolver();
        let org = OrgId::new();

        let first = r.create_default_roles(org).await.unwrap();
        assert_eq!(first.len(), 3);

        let second = r.create_default_roles(org).await.unwrap();
        assert!(second.is_empty());

        let roles: Vec<_> = r
            .rbac
            .roles
            .read()
            .unwrap()
            .iter()
            .filter(|role| role.org_id == org)
            .cloned()
            .collect();
        assert_eq!(roles.len(), 3);
    }

    #[tokio::test]
    async fn super_identity_bypasses_even_nonexistent_permissions() {
        let r = resolver();
        let mut user = User::new(OrgId::new(), "root@platform", "hash");
        user.super_identity = true;
        let id = user.id;
        r.directory.create_user(user).await.unwrap();

        let granted = r
            .user_has_permission(id, &PermissionName::new("does.not_exist"))
            .await
            .unwrap();
        assert!(granted);
    }

    #[tokio::test]
    async fn ordinary_user_needs_the_exact_permission() {
        let r = resolver();
        let org = OrgId::new();
        let user = User::new(org, "user@acme", "hash");
        let id = user.id;
        r.directory.create_user(user).await.unwrap();

        let roles = r.create_default_roles(org).await.unwrap();
        let viewer = roles.iter().find(|r| r.name == "Viewer").unwrap();
        r.assign_role(id, viewer.id).await.unwrap();

        assert!(
            r.user_has_permission(id, &PermissionName::new("user.read"))
                .await
                .unwrap()
        );
        assert!(
            !r.user_has_permission(id, &PermissionName::new("user.delete"))
                .await
                .unwrap()
        );
        // No wildcard matching: "user" does not cover "user.read".
        assert!(
            !r.user_has_permission(id, &PermissionName::new("user"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn duplicate_assignment_is_a_conflict() {
        let r = resolver();
        let roles = r.create_default_roles(OrgId::new()).await.unwrap();
        let user = UserId::new();

        r.assign_role(user, roles[0].id).await.unwrap();
        let err = r.assign_role(user, roles[0].id).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
