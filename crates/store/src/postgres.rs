//! Postgres-backed implementations of the storage ports.
//!
//! Uniqueness is enforced by the schema (`migrations/0001_init.sql`), not by
//! application-level check-then-act: a second super-identity, a duplicate
//! domain, or a duplicate role assignment fails the insert with a unique
//! violation, which maps to [`StoreError::Conflict`].
//!
//! ## Error mapping
//!
//! | PostgreSQL error code | StoreError    | Scenario                                  |
//! |-----------------------|---------------|-------------------------------------------|
//! | `23505`               | `Conflict`    | Unique violation (domain, key, joins)     |
//! | any other             | `Unavailable` | Connectivity or unexpected database error |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use keygate_auth::directory::{DirectoryStore, Organization, SubTenant, User};
use keygate_auth::permissions::{Permission, PermissionName};
use keygate_auth::resolver::RbacStore;
use keygate_auth::roles::Role;
use keygate_core::{
    LicenseId, OrgId, PermissionId, RoleId, StoreError, SubTenantId, UserId,
};
use keygate_license::{FeatureSet, License, LicenseStatus, LicenseStore};

/// Postgres-backed store implementing all ports over one connection pool.
#[derive(Clone)]
pub struct PostgresStores {
    pool: Arc<PgPool>,
}

impl PostgresStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn map_err(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error()
        && db.code().as_deref() == Some("23505")
    {
        return StoreError::Conflict(db.message().to_string());
    }
    StoreError::Unavailable(e.to_string())
}

fn status_to_str(status: LicenseStatus) -> &'static str {
    match status {
        LicenseStatus::Active => "active",
        LicenseStatus::Expired => "expired",
        LicenseStatus::Suspended => "suspended",
        LicenseStatus::Revoked => "revoked",
    }
}

fn status_from_str(s: &str) -> Result<LicenseStatus, StoreError> {
    match s {
        "active" => Ok(LicenseStatus::Active),
        "expired" => Ok(LicenseStatus::Expired),
        "suspended" => Ok(LicenseStatus::Suspended),
        "revoked" => Ok(LicenseStatus::Revoked),
        other => Err(StoreError::Unavailable(format!(
            "unknown license status '{other}' in store"
        ))),
    }
}

fn license_from_row(row: &PgRow) -> Result<License, StoreError> {
    let features: serde_json::Value = row.try_get("features").map_err(map_err)?;
    let features: FeatureSet = serde_json::from_value(features)
        .map_err(|e| StoreError::Unavailable(format!("corrupt feature set: {e}")))?;
    let status: String = row.try_get("status").map_err(map_err)?;

    Ok(License {
        id: LicenseId::from_uuid(row.try_get("id").map_err(map_err)?),
        org_id: OrgId::from_uuid(row.try_get("org_id").map_err(map_err)?),
        key: row.try_get("key").map_err(map_err)?,
        status: status_from_str(&status)?,
        features,
        issued_at: row.try_get("issued_at").map_err(map_err)?,
        expires_at: row.try_get("expires_at").map_err(map_err)?,
        revoked_at: row.try_get("revoked_at").map_err(map_err)?,
        signature: row.try_get("signature").map_err(map_err)?,
    })
}

fn org_from_row(row: &PgRow) -> Result<Organization, StoreError> {
    let status: String = row.try_get("license_status").map_err(map_err)?;
    Ok(Organization {
        id: OrgId::from_uuid(row.try_get("id").map_err(map_err)?),
        name: row.try_get("name").map_err(map_err)?,
        domain: row.try_get("domain").map_err(map_err)?,
        license_key: row.try_get("license_key").map_err(map_err)?,
        license_status: status_from_str(&status)?,
        domain_verified: row.try_get("domain_verified").map_err(map_err)?,
        blocked: row.try_get("blocked").map_err(map_err)?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let sub_tenant: Option<Uuid> = row.try_get("sub_tenant_id").map_err(map_err)?;
    Ok(User {
        id: UserId::from_uuid(row.try_get("id").map_err(map_err)?),
        email: row.try_get("email").map_err(map_err)?,
        password_hash: row.try_get("password_hash").map_err(map_err)?,
        org_id: OrgId::from_uuid(row.try_get("org_id").map_err(map_err)?),
        sub_tenant_id: sub_tenant.map(SubTenantId::from_uuid),
        super_identity: row.try_get("super_identity").map_err(map_err)?,
        org_admin: row.try_get("org_admin").map_err(map_err)?,
    })
}

fn role_from_row(row: &PgRow) -> Result<Role, StoreError> {
    Ok(Role {
        id: RoleId::from_uuid(row.try_get("id").map_err(map_err)?),
        org_id: OrgId::from_uuid(row.try_get("org_id").map_err(map_err)?),
        name: row.try_get("name").map_err(map_err)?,
        description: row.try_get("description").map_err(map_err)?,
    })
}

fn permission_from_row(row: &PgRow) -> Result<Permission, StoreError> {
    let name: String = row.try_get("name").map_err(map_err)?;
    Ok(Permission {
        id: PermissionId::from_uuid(row.try_get("id").map_err(map_err)?),
        name: PermissionName::new(name),
        description: row.try_get("description").map_err(map_err)?,
    })
}

#[async_trait]
impl LicenseStore for PostgresStores {
    async fn insert(&self, license: License) -> Result<(), StoreError> {
        let features = serde_json::to_value(&license.features)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        sqlx::query(
            "INSERT INTO licenses \
             (id, org_id, key, status, features, issued_at, expires_at, revoked_at, signature) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(license.id.as_uuid())
        .bind(license.org_id.as_uuid())
        .bind(&license.key)
        .bind(status_to_str(license.status))
        .bind(features)
        .bind(license.issued_at)
        .bind(license.expires_at)
        .bind(license.revoked_at)
        .bind(&license.signature)
        .execute(&*self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<License>, StoreError> {
        sqlx::query("SELECT * FROM licenses WHERE key = $1")
            .bind(key)
            .fetch_optional(&*self.pool)
            .await
            .map_err(map_err)?
            .map(|row| license_from_row(&row))
            .transpose()
    }

    async fn find_by_id(&self, id: LicenseId) -> Result<Option<License>, StoreError> {
        sqlx::query("SELECT * FROM licenses WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(map_err)?
            .map(|row| license_from_row(&row))
            .transpose()
    }

    async fn org_exists(&self, org_id: OrgId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM organizations WHERE id = $1")
            .bind(org_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(map_err)?;
        Ok(row.is_some())
    }

    async fn update_status(
        &self,
        id: LicenseId,
        status: LicenseStatus,
        revoked_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE licenses SET status = $2, revoked_at = COALESCE($3, revoked_at) \
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(status_to_str(status))
        .bind(revoked_at)
        .execute(&*self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn mirror_to_org(
        &self,
        org_id: OrgId,
        key: Option<&str>,
        status: LicenseStatus,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE organizations SET license_key = $2, license_status = $3 WHERE id = $1",
        )
        .bind(org_id.as_uuid())
        .bind(key)
        .bind(status_to_str(status))
        .execute(&*self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for PostgresStores {
    async fn create_org(&self, org: Organization) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO organizations \
             (id, name, domain, license_key, license_status, domain_verified, blocked) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(org.id.as_uuid())
        .bind(&org.name)
        .bind(&org.domain)
        .bind(&org.license_key)
        .bind(status_to_str(org.license_status))
        .bind(org.domain_verified)
        .bind(org.blocked)
        .execute(&*self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn find_org(&self, id: OrgId) -> Result<Option<Organization>, StoreError> {
        sqlx::query("SELECT * FROM organizations WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(map_err)?
            .map(|row| org_from_row(&row))
            .transpose()
    }

    async fn create_user(&self, user: User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users \
             (id, email, password_hash, org_id, sub_tenant_id, super_identity, org_admin) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.org_id.as_uuid())
        .bind(user.sub_tenant_id.map(|t| *t.as_uuid()))
        .bind(user.super_identity)
        .bind(user.org_admin)
        .execute(&*self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(map_err)?
            .map(|row| user_from_row(&row))
            .transpose()
    }

    async fn create_sub_tenant(&self, tenant: SubTenant) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sub_tenants (id, org_id, name, settings, active) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(tenant.id.as_uuid())
        .bind(tenant.org_id.as_uuid())
        .bind(&tenant.name)
        .bind(&tenant.settings)
        .bind(tenant.active)
        .execute(&*self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn find_sub_tenant(&self, id: SubTenantId) -> Result<Option<SubTenant>, StoreError> {
        let row = sqlx::query("SELECT * FROM sub_tenants WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(map_err)?;

        row.map(|row| {
            Ok(SubTenant {
                id: SubTenantId::from_uuid(row.try_get("id").map_err(map_err)?),
                org_id: OrgId::from_uuid(row.try_get("org_id").map_err(map_err)?),
                name: row.try_get("name").map_err(map_err)?,
                settings: row.try_get("settings").map_err(map_err)?,
                active: row.try_get("active").map_err(map_err)?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl RbacStore for PostgresStores {
    async fn all_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        sqlx::query("SELECT * FROM permissions ORDER BY name")
            .fetch_all(&*self.pool)
            .await
            .map_err(map_err)?
            .iter()
            .map(permission_from_row)
            .collect()
    }

    async fn create_role(
        &self,
        role: Role,
        permission_ids: &[PermissionId],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        sqlx::query("INSERT INTO roles (id, org_id, name, description) VALUES ($1, $2, $3, $4)")
            .bind(role.id.as_uuid())
            .bind(role.org_id.as_uuid())
            .bind(&role.name)
            .bind(&role.description)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        for pid in permission_ids {
            sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2)")
                .bind(role.id.as_uuid())
                .bind(pid.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
        }

        tx.commit().await.map_err(map_err)
    }

    async fn find_role(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        sqlx::query("SELECT * FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(map_err)?
            .map(|row| role_from_row(&row))
            .transpose()
    }

    async fn find_role_by_name(
        &self,
        org_id: OrgId,
        name: &str,
    ) -> Result<Option<Role>, StoreError> {
        sqlx::query("SELECT * FROM roles WHERE org_id = $1 AND name = $2")
            .bind(org_id.as_uuid())
            .bind(name)
            .fetch_optional(&*self.pool)
            .await
            .map_err(map_err)?
            .map(|row| role_from_row(&row))
            .transpose()
    }

    async fn roles_for_user(&self, user_id: UserId) -> Result<Vec<Role>, StoreError> {
        sqlx::query(
            "SELECT r.* FROM roles r \
             JOIN user_roles ur ON ur.role_id = r.id \
             WHERE ur.user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(map_err)?
        .iter()
        .map(role_from_row)
        .collect()
    }

    async fn permissions_for_role(&self, role_id: RoleId) -> Result<Vec<Permission>, StoreError> {
        sqlx::query(
            "SELECT p.* FROM permissions p \
             JOIN role_permissions rp ON rp.permission_id = p.id \
             WHERE rp.role_id = $1",
        )
        .bind(role_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(map_err)?
        .iter()
        .map(permission_from_row)
        .collect()
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
            .bind(user_id.as_uuid())
            .bind(role_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }
}
