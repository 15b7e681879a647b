//! Storage port for licenses.
//!
//! Implementations live in `keygate-store` (in-memory for dev/test, Postgres
//! behind a feature). The port includes the organization license mirror so a
//! status change and its cached copy can be written by one collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use keygate_core::{LicenseId, OrgId, StoreError};

use crate::record::License;
use crate::status::LicenseStatus;

#[async_trait]
pub trait LicenseStore: Send + Sync {
    /// Persist a freshly issued license row.
    async fn insert(&self, license: License) -> Result<(), StoreError>;

    /// Point lookup by the opaque key.
    async fn find_by_key(&self, key: &str) -> Result<Option<License>, StoreError>;

    /// Point lookup by record id.
    async fn find_by_id(&self, id: LicenseId) -> Result<Option<License>, StoreError>;

    /// Whether the owning organization row exists. Issuance checks this so
    /// no license is ever bound to a nonexistent organization.
    async fn org_exists(&self, org_id: OrgId) -> Result<bool, StoreError>;

    /// Write a new status (and optional revocation stamp) for a license.
    ///
    /// Last-writer-wins; the caller is responsible for checking the
    /// transition table first.
    async fn update_status(
        &self,
        id: LicenseId,
        status: LicenseStatus,
        revoked_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Mirror the current key and status onto the owning organization.
    async fn mirror_to_org(
        &self,
        org_id: OrgId,
        key: Option<&str>,
        status: LicenseStatus,
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> LicenseStore for Arc<S>
where
    S: LicenseStore + ?Sized,
{
    async fn insert(&self, license: License) -> Result<(), StoreError> {
        (**self).insert(license).await
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<License>, StoreError> {
        (**self).find_by_key(key).await
    }

    async fn find_by_id(&self, id: LicenseId) -> Result<Option<License>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn org_exists(&self, org_id: OrgId) -> Result<bool, StoreError> {
        (**self).org_exists(org_id).await
    }

    async fn update_status(
        &self,
        id: LicenseId,
        status: LicenseStatus,
        revoked_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        (**self).update_status(id, status, revoked_at).await
    }

    async fn mirror_to_org(
        &self,
        org_id: OrgId,
        key: Option<&str>,
        status: LicenseStatus,
    ) -> Result<(), StoreError> {
        (**self).mirror_to_org(org_id, key, status).await
    }
}
