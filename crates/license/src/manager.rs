//! License lifecycle manager.
//!
//! Drives the status state machine against the [`LicenseStore`] and keeps
//! the owning organization's cached key/status mirror in step. The expiry
//! transition on the read path is an explicit, idempotent state-machine
//! step, not a hidden side effect: concurrent validations of the same
//! license may race, but the only write they can issue is
//! `Active -> Expired`, which is never reversed by this path.

use chrono::{DateTime, Duration, Utc};

use keygate_core::{LicenseId, OrgId};

use crate::codec::LicenseCodec;
use crate::error::LicenseError;
use crate::payload::{FeatureSet, LicensePayload};
use crate::record::License;
use crate::status::LicenseStatus;
use crate::store::LicenseStore;

/// Outcome of validating a license key.
///
/// Domain-invalid keys (tampered, unknown, revoked, suspended, expired) are
/// reported here with a reason; the stored record is still attached where
/// one exists so callers can inspect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseValidation {
    pub valid: bool,
    pub license: Option<License>,
    pub payload: Option<LicensePayload>,
    pub reason: Option<String>,
}

impl LicenseValidation {
    fn valid(license: License, payload: LicensePayload) -> Self {
        Self {
            valid: true,
            license: Some(license),
            payload: Some(payload),
            reason: None,
        }
    }

    fn invalid(reason: impl Into<String>, license: Option<License>) -> Self {
        Self {
            valid: false,
            license,
            payload: None,
            reason: Some(reason.into()),
        }
    }
}

/// Issues, validates, and transitions licenses.
pub struct LicenseManager<S> {
    codec: LicenseCodec,
    store: S,
}

impl<S: LicenseStore> LicenseManager<S> {
    pub fn new(codec: LicenseCodec, store: S) -> Self {
        Self { codec, store }
    }

    /// Issue a new license for an organization.
    ///
    /// The returned record carries the opaque key; this is the only moment
    /// the key is disclosed.
    pub async fn generate(
        &self,
        org_id: OrgId,
        org_name: &str,
        features: FeatureSet,
        expires_in_days: Option<i64>,
    ) -> Result<License, LicenseError> {
        if !self.store.org_exists(org_id).await? {
            return Err(LicenseError::OrgNotFound);
        }

        let expires_at = expires_in_days.map(|days| Utc::now() + Duration::days(days));
        let payload = LicensePayload::issue(org_id, org_name, features.clone(), expires_at);

        let key = self.codec.encode(&payload)?;
        let signature = LicenseCodec::signature_of(&key)
            .ok_or(crate::codec::CodecError::InvalidFormat)?
            .to_string();

        let license = License {
            id: LicenseId::new(),
            org_id,
            key: key.clone(),
            status: LicenseStatus::Active,
            features,
            issued_at: payload.issued_at,
            expires_at,
            revoked_at: None,
            signature,
        };

        self.store.insert(license.clone()).await?;
        self.store
            .mirror_to_org(org_id, Some(&key), LicenseStatus::Active)
            .await?;

        tracing::info!(license_id = %license.id, org_id = %org_id, "license issued");
        Ok(license)
    }

    /// Validate an opaque license key.
    ///
    /// Cryptographic and lookup failures surface as `valid: false` with a
    /// reason; only store failures are `Err`.
    pub async fn validate(&self, key: &str) -> Result<LicenseValidation, LicenseError> {
        let payload = match self.codec.decode(key) {
            Ok(payload) => payload,
            Err(e) => return Ok(LicenseValidation::invalid(e.to_string(), None)),
        };

        let Some(license) = self.store.find_by_key(key).await? else {
            return Ok(LicenseValidation::invalid("license not found", None));
        };

        match license.status {
            LicenseStatus::Revoked => {
                return Ok(LicenseValidation::invalid("license revoked", Some(license)));
            }
            LicenseStatus::Suspended => {
                return Ok(LicenseValidation::invalid("license suspended", Some(license)));
            }
            LicenseStatus::Expired => {
                // Already marked; re-validation is a status no-op.
                return Ok(LicenseValidation::invalid("license expired", Some(license)));
            }
            LicenseStatus::Active => {}
        }

        if payload.is_expired(Utc::now()) {
            let expired = self
                .transition(license, LicenseStatus::Expired, None)
                .await?;
            tracing::warn!(license_id = %expired.id, org_id = %expired.org_id, "license expired on validation");
            return Ok(LicenseValidation::invalid("license expired", Some(expired)));
        }

        Ok(LicenseValidation::valid(license, payload))
    }

    /// Revoke a license. Terminal: the organization must be issued a new
    /// license to restore access.
    pub async fn revoke(&self, id: LicenseId) -> Result<License, LicenseError> {
        let license = self.load(id).await?;
        let revoked = self
            .transition(license, LicenseStatus::Revoked, Some(Utc::now()))
            .await?;
        tracing::info!(license_id = %id, org_id = %revoked.org_id, "license revoked");
        Ok(revoked)
    }

    /// Pause a license; it may be reactivated later.
    pub async fn suspend(&self, id: LicenseId) -> Result<License, LicenseError> {
        let license = self.load(id).await?;
        let suspended = self
            .transition(license, LicenseStatus::Suspended, None)
            .await?;
        tracing::info!(license_id = %id, org_id = %suspended.org_id, "license suspended");
        Ok(suspended)
    }

    /// Lift a suspension.
    pub async fn reactivate(&self, id: LicenseId) -> Result<License, LicenseError> {
        let license = self.load(id).await?;
        let active = self
            .transition(license, LicenseStatus::Active, None)
            .await?;
        tracing::info!(license_id = %id, org_id = %active.org_id, "license reactivated");
        Ok(active)
    }

    async fn load(&self, id: LicenseId) -> Result<License, LicenseError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(LicenseError::NotFound)
    }

    /// Apply a checked state-machine transition and mirror it to the org.
    async fn transition(
        &self,
        mut license: License,
        to: LicenseStatus,
        revoked_at: Option<DateTime<Utc>>,
    ) -> Result<License, LicenseError> {
        if !license.status.can_transition(to) {
            return Err(LicenseError::InvalidTransition {
                from: license.status,
                to,
            });
        }

        if license.status != to {
            self.store.update_status(license.id, to, revoked_at).await?;
            self.store
                .mirror_to_org(license.org_id, Some(&license.key), to)
                .await?;
            license.status = to;
            license.revoked_at = revoked_at.or(license.revoked_at);
        }

        Ok(license)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LicenseStore;
    use async_trait::async_trait;
    use keygate_core::StoreError;
    use std::collections::HashMap;
    use std::sync::RwLock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Minimal in-memory store for manager tests; counts status writes so
    /// idempotency is observable.
    #[derive(Default)]
    struct FakeStore {
        orgs: RwLock<std::collections::HashSet<OrgId>>,
        rows: RwLock<HashMap<LicenseId, License>>,
        status_writes: AtomicUsize,
        mirrored: RwLock<HashMap<OrgId, (Option<String>, LicenseStatus)>>,
    }

    #[async_trait]
    impl LicenseStore for FakeStore {
        async fn insert(&self, license: License) -> Result<(), StoreError> {
            self.rows.write().unwrap().insert(license.id, license);
            Ok(())
        }

        async fn find_by_key(&self, key: &str) -> Result<Option<License>, StoreError> {
            Ok(self
                .rows
                .read()
                .unwrap()
                .values()
                .find(|l| l.key == key)
                .cloned())
        }

        async fn find_by_id(&self, id: LicenseId) -> Result<Option<License>, StoreError> {
            Ok(self.rows.read().unwrap().get(&id).cloned())
        }

        async fn org_exists(&self, org_id: OrgId) -> Result<bool, StoreError> {
            Ok(self.orgs.read().unwrap().contains(&org_id))
        }

        async fn update_status(
            &self,
            id: LicenseId,
            status: LicenseStatus,
            revoked_at: Option<DateTime<Utc>>,
        ) -> Result<(), StoreError> {
            self.status_writes.fetch_add(1, Ordering::SeqCst);
            let mut rows = self.rows.write().unwrap();
            let row = rows.get_mut(&id).expect("row exists");
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
            self.mirrored
                .write()
                .unwrap()
                .insert(org_id, (key.map(str::to_string), status));
            Ok(())
        }
    }

    fn manager() -> LicenseManager<FakeStore> {
        let codec = LicenseCodec::new("enc-secret", "sig-secret");
        LicenseManager::new(codec, FakeStore::default())
    }

    /// Register an organization row so issuance against it is legal.
    fn known_org(m: &LicenseManager<FakeStore>) -> OrgId {
        let org = OrgId::new();
        m.store.orgs.write().unwrap().insert(org);
        org
    }

    #[tokio::test]
    async fn generate_then_validate_round_trips() {
        let m = manager();
        let org = known_org(&m);
        let features = FeatureSet {
            max_users: 50,
            ..FeatureSet::default()
        };

        let license = m.generate(org, "Acme", features, Some(365)).await.unwrap();
        let outcome = m.validate(&license.key).await.unwrap();

        assert!(outcome.valid);
        let payload = outcome.payload.unwrap();
        assert_eq!(payload.company_id, org);
        assert_eq!(payload.features.max_users, 50);

        let expected = Utc::now() + Duration::days(365);
        let delta = (payload.expires_at.unwrap() - expected).num_seconds().abs();
        assert!(delta < 5, "expiry should be ~365 days out, off by {delta}s");
    }

    #[tokio::test]
    async fn generation_requires_an_existing_org() {
        let m = manager();

        let err = m
            .generate(OrgId::new(), "Ghost Co", FeatureSet::default(), Some(30))
            .await
            .unwrap_err();
        assert!(matches!(err, LicenseError::OrgNotFound));

        // Nothing was persisted; no orphan key can ever validate.
        assert!(m.store.rows.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generation_mirrors_key_onto_org() {
        let m = manager();
        let org = known_org(&m);
        let license = m
            .generate(org, "Acme", FeatureSet::default(), None)
            .await
            .unwrap();

        let mirrored = m.store.mirrored.read().unwrap().get(&org).cloned().unwrap();
        assert_eq!(mirrored.0.as_deref(), Some(license.key.as_str()));
        assert_eq!(mirrored.1, LicenseStatus::Active);
    }

    #[tokio::test]
    async fn unknown_key_reports_not_found() {
        let m = manager();
        // A structurally valid key that was never persisted.
        let org = known_org(&m);
        let license = m
            .generate(org, "Acme", FeatureSet::default(), None)
            .await
            .unwrap();
        m.store.rows.write().unwrap().clear();

        let outcome = m.validate(&license.key).await.unwrap();
        assert!(!outcome.valid);
        assert_eq!(outcome.reason.as_deref(), Some("license not found"));
    }

    #[tokio::test]
    async fn revoke_blocks_validation_with_reason() {
        let m = manager();
        let license = m
            .generate(known_org(&m), "Acme", FeatureSet::default(), None)
            .await
            .unwrap();

        let revoked = m.revoke(license.id).await.unwrap();
        assert_eq!(revoked.status, LicenseStatus::Revoked);
        assert!(revoked.revoked_at.is_some());

        let outcome = m.validate(&license.key).await.unwrap();
        assert!(!outcome.valid);
        assert!(outcome.reason.unwrap().contains("revoked"));
        // The record is still handed back for inspection.
        assert!(outcome.license.is_some());
    }

    #[tokio::test]
    async fn lazy_expiry_transitions_exactly_once() {
        let m = manager();
        let license = m
            .generate(known_org(&m), "Acme", FeatureSet::default(), Some(-1))
            .await
            .unwrap();

        let first = m.validate(&license.key).await.unwrap();
        assert!(!first.valid);
        assert_eq!(first.reason.as_deref(), Some("license expired"));
        assert_eq!(first.license.unwrap().status, LicenseStatus::Expired);

        let second = m.validate(&license.key).await.unwrap();
        assert!(!second.valid);
        assert_eq!(second.reason.as_deref(), Some("license expired"));

        assert_eq!(m.store.status_writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn suspend_and_reactivate_cycle() {
        let m = manager();
        let license = m
            .generate(known_org(&m), "Acme", FeatureSet::default(), None)
            .await
            .unwrap();

        m.suspend(license.id).await.unwrap();
        let outcome = m.validate(&license.key).await.unwrap();
        assert!(!outcome.valid);
        assert!(outcome.reason.unwrap().contains("suspended"));

        m.reactivate(license.id).await.unwrap();
        assert!(m.validate(&license.key).await.unwrap().valid);
    }

    #[tokio::test]
    async fn revoked_is_terminal_at_the_manager_layer() {
        let m = manager();
        let license = m
            .generate(known_org(&m), "Acme", FeatureSet::default(), None)
            .await
            .unwrap();
        m.revoke(license.id).await.unwrap();

        let err = m.suspend(license.id).await.unwrap_err();
        assert!(matches!(err, LicenseError::InvalidTransition { .. }));

        let err = m.reactivate(license.id).await.unwrap_err();
        assert!(matches!(err, LicenseError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn tampered_key_reports_codec_reason() {
        let m = manager();
        let license = m
            .generate(known_org(&m), "Acme", FeatureSet::default(), None)
            .await
            .unwrap();

        let mut bytes = license.key.clone().into_bytes();
        bytes[2] = if bytes[2] == b'a' { b'b' } else { b'a' };
        let tampered = String::from_utf8(bytes).unwrap();

        let outcome = m.validate(&tampered).await.unwrap();
        assert!(!outcome.valid);
        assert!(outcome.license.is_none());
        assert!(outcome.reason.is_some());
    }
}
