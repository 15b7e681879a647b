//! Authentication & authorization context pipeline.
//!
//! One linear pass per request: verify the bearer token, load user and
//! organization, re-validate the organization's license (skipped for the
//! super-identity), resolve effective permissions, and freeze the result
//! into an [`AuthContext`]. License validation and permission resolution
//! have no data dependency on each other and run concurrently; both wait on
//! the user/org lookups. Nothing is cached between requests — every request
//! sees current license and permission state.

use std::sync::Arc;

use thiserror::Error;

use keygate_auth::directory::DirectoryStore;
use keygate_auth::resolver::{PermissionResolver, RbacStore};
use keygate_auth::token::Hs256TokenCodec;
use keygate_core::StoreError;
use keygate_license::{License, LicenseManager, LicensePayload, LicenseStore, LicenseValidation};

use crate::context::AuthContext;

/// Request-terminal authentication/authorization failure.
///
/// Reasons name the unmet requirement; cryptographic internals never leak
/// past the license manager's reason string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No usable credential: missing/malformed header, bad signature,
    /// expired token, unknown subject.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated but not authorized: invalid license, missing
    /// permission, missing admin or super-identity flag.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A backing store failed mid-pipeline.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

type DynDirectory = Arc<dyn DirectoryStore>;
type DynRbac = Arc<dyn RbacStore>;
type DynLicenses = Arc<dyn LicenseStore>;

/// Builds one immutable [`AuthContext`] per request.
pub struct Authenticator {
    tokens: Hs256TokenCodec,
    directory: DynDirectory,
    licenses: LicenseManager<DynLicenses>,
    resolver: PermissionResolver<DynRbac, DynDirectory>,
}

impl Authenticator {
    pub fn new(
        tokens: Hs256TokenCodec,
        directory: DynDirectory,
        licenses: LicenseManager<DynLicenses>,
        resolver: PermissionResolver<DynRbac, DynDirectory>,
    ) -> Self {
        Self {
            tokens,
            directory,
            licenses,
            resolver,
        }
    }

    /// Run the pipeline for one request.
    ///
    /// `bearer` is the raw token, already stripped of the `Bearer ` prefix.
    /// A missing credential fails here, before any store lookup.
    pub async fn authenticate(&self, bearer: Option<&str>) -> Result<AuthContext, AuthError> {
        let token = bearer
            .ok_or_else(|| AuthError::Unauthenticated("missing bearer credential".to_string()))?;

        let claims = self
            .tokens
            .verify(token)
            .map_err(|e| AuthError::Unauthenticated(e.to_string()))?;

        let user = self
            .directory
            .find_user(claims.sub)
            .await?
            .ok_or_else(|| AuthError::Unauthenticated("unknown subject".to_string()))?;

        let organization = self
            .directory
            .find_org(user.org_id)
            .await?
            .ok_or_else(|| {
                AuthError::Forbidden("organization no longer exists".to_string())
            })?;

        if organization.blocked {
            return Err(AuthError::Forbidden("organization is blocked".to_string()));
        }

        let license_check = self.check_license(&user, &organization);
        let resolution = self.resolver.resolve_for_user(user.id);
        let tenant_lookup = self.load_tenant(&user);

        let (license, resolved, tenant) =
            tokio::join!(license_check, resolution, tenant_lookup);

        let (license, license_payload) = match license? {
            Some((license, payload)) => (Some(license), Some(payload)),
            None => (None, None),
        };
        let resolved = resolved?;

        let roles = resolved.roles.into_iter().map(|r| r.name).collect();

        Ok(AuthContext::new(
            user,
            organization,
            tenant,
            license,
            license_payload,
            roles,
            resolved.permissions,
        ))
    }

    /// Re-validate the organization's license; the super-identity skips this.
    async fn check_license(
        &self,
        user: &keygate_auth::directory::User,
        organization: &keygate_auth::directory::Organization,
    ) -> Result<Option<(License, LicensePayload)>, AuthError> {
        if user.super_identity {
            return Ok(None);
        }

        let key = organization.license_key.as_deref().ok_or_else(|| {
            AuthError::Forbidden("organization has no license on file".to_string())
        })?;

        let outcome = self
            .licenses
            .validate(key)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        match outcome {
            LicenseValidation {
                valid: true,
                license: Some(license),
                payload: Some(payload),
                ..
            } => Ok(Some((license, payload))),
            LicenseValidation { reason, .. } => Err(AuthError::Forbidden(
                reason.unwrap_or_else(|| "license invalid".to_string()),
            )),
        }
    }

    /// Best-effort sub-tenant lookup: absence or store trouble leaves the
    /// context's tenant unset rather than failing the request.
    async fn load_tenant(
        &self,
        user: &keygate_auth::directory::User,
    ) -> Option<keygate_auth::directory::SubTenant> {
        let id = user.sub_tenant_id?;
        match self.directory.find_sub_tenant(id).await {
            Ok(tenant) => tenant,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "sub-tenant lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keygate_auth::directory::{Organization, SubTenant, User};
    use keygate_auth::claims::AccessClaims;
    use keygate_core::{OrgId, SubTenantId, UserId};
    use keygate_license::{FeatureSet, LicenseCodec};
    use keygate_store::InMemoryStores;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SECRET: &[u8] = b"pipeline-test-secret";

    /// Directory wrapper that counts lookups, to pin down "no store access
    /// before credential extraction".
    struct CountingDirectory {
        inner: Arc<InMemoryStores>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl DirectoryStore for CountingDirectory {
        async fn create_org(&self, org: Organization) -> Result<(), StoreError> {
            self.inner.create_org(org).await
        }

        async fn find_org(&self, id: OrgId) -> Result<Option<Organization>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_org(id).await
        }

        async fn create_user(&self, user: User) -> Result<(), StoreError> {
            self.inner.create_user(user).await
        }

        async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_user(id).await
        }

        async fn create_sub_tenant(&self, tenant: SubTenant) -> Result<(), StoreError> {
            self.inner.create_sub_tenant(tenant).await
        }

        async fn find_sub_tenant(
            &self,
            id: SubTenantId,
        ) -> Result<Option<SubTenant>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_sub_tenant(id).await
        }
    }

    struct Fixture {
        authenticator: Authenticator,
        stores: Arc<InMemoryStores>,
        counting: Arc<CountingDirectory>,
        tokens: Hs256TokenCodec,
        licenses: LicenseManager<Arc<dyn LicenseStore>>,
    }

    fn fixture() -> Fixture {
        let stores = Arc::new(InMemoryStores::with_standard_catalog());
        let counting = Arc::new(CountingDirectory {
            inner: stores.clone(),
            lookups: AtomicUsize::new(0),
        });

        let directory: Arc<dyn DirectoryStore> = counting.clone();
        let rbac: Arc<dyn RbacStore> = stores.clone();
        let license_store: Arc<dyn LicenseStore> = stores.clone();

        let codec = LicenseCodec::new("enc-secret", "sig-secret");
        let licenses = LicenseManager::new(codec.clone(), license_store.clone());

        let authenticator = Authenticator::new(
            Hs256TokenCodec::new(SECRET),
            directory.clone(),
            LicenseManager::new(codec, license_store),
            PermissionResolver::new(rbac, directory),
        );

        Fixture {
            authenticator,
            stores,
            counting,
            tokens: Hs256TokenCodec::new(SECRET),
            licenses,
        }
    }

    fn mint(tokens: &Hs256TokenCodec, user: &User) -> String {
        let now = chrono::Utc::now();
        tokens
            .mint(&AccessClaims {
                sub: user.id,
                org_id: user.org_id,
                tenant_id: user.sub_tenant_id,
                super_identity: user.super_identity,
                org_admin: user.org_admin,
                issued_at: now,
                expires_at: now + chrono::Duration::minutes(10),
            })
            .unwrap()
    }

    async fn seed_licensed_org(f: &Fixture) -> (Organization, User) {
        let org = Organization::new("Acme", "acme.example");
        f.stores.create_org(org.clone()).await.unwrap();
        f.licenses
            .generate(org.id, &org.name, FeatureSet::default(), Some(30))
            .await
            .unwrap();

        let user = User::new(org.id, "user@acme.example", "hash");
        f.stores.create_user(user.clone()).await.unwrap();

        let org = f.stores.find_org(org.id).await.unwrap().unwrap();
        (org, user)
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_store_lookup() {
        let f = fixture();
        let err = f.authenticator.authenticate(None).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
        assert_eq!(f.counting.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn garbage_token_is_unauthenticated() {
        let f = fixture();
        let err = f
            .authenticator
            .authenticate(Some("not.a.token"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
        assert_eq!(f.counting.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn licensed_user_gets_a_full_context() {
        let f = fixture();
        let (org, user) = seed_licensed_org(&f).await;

        let ctx = f
            .authenticator
            .authenticate(Some(&mint(&f.tokens, &user)))
            .await
            .unwrap();

        assert_eq!(ctx.user().id, user.id);
        assert_eq!(ctx.organization().id, org.id);
        assert!(ctx.license().is_some());
        assert_eq!(ctx.license_payload().unwrap().company_id, org.id);
        assert!(ctx.tenant().is_none());
    }

    #[tokio::test]
    async fn unknown_subject_is_unauthenticated() {
        let f = fixture();
        let ghost = User::new(OrgId::new(), "ghost@acme", "hash");
        let err = f
            .authenticator
            .authenticate(Some(&mint(&f.tokens, &ghost)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn stale_org_is_forbidden() {
        let f = fixture();
        // User row exists but its organization was never created.
        let user = User::new(OrgId::new(), "stale@acme", "hash");
        f.stores.create_user(user.clone()).await.unwrap();

        let err = f
            .authenticator
            .authenticate(Some(&mint(&f.tokens, &user)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));
    }

    #[tokio::test]
    async fn suspended_license_is_forbidden_with_reason() {
        let f = fixture();
        let (org, user) = seed_licensed_org(&f).await;

        let license = f
            .stores
            .find_by_key(org.license_key.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        f.licenses.suspend(license.id).await.unwrap();

        let err = f
            .authenticator
            .authenticate(Some(&mint(&f.tokens, &user)))
            .await
            .unwrap_err();
        match err {
            AuthError::Forbidden(reason) => assert!(reason.contains("suspended")),
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn super_identity_skips_license_validation() {
        let f = fixture();
        // Org with no license at all.
        let org = Organization::new("Platform", "platform.example");
        f.stores.create_org(org.clone()).await.unwrap();

        let mut root = User::new(org.id, "root@platform.example", "hash");
        root.super_identity = true;
        f.stores.create_user(root.clone()).await.unwrap();

        let ctx = f
            .authenticator
            .authenticate(Some(&mint(&f.tokens, &root)))
            .await
            .unwrap();
        assert!(ctx.license().is_none());
        assert!(ctx.is_super_identity());
    }

    #[tokio::test]
    async fn dangling_sub_tenant_is_best_effort() {
        let f = fixture();
        let (_org, mut user) = seed_licensed_org(&f).await;

        // Re-create the user scoped to a sub-tenant that does not exist.
        user.id = UserId::new();
        user.email = "scoped@acme.example".to_string();
        user.sub_tenant_id = Some(SubTenantId::new());
        f.stores.create_user(user.clone()).await.unwrap();

        let ctx = f
            .authenticator
            .authenticate(Some(&mint(&f.tokens, &user)))
            .await
            .unwrap();
        assert!(ctx.tenant().is_none());
    }
}
