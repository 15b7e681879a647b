//! Shared service wiring behind the router.

use std::sync::Arc;

use keygate_auth::directory::DirectoryStore;
use keygate_auth::resolver::{PermissionResolver, RbacStore};
use keygate_auth::token::Hs256TokenCodec;
use keygate_license::{LicenseCodec, LicenseManager, LicenseStore};
use keygate_store::InMemoryStores;

use crate::pipeline::Authenticator;

/// Secrets every deployment must provide.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// HMAC secret for access tokens.
    pub jwt_secret: String,
    /// Secret the license encryption key is derived from.
    pub encryption_secret: String,
    /// Secret the license signing key is derived from.
    pub signing_secret: String,
}

impl SecurityConfig {
    /// Read secrets from the environment, falling back to loudly-logged
    /// development defaults.
    pub fn from_env() -> Self {
        Self {
            jwt_secret: env_secret("JWT_SECRET", "dev-jwt-secret"),
            encryption_secret: env_secret("KEYGATE_ENCRYPTION_SECRET", "dev-encryption-secret"),
            signing_secret: env_secret("KEYGATE_SIGNING_SECRET", "dev-signing-secret"),
        }
    }
}

fn env_secret(name: &str, dev_default: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => {
            tracing::warn!(%name, "secret not set, using development default");
            dev_default.to_string()
        }
    }
}

/// Handler-facing collaborators, shared via `Extension`.
pub struct Services {
    pub authenticator: Arc<Authenticator>,
    pub licenses: LicenseManager<Arc<dyn LicenseStore>>,
    pub resolver: PermissionResolver<Arc<dyn RbacStore>, Arc<dyn DirectoryStore>>,
    pub directory: Arc<dyn DirectoryStore>,
    pub rbac: Arc<dyn RbacStore>,
}

fn wire(
    config: &SecurityConfig,
    directory: Arc<dyn DirectoryStore>,
    rbac: Arc<dyn RbacStore>,
    license_store: Arc<dyn LicenseStore>,
) -> Arc<Services> {
    let codec = LicenseCodec::new(&config.encryption_secret, &config.signing_secret);
    let licenses = LicenseManager::new(codec.clone(), license_store.clone());

    let authenticator = Authenticator::new(
        Hs256TokenCodec::new(config.jwt_secret.as_bytes()),
        directory.clone(),
        LicenseManager::new(codec, license_store),
        PermissionResolver::new(rbac.clone(), directory.clone()),
    );

    Arc::new(Services {
        authenticator: Arc::new(authenticator),
        licenses,
        resolver: PermissionResolver::new(rbac.clone(), directory.clone()),
        directory,
        rbac,
    })
}

/// In-memory backend. Returns the store handle alongside the services so
/// callers (tests, the dev bootstrap) can seed directly.
pub fn build_in_memory_services(config: &SecurityConfig) -> (Arc<Services>, Arc<InMemoryStores>) {
    let stores = Arc::new(InMemoryStores::with_standard_catalog());

    let directory: Arc<dyn DirectoryStore> = stores.clone();
    let rbac: Arc<dyn RbacStore> = stores.clone();
    let license_store: Arc<dyn LicenseStore> = stores.clone();

    (wire(config, directory, rbac, license_store), stores)
}

#[cfg(feature = "postgres")]
pub fn build_persistent_services(config: &SecurityConfig, pool: sqlx::PgPool) -> Arc<Services> {
    let stores = Arc::new(keygate_store::PostgresStores::new(pool));

    let directory: Arc<dyn DirectoryStore> = stores.clone();
    let rbac: Arc<dyn RbacStore> = stores.clone();
    let license_store: Arc<dyn LicenseStore> = stores;

    wire(config, directory, rbac, license_store)
}
