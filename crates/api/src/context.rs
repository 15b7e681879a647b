//! The per-request authorization context.

use std::collections::HashSet;
use std::sync::Arc;

use keygate_auth::directory::{Organization, SubTenant, User};
use keygate_auth::permissions::PermissionName;
use keygate_license::{License, LicensePayload};

/// Everything a downstream handler may know about the caller.
///
/// Built once per request by the pipeline, attached to request extensions,
/// and immutable from then on: fields are private and only reachable through
/// accessors, and the shared inner state is behind an `Arc` so cloning the
/// context for the extension layer stays cheap.
///
/// `license` is `None` exactly when the caller is the super-identity, which
/// bypasses license validation.
#[derive(Debug, Clone)]
pub struct AuthContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    user: User,
    organization: Organization,
    tenant: Option<SubTenant>,
    license: Option<License>,
    license_payload: Option<LicensePayload>,
    roles: Vec<String>,
    permissions: HashSet<PermissionName>,
}

impl AuthContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        user: User,
        organization: Organization,
        tenant: Option<SubTenant>,
        license: Option<License>,
        license_payload: Option<LicensePayload>,
        roles: Vec<String>,
        permissions: HashSet<PermissionName>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                user,
                organization,
                tenant,
                license,
                license_payload,
                roles,
                permissions,
            }),
        }
    }

    pub fn user(&self) -> &User {
        &self.inner.user
    }

    pub fn organization(&self) -> &Organization {
        &self.inner.organization
    }

    pub fn tenant(&self) -> Option<&SubTenant> {
        self.inner.tenant.as_ref()
    }

    pub fn license(&self) -> Option<&License> {
        self.inner.license.as_ref()
    }

    pub fn license_payload(&self) -> Option<&LicensePayload> {
        self.inner.license_payload.as_ref()
    }

    pub fn roles(&self) -> &[String] {
        &self.inner.roles
    }

    pub fn permissions(&self) -> &HashSet<PermissionName> {
        &self.inner.permissions
    }

    pub fn is_super_identity(&self) -> bool {
        self.inner.user.super_identity
    }

    pub fn is_org_admin(&self) -> bool {
        self.inner.user.org_admin
    }

    pub fn has_permission(&self, name: &PermissionName) -> bool {
        self.inner.permissions.contains(name)
    }
}
