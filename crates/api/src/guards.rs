//! Composable authorization guards over an [`AuthContext`].
//!
//! Guards only read the context — they never re-touch credentials or the
//! license. Each denial names the unmet requirement.

use keygate_auth::permissions::PermissionName;

use crate::context::AuthContext;
use crate::pipeline::AuthError;

/// Require a named permission. The super-identity always passes.
pub fn require_permission(ctx: &AuthContext, name: &PermissionName) -> Result<(), AuthError> {
    if ctx.is_super_identity() || ctx.has_permission(name) {
        Ok(())
    } else {
        Err(AuthError::Forbidden(format!(
            "missing permission '{name}'"
        )))
    }
}

/// Require the organization-admin flag (or the super-identity).
pub fn require_org_admin(ctx: &AuthContext) -> Result<(), AuthError> {
    if ctx.is_org_admin() || ctx.is_super_identity() {
        Ok(())
    } else {
        Err(AuthError::Forbidden(
            "organization admin required".to_string(),
        ))
    }
}

/// Require the platform super-identity exactly.
pub fn require_super_identity(ctx: &AuthContext) -> Result<(), AuthError> {
    if ctx.is_super_identity() {
        Ok(())
    } else {
        Err(AuthError::Forbidden(
            "platform super-identity required".to_string(),
        ))
    }
}
