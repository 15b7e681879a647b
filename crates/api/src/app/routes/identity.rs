use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde_json::json;

use crate::context::AuthContext;

/// Echo back the resolved request context. Handy for integrations that need
/// to see what the platform thinks they are allowed to do.
pub async fn whoami(Extension(ctx): Extension<AuthContext>) -> impl IntoResponse {
    let mut permissions: Vec<String> = ctx
        .permissions()
        .iter()
        .map(|p| p.as_str().to_string())
        .collect();
    permissions.sort();

    Json(json!({
        "user": {
            "id": ctx.user().id,
            "email": ctx.user().email,
            "super_identity": ctx.is_super_identity(),
            "org_admin": ctx.is_org_admin(),
        },
        "organization": {
            "id": ctx.organization().id,
            "name": ctx.organization().name,
            "domain": ctx.organization().domain,
        },
        "tenant": ctx.tenant().map(|t| json!({ "id": t.id, "name": t.name })),
        "license": ctx.license().map(|l| json!({
            "id": l.id,
            "status": l.status,
            "expires_at": l.expires_at,
        })),
        "roles": ctx.roles(),
        "permissions": permissions,
    }))
}
