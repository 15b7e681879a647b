//! Role and permission administration. Routes require the organization-admin
//! flag; cross-organization writes additionally require the super-identity.

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde_json::json;

use keygate_auth::directory::User;
use keygate_auth::roles::Role;
use keygate_core::{OrgId, RoleId, UserId};

use crate::app::errors::{json_error, store_error_to_response};
use crate::app::services::Services;
use crate::context::AuthContext;
use crate::guards;

pub fn router() -> Router {
    Router::new()
        .route("/permissions", get(list_permissions))
        .route("/orgs/:org_id/default-roles", post(create_default_roles))
        .route("/users/:user_id/roles/:role_id", post(assign_role))
        .route("/users/:user_id/permissions", get(user_permissions))
}

/// Load a user the caller is allowed to administer: it must exist and belong
/// to the caller's organization unless the caller is the super-identity.
async fn load_scoped_user(
    ctx: &AuthContext,
    services: &Services,
    user_id: UserId,
) -> Result<User, Response> {
    let user = match services.directory.find_user(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return Err(json_error(StatusCode::NOT_FOUND, "not_found", "user not found"));
        }
        Err(e) => return Err(store_error_to_response(e)),
    };

    if !ctx.is_super_identity() && user.org_id != ctx.organization().id {
        return Err(json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "cannot manage another organization",
        ));
    }

    Ok(user)
}

fn role_summary(role: &Role) -> serde_json::Value {
    json!({
        "id": role.id,
        "org_id": role.org_id,
        "name": role.name,
        "description": role.description,
    })
}

async fn list_permissions(
    Extension(ctx): Extension<AuthContext>,
    Extension(services): Extension<Arc<Services>>,
) -> Response {
    if let Err(e) = guards::require_org_admin(&ctx) {
        return e.into_response();
    }

    match services.rbac.all_permissions().await {
        Ok(mut catalog) => {
            catalog.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
            Json(json!({ "permissions": catalog })).into_response()
        }
        Err(e) => store_error_to_response(e),
    }
}

async fn create_default_roles(
    Extension(ctx): Extension<AuthContext>,
    Extension(services): Extension<Arc<Services>>,
    Path(org_id): Path<OrgId>,
) -> Response {
    if let Err(e) = guards::require_org_admin(&ctx) {
        return e.into_response();
    }
    if !ctx.is_super_identity() && ctx.organization().id != org_id {
        return json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "cannot manage another organization",
        );
    }

    match services.resolver.create_default_roles(org_id).await {
        Ok(roles) => {
            let roles: Vec<_> = roles.iter().map(role_summary).collect();
            (StatusCode::CREATED, Json(json!({ "roles": roles }))).into_response()
        }
        Err(e) => store_error_to_response(e),
    }
}

async fn assign_role(
    Extension(ctx): Extension<AuthContext>,
    Extension(services): Extension<Arc<Services>>,
    Path((user_id, role_id)): Path<(UserId, RoleId)>,
) -> Response {
    if let Err(e) = guards::require_org_admin(&ctx) {
        return e.into_response();
    }

    let user = match load_scoped_user(&ctx, &services, user_id).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let role = match services.rbac.find_role(role_id).await {
        Ok(Some(role)) => role,
        Ok(None) => return json_error(StatusCode::NOT_FOUND, "not_found", "role not found"),
        Err(e) => return store_error_to_response(e),
    };
    if !ctx.is_super_identity() && role.org_id != ctx.organization().id {
        return json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "cannot manage another organization",
        );
    }
    // Roles never cross organizations, whoever asks.
    if role.org_id != user.org_id {
        return json_error(
            StatusCode::CONFLICT,
            "conflict",
            "role belongs to a different organization",
        );
    }

    match services.resolver.assign_role(user_id, role_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error_to_response(e),
    }
}

async fn user_permissions(
    Extension(ctx): Extension<AuthContext>,
    Extension(services): Extension<Arc<Services>>,
    Path(user_id): Path<UserId>,
) -> Response {
    if let Err(e) = guards::require_org_admin(&ctx) {
        return e.into_response();
    }
    if let Err(resp) = load_scoped_user(&ctx, &services, user_id).await {
        return resp;
    }

    match services.resolver.resolve_for_user(user_id).await {
        Ok(resolved) => {
            let roles: Vec<_> = resolved.roles.iter().map(role_summary).collect();
            let mut permissions: Vec<String> = resolved
                .permissions
                .iter()
                .map(|p| p.as_str().to_string())
                .collect();
            permissions.sort();

            Json(json!({ "roles": roles, "permissions": permissions })).into_response()
        }
        Err(e) => store_error_to_response(e),
    }
}
