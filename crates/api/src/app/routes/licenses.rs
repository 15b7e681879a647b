//! Platform license administration. Every route requires the super-identity.

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;

use keygate_core::{LicenseId, OrgId};
use keygate_license::{FeatureSet, License};

use crate::app::errors::license_error_to_response;
use crate::app::services::Services;
use crate::context::AuthContext;
use crate::guards;

pub fn router() -> Router {
    Router::new()
        .route("/", post(generate))
        .route("/validate", post(validate))
        .route("/:id/revoke", post(revoke))
        .route("/:id/suspend", post(suspend))
        .route("/:id/reactivate", post(reactivate))
}

#[derive(Debug, Deserialize)]
struct GenerateLicenseRequest {
    org_id: OrgId,
    org_name: String,
    #[serde(default)]
    features: FeatureSet,
    expires_in_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ValidateLicenseRequest {
    key: String,
}

fn license_summary(license: &License) -> serde_json::Value {
    json!({
        "id": license.id,
        "org_id": license.org_id,
        "status": license.status,
        "issued_at": license.issued_at,
        "expires_at": license.expires_at,
        "revoked_at": license.revoked_at,
    })
}

async fn generate(
    Extension(ctx): Extension<AuthContext>,
    Extension(services): Extension<Arc<Services>>,
    Json(req): Json<GenerateLicenseRequest>,
) -> Response {
    if let Err(e) = guards::require_super_identity(&ctx) {
        return e.into_response();
    }

    match services
        .licenses
        .generate(req.org_id, &req.org_name, req.features, req.expires_in_days)
        .await
    {
        Ok(license) => {
            // The opaque key is disclosed here and never again.
            let mut body = license_summary(&license);
            body["key"] = json!(license.key);
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(e) => license_error_to_response(e),
    }
}

async fn validate(
    Extension(ctx): Extension<AuthContext>,
    Extension(services): Extension<Arc<Services>>,
    Json(req): Json<ValidateLicenseRequest>,
) -> Response {
    if let Err(e) = guards::require_super_identity(&ctx) {
        return e.into_response();
    }

    match services.licenses.validate(&req.key).await {
        Ok(outcome) => Json(json!({
            "valid": outcome.valid,
            "reason": outcome.reason,
            "license": outcome.license.as_ref().map(license_summary),
            "payload": outcome.payload,
        }))
        .into_response(),
        Err(e) => license_error_to_response(e),
    }
}

async fn revoke(
    Extension(ctx): Extension<AuthContext>,
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<LicenseId>,
) -> Response {
    if let Err(e) = guards::require_super_identity(&ctx) {
        return e.into_response();
    }

    match services.licenses.revoke(id).await {
        Ok(license) => Json(license_summary(&license)).into_response(),
        Err(e) => license_error_to_response(e),
    }
}

async fn suspend(
    Extension(ctx): Extension<AuthContext>,
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<LicenseId>,
) -> Response {
    if let Err(e) = guards::require_super_identity(&ctx) {
        return e.into_response();
    }

    match services.licenses.suspend(id).await {
        Ok(license) => Json(license_summary(&license)).into_response(),
        Err(e) => license_error_to_response(e),
    }
}

async fn reactivate(
    Extension(ctx): Extension<AuthContext>,
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<LicenseId>,
) -> Response {
    if let Err(e) = guards::require_super_identity(&ctx) {
        return e.into_response();
    }

    match services.licenses.reactivate(id).await {
        Ok(license) => Json(license_summary(&license)).into_response(),
        Err(e) => license_error_to_response(e),
    }
}
