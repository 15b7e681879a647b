use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use keygate_core::StoreError;
use keygate_license::LicenseError;

use crate::pipeline::AuthError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Unauthenticated(reason) => {
                json_error(StatusCode::UNAUTHORIZED, "unauthenticated", reason)
            }
            AuthError::Forbidden(reason) => {
                json_error(StatusCode::FORBIDDEN, "forbidden", reason)
            }
            AuthError::Internal(reason) => {
                tracing::error!(%reason, "pipeline store failure");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error",
                )
            }
        }
    }
}

pub fn license_error_to_response(err: LicenseError) -> Response {
    match err {
        LicenseError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "license not found"),
        LicenseError::OrgNotFound => {
            json_error(StatusCode::NOT_FOUND, "not_found", "organization not found")
        }
        LicenseError::InvalidTransition { .. } => {
            json_error(StatusCode::CONFLICT, "invalid_transition", err.to_string())
        }
        LicenseError::Codec(e) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_license_key", e.to_string())
        }
        LicenseError::Store(msg) => {
            tracing::error!(%msg, "license store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "store error")
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> Response {
    match err {
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Unavailable(msg) => {
            tracing::error!(%msg, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "store error")
        }
    }
}
