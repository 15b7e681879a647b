use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::pipeline::{AuthError, Authenticator};

#[derive(Clone)]
pub struct AuthState {
    pub authenticator: Arc<Authenticator>,
}

/// Run the context pipeline and attach the resulting [`crate::context::AuthContext`]
/// to the request. Handlers receive it via `Extension<AuthContext>`.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let bearer = extract_bearer(req.headers());
    let ctx = state.authenticator.authenticate(bearer).await?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();

    (!token.is_empty()).then_some(token)
}
