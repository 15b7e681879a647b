//! Application assembly: services, router, and error surfaces.

pub mod errors;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::routing::get;
use axum::{Extension, Router};

use crate::middleware::{auth_middleware, AuthState};
use services::{SecurityConfig, Services};

/// Assemble the router around an already-wired service set.
///
/// `/health` stays outside the auth middleware; everything else passes
/// through the context pipeline first.
pub fn router(services: Arc<Services>) -> Router {
    let auth_state = AuthState {
        authenticator: services.authenticator.clone(),
    };

    let protected = routes::protected_router()
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .layer(Extension(services));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}

/// Build the app from the environment.
///
/// `USE_PERSISTENT_STORES=true` selects the Postgres backend (requires the
/// `postgres` feature and `DATABASE_URL`); anything else runs in memory.
pub async fn build_app(config: SecurityConfig) -> anyhow::Result<(Router, Arc<Services>)> {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let services = if use_persistent {
        build_persistent(&config).await?
    } else {
        tracing::info!("using in-memory stores");
        let (services, _stores) = services::build_in_memory_services(&config);
        services
    };

    Ok((router(services.clone()), services))
}

#[cfg(feature = "postgres")]
async fn build_persistent(config: &SecurityConfig) -> anyhow::Result<Arc<Services>> {
    use anyhow::Context;

    let url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("connecting to postgres")?;

    tracing::info!("using postgres stores");
    Ok(services::build_persistent_services(config, pool))
}

#[cfg(not(feature = "postgres"))]
async fn build_persistent(_config: &SecurityConfig) -> anyhow::Result<Arc<Services>> {
    anyhow::bail!("USE_PERSISTENT_STORES=true requires the 'postgres' feature")
}
