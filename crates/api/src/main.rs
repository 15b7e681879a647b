use std::net::SocketAddr;

use anyhow::Context;

use keygate_api::app;
use keygate_api::app::services::{SecurityConfig, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    keygate_observability::init();

    let config = SecurityConfig::from_env();
    let (router, services) = app::build_app(config.clone()).await?;

    if env_flag("KEYGATE_DEV_BOOTSTRAP") {
        bootstrap_dev(&services, &config).await?;
    }

    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid BIND_ADDR '{bind}'"))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "keygate api listening");

    axum::serve(listener, router).await.context("serving")?;
    Ok(())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Seed a platform organization with a super-identity and log a 24h token.
/// Development convenience only; never enabled by default.
async fn bootstrap_dev(services: &Services, config: &SecurityConfig) -> anyhow::Result<()> {
    use chrono::{Duration, Utc};
    use keygate_auth::claims::AccessClaims;
    use keygate_auth::directory::{Organization, User};
    use keygate_auth::token::Hs256TokenCodec;

    let org = Organization::new("Platform", "platform.local");
    let mut root = User::new(org.id, "root@platform.local", "dev-only");
    root.super_identity = true;
    root.org_admin = true;

    services.directory.create_org(org.clone()).await?;
    services.directory.create_user(root.clone()).await?;
    services.resolver.create_default_roles(org.id).await?;

    let now = Utc::now();
    let token = Hs256TokenCodec::new(config.jwt_secret.as_bytes()).mint(&AccessClaims {
        sub: root.id,
        org_id: org.id,
        tenant_id: None,
        super_identity: true,
        org_admin: true,
        issued_at: now,
        expires_at: now + Duration::hours(24),
    })?;

    tracing::info!(org_id = %org.id, user_id = %root.id, %token, "development bootstrap complete");
    Ok(())
}
