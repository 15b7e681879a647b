pub mod identity;
pub mod licenses;
pub mod rbac;
pub mod system;

use axum::routing::get;
use axum::Router;

/// Routes that sit behind the auth middleware.
pub fn protected_router() -> Router {
    Router::new()
        .route("/whoami", get(identity::whoami))
        .nest("/admin/licenses", licenses::router())
        .nest("/admin/rbac", rbac::router())
}
