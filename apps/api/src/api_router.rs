use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

pub fn build_router(app_state: AppState, max_concurrent_requests: usize) -> Router {
    let protected_routes = Router::new()
        .route(
            "/api/role-assignments",
            post(handlers::role_assignments::assign_role_handler),
        )
        .route(
            "/api/role-assignments/{idempotency_key}",
            get(handlers::role_assignments::lookup_role_assignment_handler),
        )
        .route(
            "/api/audit-log",
            get(handlers::audit::list_audit_log_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_bearer_identity,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
