//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Health check (intentionally unauthenticated for load balancers/k8s probes)
    let mut router = Router::new().route("/health", get(handlers::health_check));

    // Conditionally add metrics endpoint based on config.
    // See crate::metrics module documentation for exposure requirements.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
