//! Route definitions

use super::handlers;
use super::ratelimit::rate_limit;
use super::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Suggestion routes; only lookups are rate limited
        .route(
            "/suggest",
            get(handlers::suggest)
                .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit)),
        )
        .route("/suggest/defaults", get(handlers::defaults))
        .route("/suggest/track", post(handlers::track))
        // Admin routes
        .route("/admin/fts/:op", post(handlers::fts_admin))
        // API routes
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Add state
        .with_state(state)
}
