//! Route definitions

use super::handlers;
use super::state::AppState;
use axum::{
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
        // Search API
        .route("/api/search/all", post(handlers::search_all))
        .route("/api/search/source/:source", post(handlers::search_source))
        .route(
            "/api/search/details/:source/:external_id",
            get(handlers::asset_details),
        )
        .route("/api/search/sources", get(handlers::sources))
        .route("/api/search/history", get(handlers::history))
        // Liveness
        .route("/health", get(handlers::health))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Add state
        .with_state(state)
}
