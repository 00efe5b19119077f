use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording control
        .route(
            "/livestreams/users/:identifier/download",
            post(handlers::start_user_download),
        )
        .route("/livestreams/download", post(handlers::start_download))
        // Job queries
        .route("/livestreams/operations", get(handlers::list_operations))
        .route(
            "/livestreams/operations/:job_id",
            get(handlers::get_operation),
        )
        .route(
            "/livestreams/operations/:job_id/cancel",
            post(handlers::cancel_operation),
        )
        // Room lookup
        .route("/livestreams/rooms/:identifier", get(handlers::get_room))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
