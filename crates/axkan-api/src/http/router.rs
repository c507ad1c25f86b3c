//! Axum router configuration with middleware.
//!
//! The webhook and liveness routes sit at the root; operator routes are
//! under `/api/v1/`. Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/conversations",
            get(handlers::conversation::list_conversations),
        )
        .route(
            "/conversations/{id}/messages",
            get(handlers::conversation::list_messages),
        )
        .route(
            "/conversations/{id}/reply",
            post(handlers::conversation::reply),
        )
        .route(
            "/conversations/{id}/read",
            put(handlers::conversation::mark_read),
        )
        .route("/health/token", get(handlers::health::token_health));

    Router::new()
        .nest("/api/v1", api_routes)
        .route(
            "/webhook",
            get(handlers::webhook::verify).post(handlers::webhook::receive),
        )
        .route("/health", get(handlers::health::health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
