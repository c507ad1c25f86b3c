//! Liveness and credential health handlers.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use uuid::Uuid;

use axkan_core::channel::health::HealthSnapshot;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /health - Liveness (no auth required).
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/v1/health/token - Breaker state of each monitored credential.
pub async fn token_health(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<HealthSnapshot>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let snapshots = state.ports().health();

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(snapshots, request_id, elapsed)))
}
