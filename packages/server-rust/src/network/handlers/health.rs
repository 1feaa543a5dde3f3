//! Liveness and readiness handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::network::HealthState;

/// Liveness probe: always 200 with an empty JSON object.
pub async fn healthz_handler() -> Json<serde_json::Value> {
    Json(json!({}))
}

/// Readiness probe -- 200 while serving, 503 while starting or draining.
/// The body names the current state, e.g. `{"status": "draining"}`.
pub async fn readiness_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let health = state.shutdown.health_state();
    let status = if health == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "status": health.as_str() })))
}
