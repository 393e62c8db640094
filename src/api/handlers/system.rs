//! System endpoints: health check with handshake counters.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::app_state::AppState;
use crate::stats::StatsSnapshot;

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    uptime_secs: i64,
    handshakes: StatsSnapshot,
}

/// `GET /health` — Service health status and handshake counters.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: now.to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: (now - state.started_at).num_seconds().max(0),
            handshakes: state.stats.snapshot(),
        }),
    )
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
