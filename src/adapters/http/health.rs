//! `/health` endpoint.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::application::RelayEngine;
use crate::domain::foundation::Timestamp;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Current authenticated WebSocket connection count.
    pub connections: usize,
    /// When the server started (RFC 3339).
    pub started_at: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
}

/// Build a health response from live counters.
pub fn health_check(started_at: Timestamp, connections: usize) -> HealthResponse {
    let uptime = Timestamp::now().duration_since(&started_at);
    HealthResponse {
        status: "ok".into(),
        connections,
        started_at: started_at.to_rfc3339(),
        uptime_secs: uptime.num_seconds().max(0) as u64,
    }
}

/// State for the health route.
#[derive(Clone)]
pub struct HealthState {
    pub engine: Arc<RelayEngine>,
    pub started_at: Timestamp,
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    let connections = state.engine.connection_count().await;
    Json(health_check(state.started_at, connections))
}

/// Router exposing `GET /health`.
pub fn health_router() -> Router<HealthState> {
    Router::new().route("/health", get(health))
}
