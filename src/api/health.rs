use axum::{extract::State, Json};
use serde::Serialize;

use crate::backend::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    nodes: usize,
    unsupplied: usize,
}

/// GET /healthz - Liveness plus a coarse view of supply
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (nodes, unsupplied) = {
        let backend = state.backend.lock();
        (
            backend.routing().graph().node_count(),
            backend.routing().unsupplied().len(),
        )
    };
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now(),
        nodes,
        unsupplied,
    })
}
