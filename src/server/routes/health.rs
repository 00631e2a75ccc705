//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::hub::HubStats;
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub hub: HubStats,
}

/// GET /health - Liveness plus hub counters.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let hub = state.hub();
    Json(HealthResponse {
        status: if hub.is_closed() { "shutting_down" } else { "ok" },
        hub: hub.stats(),
    })
}
