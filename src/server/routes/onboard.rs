//! Onboard endpoint (active journeys query).

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::error::QueryError;
use crate::server::state::AppState;
use crate::store::LocationUpdate;

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "1")],
            Json(serde_json::json!({ "error": "Failed to fetch" })),
        )
            .into_response()
    }
}

/// GET /onboard - All currently active journeys, in insertion order.
pub async fn get_onboard(
    State(state): State<AppState>,
) -> Result<Json<Vec<LocationUpdate>>, QueryError> {
    state.onboard().await.map(Json)
}
