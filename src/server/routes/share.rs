//! Share endpoint (ingestion).

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{ShareError, ValidationError};
use crate::server::state::AppState;
use crate::store::SharePayload;

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub message: &'static str,
    pub id: String,
}

impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ShareError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ShareError::Persistence(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save".to_string())
            }
            ShareError::NotBroadcast { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Saved but live updates are shutting down".to_string(),
            ),
        };
        (status, Json(serde_json::json!({ "error": error }))).into_response()
    }
}

/// POST /share - Share a live bus journey.
///
/// Body: `user_id`, `route` (required), `coordinates`, `crowd`
/// (`low`/`medium`/`high`), `startPoint`, `destination`.
pub async fn share(
    State(state): State<AppState>,
    payload: Result<Json<SharePayload>, JsonRejection>,
) -> Result<Json<ShareResponse>, ShareError> {
    let Json(payload) =
        payload.map_err(|e| ShareError::Validation(ValidationError::Malformed(e.body_text())))?;

    let update = state.share(payload).await?;

    Ok(Json(ShareResponse {
        message: "Shared successfully",
        id: update.id,
    }))
}
