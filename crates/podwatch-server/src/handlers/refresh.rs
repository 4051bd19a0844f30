//! Manual refresh trigger.

use axum::{Json, extract::State};

use podwatch_core::TracingReporter;

use crate::dto::RefreshResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// Run ingestion now, regardless of staleness.
///
/// Waits for any refresh already in flight, then runs a new one and returns
/// its summary.
#[utoipa::path(
    post,
    path = "/api/v1/refresh",
    responses(
        (status = 200, description = "Refresh completed", body = RefreshResponse),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 403, description = "Admin endpoints disabled"),
        (status = 503, description = "No pRPC source reachable or server shutting down"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn trigger_refresh(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, ApiError> {
    tokio::select! {
        result = state.reader.refresh_with_progress(&TracingReporter) => {
            Ok(Json(RefreshResponse::from(result?)))
        }
        _ = state.shutdown_token.cancelled() => {
            Err(ApiError::ServiceUnavailable("Server is shutting down".to_string()))
        }
    }
}
