//! Health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::dto::{HealthResponse, ServiceStatus};
use crate::state::AppState;

/// Health check endpoint.
///
/// Returns the server version and database connectivity. Answers 503 when
/// the database is unreachable.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, database) = match state.repo.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            ServiceStatus {
                healthy: true,
                message: None,
            },
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ServiceStatus {
                    healthy: false,
                    message: Some(e.to_string()),
                },
            )
        }
    };

    let body = HealthResponse {
        status: if database.healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    };

    (status, Json(body))
}
