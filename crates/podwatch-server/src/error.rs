use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use podwatch_core::AppError;

/// API error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

/// JSON error response body
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
            ),
            ApiError::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_exceeded",
                "Rate limit exceeded. Please wait and try again.".to_string(),
            ),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: None,
        });

        (status, body).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match &err {
            AppError::NodeNotFound(pubkey) => {
                ApiError::NotFound(format!("Node not found: {}", pubkey))
            }
            AppError::DatabaseError(e) => {
                tracing::error!(error = %e, "Database error");
                ApiError::Internal("Database error".to_string())
            }
            AppError::RateLimitExceeded => ApiError::RateLimitExceeded,
            AppError::SourcesUnavailable(_) => {
                ApiError::ServiceUnavailable("No pRPC source reachable".to_string())
            }
            AppError::InvalidSourceUrl(url) => {
                ApiError::Internal(format!("Invalid pRPC source URL: {}", url))
            }
            AppError::InvalidUrl(url) => ApiError::BadRequest(format!("Invalid URL: {}", url)),
            AppError::ConfigError(msg) => {
                ApiError::Internal(format!("Configuration error: {}", msg))
            }
            AppError::EmptyResponse => ApiError::NotFound("No data available".to_string()),
            AppError::NetworkError(_)
            | AppError::Timeout(_)
            | AppError::ClientError(_)
            | AppError::RpcError { .. } => {
                ApiError::ServiceUnavailable("External service unavailable".to_string())
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_mapping() {
        let cases = [
            (
                AppError::NodeNotFound("abc".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::SourcesUnavailable("seed-1: refused".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (AppError::RateLimitExceeded, StatusCode::TOO_MANY_REQUESTS),
            (AppError::Timeout(3), StatusCode::SERVICE_UNAVAILABLE),
            (
                AppError::InvalidUrl("nope".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Generic("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_not_found_message_names_the_node() {
        let err = ApiError::from(AppError::NodeNotFound("8dx2".to_string()));
        assert_eq!(err.to_string(), "Not found: Node not found: 8dx2");
    }

    #[test]
    fn test_into_response_status() {
        let response = ApiError::BadRequest("bad tier".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
