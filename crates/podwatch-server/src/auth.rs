//! Bearer-token guard for admin endpoints.

use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ErrorResponse;
use crate::state::AppState;

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// True when `header` is `Bearer <expected>`.
fn bearer_matches(header: Option<&str>, expected: &str) -> bool {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .is_some_and(|token| constant_time_eq(token.as_bytes(), expected.as_bytes()))
}

fn reject(status: StatusCode, error: &str, message: &str) -> Response {
    let body = ErrorResponse {
        error: error.to_string(),
        message: message.to_string(),
        details: None,
    };
    (status, axum::Json(body)).into_response()
}

/// Validates `Authorization: Bearer <token>` against `PODWATCH_ADMIN_TOKEN`.
///
/// - No token configured: 403, admin endpoints are disabled.
/// - Missing or wrong token: 401.
pub async fn require_admin_token(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        return reject(
            StatusCode::FORBIDDEN,
            "forbidden",
            "Admin endpoints are disabled (no PODWATCH_ADMIN_TOKEN configured)",
        );
    };

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if !bearer_matches(auth_header, expected) {
        return reject(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Missing or invalid Authorization header. Expected: Bearer <token>",
        );
    }

    next.run(request).await
}
