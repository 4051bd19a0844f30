//! Request validation and admin authentication.

use axum::http::StatusCode;

use crate::integration::common::{app, get, post, send, test_state};

#[tokio::test]
async fn test_refresh_disabled_without_admin_token() {
    let (status, body) = send(app(test_state(None)), post("/api/v1/refresh", None)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn test_empty_admin_token_disables_refresh() {
    let (status, _) = send(
        app(test_state(Some(""))),
        post("/api/v1/refresh", Some("")),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_refresh_rejects_missing_or_wrong_token() {
    let state = test_state(Some("s3cret"));

    let (missing, body) = send(app(state.clone()), post("/api/v1/refresh", None)).await;
    let (wrong, _) = send(app(state), post("/api/v1/refresh", Some("guess"))).await;

    assert_eq!(missing, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(wrong, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authorized_refresh_reaches_ingestion() {
    // No network.toml means no seeds, which ingestion rejects before any I/O.
    let (status, body) = send(
        app(test_state(Some("s3cret"))),
        post("/api/v1/refresh", Some("s3cret")),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal_error");
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("no pRPC sources configured")
    );
}

#[tokio::test]
async fn test_invalid_node_filters_are_rejected() {
    let state = test_state(None);

    let (tier, body) = send(app(state.clone()), get("/api/v1/nodes?tier=legendary")).await;
    let (status, _) = send(app(state.clone()), get("/api/v1/nodes?status=sleeping")).await;
    let (limit, _) = send(app(state), get("/api/v1/nodes?limit=many")).await;

    assert_eq!(tier, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(limit, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route() {
    let (status, _) = send(app(test_state(None)), get("/api/v1/pods")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
