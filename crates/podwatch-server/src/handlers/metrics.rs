//! Derived network metrics.
//!
//! Every metric is computed on demand from the current view, so it follows
//! the same freshness rules as `/nodes`.

use axum::{
    Json,
    extract::{Query, State},
};

use podwatch_core::{censorship_resistance, decentralization, health_score, x_scores};

use crate::dto::{
    CensorshipResponse, DecentralizationResponse, LimitQuery, NetworkHealthResponse, XScoreDto,
    XScoresResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_XSCORE_LIMIT: usize = 100;

/// Geographic and economic concentration of the network.
#[utoipa::path(
    get,
    path = "/api/v1/metrics/decentralization",
    responses(
        (status = 200, description = "Decentralization report", body = DecentralizationResponse),
        (status = 503, description = "No data stored and no pRPC source reachable"),
    ),
    tag = "metrics"
)]
pub async fn get_decentralization(
    State(state): State<AppState>,
) -> Result<Json<DecentralizationResponse>, ApiError> {
    let view = state.reader.view().await?;
    Ok(Json(decentralization(&view.nodes).into()))
}

/// Operational health score and grade.
#[utoipa::path(
    get,
    path = "/api/v1/metrics/health",
    responses(
        (status = 200, description = "Network health", body = NetworkHealthResponse),
        (status = 503, description = "No data stored and no pRPC source reachable"),
    ),
    tag = "metrics"
)]
pub async fn get_health_score(
    State(state): State<AppState>,
) -> Result<Json<NetworkHealthResponse>, ApiError> {
    let view = state.reader.view().await?;
    Ok(Json(health_score(&view.nodes).into()))
}

/// Censorship-resistance score and level.
#[utoipa::path(
    get,
    path = "/api/v1/metrics/censorship",
    responses(
        (status = 200, description = "Censorship resistance", body = CensorshipResponse),
        (status = 503, description = "No data stored and no pRPC source reachable"),
    ),
    tag = "metrics"
)]
pub async fn get_censorship_resistance(
    State(state): State<AppState>,
) -> Result<Json<CensorshipResponse>, ApiError> {
    let view = state.reader.view().await?;
    Ok(Json(censorship_resistance(&view.nodes).into()))
}

/// Per-node X-score leaderboard.
#[utoipa::path(
    get,
    path = "/api/v1/metrics/xscore",
    params(LimitQuery),
    responses(
        (status = 200, description = "X-scores, best first", body = XScoresResponse),
        (status = 503, description = "No data stored and no pRPC source reachable"),
    ),
    tag = "metrics"
)]
pub async fn get_x_scores(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<XScoresResponse>, ApiError> {
    let view = state.reader.view().await?;
    let scores: Vec<XScoreDto> = x_scores(&view.nodes)
        .into_iter()
        .take(query.resolve(DEFAULT_XSCORE_LIMIT))
        .map(XScoreDto::from)
        .collect();

    Ok(Json(XScoresResponse {
        count: scores.len(),
        scores,
    }))
}
