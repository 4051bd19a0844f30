//! Network aggregate endpoints.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;

use podwatch_core::network::compute_network_stats;

use crate::dto::{
    LimitQuery, NetworkHistoryResponse, NetworkResponse, NetworkStatsResponse, view_source_label,
};
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 24;

/// Get the current network aggregate.
#[utoipa::path(
    get,
    path = "/api/v1/network",
    responses(
        (status = 200, description = "Network statistics", body = NetworkResponse),
        (status = 503, description = "No data stored and no pRPC source reachable"),
    ),
    tag = "network"
)]
pub async fn get_network(State(state): State<AppState>) -> Result<Json<NetworkResponse>, ApiError> {
    let view = state.reader.view().await?;

    // No snapshot recorded yet: aggregate the stored rows directly.
    let network = match view.network {
        Some(stats) => stats,
        None => compute_network_stats(&view.nodes, view.as_of.unwrap_or_else(Utc::now)),
    };

    Ok(Json(NetworkResponse {
        source: view_source_label(view.source),
        as_of: view.as_of,
        network: network.into(),
    }))
}

/// Get recorded network snapshots, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/network/history",
    params(LimitQuery),
    responses(
        (status = 200, description = "Network snapshots", body = NetworkHistoryResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "network"
)]
pub async fn get_network_history(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<NetworkHistoryResponse>, ApiError> {
    let snapshots = state
        .repo
        .network_history(query.resolve(DEFAULT_HISTORY_LIMIT))
        .await?;

    Ok(Json(NetworkHistoryResponse {
        count: snapshots.len(),
        snapshots: snapshots
            .into_iter()
            .map(NetworkStatsResponse::from)
            .collect(),
    }))
}
