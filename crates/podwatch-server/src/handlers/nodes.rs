//! Node endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::dto::{NodeResponse, NodesQuery, NodesResponse, view_source_label};
use crate::error::ApiError;
use crate::state::AppState;

/// List ranked nodes.
///
/// Served from the store while it is fresh; a stale store is refreshed
/// before answering.
#[utoipa::path(
    get,
    path = "/api/v1/nodes",
    params(NodesQuery),
    responses(
        (status = 200, description = "Ranked nodes", body = NodesResponse),
        (status = 400, description = "Invalid filter"),
        (status = 503, description = "No data stored and no pRPC source reachable"),
    ),
    tag = "nodes"
)]
pub async fn list_nodes(
    State(state): State<AppState>,
    Query(query): Query<NodesQuery>,
) -> Result<Json<NodesResponse>, ApiError> {
    let filter = query.into_filter()?;
    let view = state.reader.view().await?;

    let nodes: Vec<NodeResponse> = view
        .nodes
        .into_iter()
        .filter(|n| filter.matches(n))
        .take(filter.limit.unwrap_or(usize::MAX))
        .map(NodeResponse::from)
        .collect();

    Ok(Json(NodesResponse {
        source: view_source_label(view.source),
        as_of: view.as_of,
        count: nodes.len(),
        nodes,
    }))
}

/// Get one node by public key.
#[utoipa::path(
    get,
    path = "/api/v1/nodes/{pubkey}",
    params(
        ("pubkey" = String, Path, description = "Node public key")
    ),
    responses(
        (status = 200, description = "Node found", body = NodeResponse),
        (status = 404, description = "Node not found"),
        (status = 503, description = "No data stored and no pRPC source reachable"),
    ),
    tag = "nodes"
)]
pub async fn get_node(
    State(state): State<AppState>,
    Path(pubkey): Path<String>,
) -> Result<Json<NodeResponse>, ApiError> {
    let node = state.reader.node(&pubkey).await?;
    Ok(Json(NodeResponse::from(node)))
}
