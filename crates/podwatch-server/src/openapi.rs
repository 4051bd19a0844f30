//! OpenAPI documentation configuration.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::dto::{
    CensorshipResponse, CountryShareDto, DecentralizationResponse, HealthComponentsDto,
    HealthResponse, IngestStatsDto, LimitQuery, NetworkHealthResponse, NetworkHistoryResponse,
    NetworkResponse, NetworkStatsResponse, NodeResponse, NodesQuery, NodesResponse,
    NotificationDto, NotificationsResponse, RefreshResponse, ServiceStatus, XScoreDto,
    XScoresResponse,
};
use crate::error::ErrorResponse;
use crate::handlers::{health, metrics, network, nodes, notifications, refresh};

/// OpenAPI documentation for the podwatch API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "podwatch API",
        version = "1.0.0",
        description = "Inventory and analytics for a pNode storage network.

podwatch discovers pNodes through pRPC gossip, enriches them with credits,
geolocation and latency, and serves ranked nodes and network-wide metrics.

## Freshness

Read endpoints serve stored rows while they are younger than the staleness
window. Older data is refreshed before answering; if that refresh fails the
stale rows are served and `source` reads `stale_cache`.

## Quick Start

1. Check server health: `GET /api/v1/health`
2. List the top nodes: `GET /api/v1/nodes?limit=10`
3. Network overview: `GET /api/v1/network`
",
        license(
            name = "Apache-2.0",
            url = "https://www.apache.org/licenses/LICENSE-2.0"
        )
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        health::health_check,
        nodes::list_nodes,
        nodes::get_node,
        network::get_network,
        network::get_network_history,
        metrics::get_decentralization,
        metrics::get_health_score,
        metrics::get_censorship_resistance,
        metrics::get_x_scores,
        notifications::list_notifications,
        refresh::trigger_refresh,
    ),
    components(
        schemas(
            // Request types
            NodesQuery,
            LimitQuery,
            // Response types
            ErrorResponse,
            HealthResponse,
            ServiceStatus,
            NodeResponse,
            NodesResponse,
            NetworkStatsResponse,
            NetworkResponse,
            NetworkHistoryResponse,
            CountryShareDto,
            DecentralizationResponse,
            HealthComponentsDto,
            NetworkHealthResponse,
            CensorshipResponse,
            XScoreDto,
            XScoresResponse,
            NotificationDto,
            NotificationsResponse,
            IngestStatsDto,
            RefreshResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "system", description = "System health"),
        (name = "nodes", description = "Ranked pNode inventory"),
        (name = "network", description = "Network aggregates and history"),
        (name = "metrics", description = "Derived decentralization and health metrics"),
        (name = "notifications", description = "Node lifecycle events"),
        (name = "admin", description = "Operations requiring the admin token"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by admin endpoints.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
