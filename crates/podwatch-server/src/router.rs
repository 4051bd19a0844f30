//! Router configuration and route composition.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::require_admin_token;
use crate::config::ServerConfig;
use crate::handlers::{health, metrics, network, nodes, notifications, refresh};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Routes under `/api/v1`, without the outer middleware stack.
pub fn api_routes(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/nodes", get(nodes::list_nodes))
        .route("/nodes/:pubkey", get(nodes::get_node))
        .route("/network", get(network::get_network))
        .route("/network/history", get(network::get_network_history))
        .route(
            "/metrics/decentralization",
            get(metrics::get_decentralization),
        )
        .route("/metrics/health", get(metrics::get_health_score))
        .route(
            "/metrics/censorship",
            get(metrics::get_censorship_resistance),
        )
        .route("/metrics/xscore", get(metrics::get_x_scores))
        .route("/notifications", get(notifications::list_notifications));

    let protected_routes = Router::new()
        .route("/refresh", post(refresh::trigger_refresh))
        .layer(middleware::from_fn_with_state(state, require_admin_token));

    public_routes.merge(protected_routes)
}

/// Creates the main application router with all routes and middleware.
///
/// The rate limiter keys on the peer address, so the router must be served
/// with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn create_router(state: AppState, config: &ServerConfig) -> anyhow::Result<Router> {
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit_rps.max(1).into())
            .burst_size(config.rate_limit_burst.max(1))
            .finish()
            .context("Invalid rate limit configuration")?,
    );

    let cors_layer = build_cors_layer(&config.cors_origins);

    Ok(Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Bottom layers run first.
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .layer(GovernorLayer {
            config: governor_config,
        })
        .with_state(state))
}

/// If `origins` is "*", any origin is allowed. Otherwise a comma-separated list.
fn build_cors_layer(origins: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600));

    if origins.trim() == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let allowed: Vec<HeaderValue> = origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        cors.allow_origin(allowed)
    }
}
