//! podwatch REST API Server
//!
//! This binary starts the podwatch REST API server, exposing ranked pNodes,
//! network aggregates and derived metrics, and keeps the store fresh with a
//! background refresher.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use podwatch_core::{BackgroundRefresher, DbConfig, TracingReporter, load_network_config};
use podwatch_db::MIGRATOR;

use podwatch_server::{AppState, ServerConfig, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ServerConfig::parse();

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(DbConfig::from_env().max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database connection established");

    // An explicit path must exist; the default path is best effort.
    let network_config = match &config.network_config {
        Some(path) => load_network_config(Some(path.clone()))?,
        None => load_network_config(None).unwrap_or(None),
    };

    match &network_config {
        Some(cfg) => info!(
            sources = cfg.enabled_sources().len(),
            "Loaded network configuration"
        ),
        None => warn!("No network configuration found, serving stored data only"),
    }

    let shutdown_token = CancellationToken::new();

    if config.admin_token.is_none() {
        info!("PODWATCH_ADMIN_TOKEN not set, admin endpoints disabled");
    }

    let app_state = AppState::new(
        pool,
        network_config.as_ref(),
        config.admin_token.clone(),
        shutdown_token.clone(),
    )
    .context("Failed to initialize API clients")?;

    let refresher_handle = if config.refresh_interval_secs > 0 {
        let refresher = BackgroundRefresher::new(
            app_state.reader.clone(),
            Duration::from_secs(config.refresh_interval_secs),
        );
        let token = shutdown_token.clone();
        Some(tokio::spawn(async move {
            refresher.run(token, &TracingReporter).await;
        }))
    } else {
        info!("Background refresher disabled");
        None
    };

    let app = create_router(app_state, &config)?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid address")?;

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Starting podwatch API server on http://{}", addr);
    info!("Swagger UI available at http://{}/swagger-ui", addr);

    // The rate limiter keys on the peer address.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
    .await
    .context("Server error")?;

    if let Some(handle) = refresher_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "Background refresher task failed");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");

    // Stops the refresher and aborts in-flight manual refreshes.
    shutdown_token.cancel();
}
