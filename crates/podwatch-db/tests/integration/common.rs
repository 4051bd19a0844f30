//! Test utilities for integration tests.
//!
//! Provides helper functions to set up isolated PostgreSQL containers
//! migrated with the embedded schema.

use chrono::{DateTime, Utc};
use podwatch_core::{NodeStatus, PNode, PerformanceTier};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// Sets up a PostgreSQL container and returns a migrated connection pool.
///
/// The container is cleaned up when the returned `ContainerAsync` is dropped,
/// so keep it alive for the test duration.
pub async fn setup_test_db() -> (PgPool, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16-alpine")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "postgres")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

    // The server restarts once after initdb, so early connects can fail.
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!(
                        "Failed to connect to database after {} retries: {}",
                        MAX_RETRIES, e
                    );
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    podwatch_db::MIGRATOR
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    (pool, container)
}

/// Creates an online node row with the given rank.
pub fn sample_node(pubkey: &str, rank: u32, updated_at: DateTime<Utc>) -> PNode {
    PNode {
        pubkey: pubkey.to_string(),
        ip: format!("203.0.113.{}", rank),
        port: 9001,
        version: Some("0.8.0".to_string()),
        status: NodeStatus::Online,
        last_seen: updated_at,
        credits: 100.0 / f64::from(rank),
        score: 100.0 / f64::from(rank),
        tier: PerformanceTier::from_score(100.0 / f64::from(rank)),
        rank,
        latency_ms: Some(20 + rank),
        country: Some("Germany".to_string()),
        country_code: Some("DE".to_string()),
        city: None,
        latitude: Some(50.47),
        longitude: Some(12.37),
        storage_committed: 10_000_000_000,
        storage_used: 1_000,
        uptime_secs: 86_400,
        is_public: true,
        updated_at,
    }
}
