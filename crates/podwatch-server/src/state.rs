use tokio_util::sync::CancellationToken;

use podwatch_client::{CreditsClient, HttpLatencyProbe, IpApiClient, PodRpcFactory};
use podwatch_core::{AppError, ClusterReader, HttpConfig, IngestConfig, IngestService, NetworkConfig};
use podwatch_db::NodeRepository;

/// The production read path: PostgreSQL store in front of the live pRPC,
/// credits, ip-api and HEAD-probe clients.
pub type Reader =
    ClusterReader<NodeRepository, PodRpcFactory, CreditsClient, IpApiClient, HttpLatencyProbe>;

/// Shared application state for all handlers.
///
/// Cloned per request by Axum; every field is cheap to clone (pool and
/// service internals sit behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Staleness-checked reads and single-flight refreshes
    pub reader: Reader,

    /// Direct store access for history and notifications
    pub repo: NodeRepository,

    /// Bearer token guarding admin endpoints; `None` disables them
    pub admin_token: Option<String>,

    /// Cancellation token for graceful shutdown
    pub shutdown_token: CancellationToken,
}

impl AppState {
    /// Builds the ingestion stack from the network configuration.
    ///
    /// Without a configuration file no seeds are known, so reads only serve
    /// what is already stored and refreshes fail with a configuration error.
    pub fn new(
        pool: sqlx::PgPool,
        network_config: Option<&NetworkConfig>,
        admin_token: Option<String>,
        shutdown_token: CancellationToken,
    ) -> Result<Self, AppError> {
        let http_config = HttpConfig::default();
        let ingest_config = IngestConfig::from_env()
            .with_seeds(network_config.map(NetworkConfig::seed_urls).unwrap_or_default());

        let credits_url = network_config
            .map(NetworkConfig::credits_url)
            .unwrap_or(podwatch_core::config::DEFAULT_CREDITS_URL);
        let geolocation_url = network_config
            .map(NetworkConfig::geolocation_url)
            .unwrap_or(podwatch_core::config::DEFAULT_GEOLOCATION_URL);

        let repo = NodeRepository::new(pool);
        let service = IngestService::with_config(
            repo.clone(),
            PodRpcFactory::new(&http_config)?,
            CreditsClient::new(credits_url, &http_config)?,
            IpApiClient::new(geolocation_url, &http_config)?,
            HttpLatencyProbe::new(ingest_config.probe_timeout)?,
            ingest_config,
        );

        Ok(Self {
            reader: ClusterReader::new(service),
            repo,
            admin_token: admin_token.filter(|t| !t.is_empty()),
            shutdown_token,
        })
    }
}
