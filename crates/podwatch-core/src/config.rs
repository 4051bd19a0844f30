//! Configuration types for podwatch components.
//!
//! Runtime tunables come from environment variables (see the `from_env`
//! constructors); the list of pRPC seeds and external API endpoints lives in
//! `network.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::AppError;

/// Default credits API endpoint.
pub const DEFAULT_CREDITS_URL: &str = "https://podcredits.xandeum.network/api/pods-credits";

/// Default ip-api batch endpoint.
pub const DEFAULT_GEOLOCATION_URL: &str = "http://ip-api.com/batch";

fn env_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

/// Database connection pool configuration.
pub struct DbConfig {
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

impl DbConfig {
    /// Reads `DB_MAX_CONNECTIONS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            max_connections: env_parse::<u32>(&lookup, "DB_MAX_CONNECTIONS")
                .filter(|v| *v > 0)
                .unwrap_or(Self::default().max_connections),
        }
    }
}

/// HTTP client configuration for external API calls.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// Tunables for one ingestion run and the read path in front of it.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// pRPC seed endpoints queried for the gossip view.
    pub seeds: Vec<String>,
    /// Age of the newest row after which cached data is re-ingested.
    pub staleness_window: Duration,
    pub probe_concurrency: usize,
    pub probe_timeout: Duration,
    pub latency_cache_ttl: Duration,
    /// IPs per geolocation request. The effective size is
    /// `min(this, locator.max_batch_size())`.
    pub geo_batch_size: usize,
    pub geo_cache_ttl: Duration,
    /// Upper bound on IPs memoized by each of the geolocation and latency
    /// caches.
    pub cache_capacity: usize,
    /// Nodes seen within this window are reported online.
    pub online_threshold: Duration,
    /// Circuit breaker around geolocation chunks.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            staleness_window: Duration::from_secs(300),
            probe_concurrency: 20,
            probe_timeout: Duration::from_secs(3),
            latency_cache_ttl: Duration::from_secs(300),
            geo_batch_size: 100,
            geo_cache_ttl: Duration::from_secs(24 * 60 * 60),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            online_threshold: Duration::from_secs(300),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Defaults overridden by `INGEST_STALENESS_SECS`,
    /// `INGEST_PROBE_CONCURRENCY`, `INGEST_PROBE_TIMEOUT_MS`,
    /// `INGEST_GEO_BATCH_SIZE`, `INGEST_CACHE_CAPACITY` and the `CB_*`
    /// variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            staleness_window: env_parse::<u64>(&lookup, "INGEST_STALENESS_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.staleness_window),
            probe_concurrency: env_parse::<usize>(&lookup, "INGEST_PROBE_CONCURRENCY")
                .map(|v| v.max(1))
                .unwrap_or(defaults.probe_concurrency),
            probe_timeout: env_parse::<u64>(&lookup, "INGEST_PROBE_TIMEOUT_MS")
                .filter(|v| *v > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.probe_timeout),
            geo_batch_size: env_parse::<usize>(&lookup, "INGEST_GEO_BATCH_SIZE")
                .map(|v| v.max(1))
                .unwrap_or(defaults.geo_batch_size),
            cache_capacity: env_parse::<usize>(&lookup, "INGEST_CACHE_CAPACITY")
                .map(|v| v.max(1))
                .unwrap_or(defaults.cache_capacity),
            circuit_breaker: CircuitBreakerConfig::from_lookup(&lookup),
            ..defaults
        }
    }

    pub fn with_seeds(mut self, seeds: Vec<String>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    pub fn with_probe_concurrency(mut self, concurrency: usize) -> Self {
        self.probe_concurrency = concurrency.max(1);
        self
    }

    pub fn with_geo_batch_size(mut self, size: usize) -> Self {
        self.geo_batch_size = size.max(1);
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity.max(1);
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }
}

// =============================================================================
// Network Configuration (network.toml)
// =============================================================================

fn default_enabled() -> bool {
    true
}

/// Root configuration structure for network.toml.
///
/// # Example
///
/// ```toml
/// credits_url = "https://podcredits.xandeum.network/api/pods-credits"
///
/// [[sources]]
/// name = "seed-1"
/// url = "http://10.0.0.5:6000/rpc"
/// description = "Bootstrap node"
///
/// [[sources]]
/// name = "local"
/// url = "http://127.0.0.1:6000/rpc"
/// enabled = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
    pub credits_url: Option<String>,
    pub geolocation_url: Option<String>,
}

impl NetworkConfig {
    pub fn enabled_sources(&self) -> Vec<&SourceEntry> {
        self.sources.iter().filter(|s| s.enabled).collect()
    }

    /// Case-insensitive lookup by source name.
    pub fn find_by_name(&self, name: &str) -> Option<&SourceEntry> {
        self.sources
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// URLs of the enabled sources, in file order.
    pub fn seed_urls(&self) -> Vec<String> {
        self.enabled_sources()
            .into_iter()
            .map(|s| s.url.clone())
            .collect()
    }

    pub fn credits_url(&self) -> &str {
        self.credits_url.as_deref().unwrap_or(DEFAULT_CREDITS_URL)
    }

    pub fn geolocation_url(&self) -> &str {
        self.geolocation_url
            .as_deref()
            .unwrap_or(DEFAULT_GEOLOCATION_URL)
    }
}

/// A pRPC seed in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    pub name: String,
    /// JSON-RPC endpoint, e.g. `http://host:6000/rpc`.
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub description: Option<String>,
}

pub const CONFIG_FILE_NAME: &str = "network.toml";

/// `~/.config/podwatch/`
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("podwatch"))
}

/// `~/.config/podwatch/network.toml`
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join(CONFIG_FILE_NAME))
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# podwatch network configuration
#
# Usage:
#   podwatch ingest         # Query every enabled source once
#   podwatch nodes          # Show ranked nodes, refreshing when stale
#
# Every enabled source is queried concurrently and the results are merged
# by pubkey. Set enabled = false to skip a seed.

# credits_url = "https://podcredits.xandeum.network/api/pods-credits"
# geolocation_url = "http://ip-api.com/batch"

[[sources]]
name = "local"
url = "http://127.0.0.1:6000/rpc"
description = "pNode running on this host"

# [[sources]]
# name = "seed-1"
# url = "http://<seed-ip>:6000/rpc"
# description = "Public bootstrap node"
"#;

/// Load the network configuration from a TOML file.
///
/// * `Ok(Some(config))` - loaded
/// * `Ok(None)` - no file at the default path and none could be created
/// * `Err(e)` - an explicit path is missing, or the file is invalid
///
/// When the default path has no file yet, a template is written there and
/// then read back.
pub fn load_network_config(path: Option<PathBuf>) -> Result<Option<NetworkConfig>, AppError> {
    let using_default_path = path.is_none();
    let config_path = match path.or_else(default_config_path) {
        Some(p) => p,
        None => return Ok(None),
    };

    if !config_path.exists() {
        if !using_default_path {
            return Err(AppError::ConfigError(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }
        if let Err(e) = create_default_config(&config_path) {
            tracing::warn!("Could not create default config template: {}", e);
            return Ok(None);
        }
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        AppError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    let config: NetworkConfig = toml::from_str(&content).map_err(|e| {
        AppError::ConfigError(format!(
            "Invalid TOML in '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    Ok(Some(config))
}

fn create_default_config(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    tracing::info!("Created default config template at: {}", path.display());

    Ok(())
}
