//! podwatch core - domain types, ingestion pipeline and network metrics.
//!
//! This crate provides the core functionality for podwatch, including:
//!
//! - **Domain models**: [`RawPod`], [`PNode`], [`NetworkStats`], [`Notification`]
//! - **Pure logic**: scoring and ranking ([`scoring`]), network aggregates
//!   ([`network`]), notification diffs ([`notify`]) and derived metrics
//!   ([`metrics`])
//! - **Services**: [`IngestService`] for the ingestion pipeline,
//!   [`ClusterReader`] for the staleness-checked read path,
//!   [`BackgroundRefresher`] for periodic refresh
//! - **Traits**: [`PodSource`], [`CreditsSource`], [`GeoLocator`],
//!   [`LatencyProbe`] and [`NodeStore`] for dependency injection
//! - **Progress reporting**: [`ProgressReporter`] trait for decoupled logging
//!
//! # Architecture
//!
//! I/O lives behind traits implemented in `podwatch-client` (HTTP) and
//! `podwatch-db` (PostgreSQL); the CLI and the REST server both compose the
//! same services.
//!
//! # Example
//!
//! ```ignore
//! use podwatch_core::{ClusterReader, IngestConfig, IngestService};
//!
//! let config = IngestConfig::from_env().with_seeds(network.seed_urls());
//! let service = IngestService::with_config(repo, rpc, credits, geo, probe, config);
//! let reader = ClusterReader::new(service);
//!
//! let view = reader.view().await?;
//! println!("{} nodes ({:?})", view.nodes.len(), view.source);
//! ```

pub mod cache;
pub mod circuit_breaker;
pub mod cluster;
pub mod config;
pub mod error;
pub mod geo;
pub mod ingest;
pub mod latency;
pub mod metrics;
pub mod models;
pub mod network;
pub mod notify;
pub mod progress;
pub mod refresher;
pub mod scoring;
pub mod traits;

// Caching and resilience
pub use cache::{DEFAULT_CACHE_CAPACITY, TtlCache};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

// Configuration
pub use config::{
    DbConfig, HttpConfig, IngestConfig, NetworkConfig, SourceEntry, default_config_path,
    load_network_config,
};

// Error handling
pub use error::AppError;

// Domain models
pub use models::{
    GeoLocation, IngestReport, IngestStats, NetworkStats, NodeFilter, NodeStatus, Notification,
    NotificationKind, PNode, PerformanceTier, RawPod,
};

// Metrics
pub use metrics::{
    CensorshipResistance, DecentralizationReport, HealthGrade, HealthScore, ResistanceLevel,
    XScore, censorship_resistance, decentralization, health_score, x_scores,
};

// Progress reporting
pub use progress::{IngestEvent, ProgressReporter, SilentReporter, TracingReporter};

// Traits for dependency injection
pub use traits::{CreditsSource, GeoLocator, LatencyProbe, NodeStore, PodSource, PodSourceFactory};

// Services (generic over trait implementations)
pub use cluster::{ClusterReader, ClusterView, ViewSource};
pub use geo::GeoBatcher;
pub use ingest::IngestService;
pub use latency::LatencyProber;
pub use refresher::BackgroundRefresher;
