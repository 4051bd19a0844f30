//! Trait definitions for external dependencies.
//!
//! The ingestion and read paths are written against these traits so that the
//! pRPC, credits, geolocation and probe clients and the PostgreSQL store can be
//! swapped for in-memory doubles in tests.
//!
//! # Example
//!
//! ```
//! use podwatch_core::traits::{NodeStore, PodSource};
//! use podwatch_core::{AppError, NodeFilter};
//!
//! async fn seed_and_count<S, P>(source: &P, store: &S) -> Result<usize, AppError>
//! where
//!     S: NodeStore,
//!     P: PodSource,
//! {
//!     let pods = source.fetch_pods().await?;
//!     let stored = store.list_nodes(&NodeFilter::default()).await?;
//!     Ok(pods.len().max(stored.len()))
//! }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::net::IpAddr;

use chrono::{DateTime, Utc};

use crate::{AppError, GeoLocation, NetworkStats, NodeFilter, Notification, PNode, RawPod};

/// A pRPC endpoint exposing the gossip view of the network.
pub trait PodSource: Send + Sync + Clone {
    /// Endpoint this source queries, for logging.
    fn endpoint(&self) -> &str;

    /// Returns every pod the endpoint currently knows about.
    fn fetch_pods(&self) -> impl Future<Output = Result<Vec<RawPod>, AppError>> + Send;
}

/// Factory for pod sources, one per configured seed.
///
/// Separate from [`PodSource`] to keep construction synchronous.
pub trait PodSourceFactory: Send + Sync + Clone {
    type Source: PodSource;

    fn create(&self, endpoint: &str) -> Result<Self::Source, AppError>;
}

/// Feed mapping node pubkeys to credits balances.
pub trait CreditsSource: Send + Sync + Clone {
    fn fetch_credits(&self) -> impl Future<Output = Result<HashMap<String, f64>, AppError>> + Send;
}

/// Batched IP geolocation.
pub trait GeoLocator: Send + Sync + Clone {
    /// Largest batch a single request accepts.
    fn max_batch_size(&self) -> usize;

    /// Resolves a batch of at most [`GeoLocator::max_batch_size`] IPs.
    ///
    /// IPs the service could not resolve are absent from the result.
    fn locate_batch(
        &self,
        ips: &[IpAddr],
    ) -> impl Future<Output = Result<HashMap<IpAddr, GeoLocation>, AppError>> + Send;
}

/// Measures round-trip latency to a node endpoint.
pub trait LatencyProbe: Send + Sync + Clone {
    /// Returns the latency in milliseconds when the endpoint answered.
    fn probe(&self, endpoint: &str) -> impl Future<Output = Result<u32, AppError>> + Send;
}

/// Persistence for node rows, network snapshots and notifications.
pub trait NodeStore: Send + Sync + Clone {
    /// Inserts or updates every node in a single transaction.
    ///
    /// Returns the number of rows affected.
    fn upsert_nodes(&self, nodes: &[PNode]) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Marks every stored node whose pubkey is not in `present` offline.
    fn mark_absent_offline(
        &self,
        present: &[String],
        updated_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Lists stored nodes ordered by rank.
    fn list_nodes(
        &self,
        filter: &NodeFilter,
    ) -> impl Future<Output = Result<Vec<PNode>, AppError>> + Send;

    fn get_node(
        &self,
        pubkey: &str,
    ) -> impl Future<Output = Result<Option<PNode>, AppError>> + Send;

    /// `updated_at` of the most recently written row, `None` when empty.
    fn newest_update(&self) -> impl Future<Output = Result<Option<DateTime<Utc>>, AppError>> + Send;

    fn record_network_stats(
        &self,
        stats: &NetworkStats,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn latest_network_stats(
        &self,
    ) -> impl Future<Output = Result<Option<NetworkStats>, AppError>> + Send;

    /// Most recent snapshots, newest first.
    fn network_history(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<NetworkStats>, AppError>> + Send;

    fn insert_notifications(
        &self,
        notifications: &[Notification],
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Most recent notifications, newest first.
    fn recent_notifications(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Notification>, AppError>> + Send;

    fn health_check(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}
