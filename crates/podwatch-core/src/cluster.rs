//! Staleness-checked read path over the node store.
//!
//! Reads are served from stored rows while the newest row is younger than the
//! staleness window. Once it is older, the first caller runs ingestion inline
//! while concurrent callers wait on the same refresh and then read its result
//! from the store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::ingest::IngestService;
use crate::models::{IngestReport, NetworkStats, NodeFilter, PNode};
use crate::progress::{ProgressReporter, SilentReporter};
use crate::traits::{CreditsSource, GeoLocator, LatencyProbe, NodeStore, PodSourceFactory};
use crate::AppError;

/// True when there is no stored row or the newest one is at least `window` old.
pub fn is_stale(newest: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> bool {
    match newest {
        None => true,
        Some(newest) => now
            .signed_duration_since(newest)
            .to_std()
            .map(|age| age >= window)
            .unwrap_or(false),
    }
}

/// Where the rows of a [`ClusterView`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewSource {
    /// Stored rows within the staleness window.
    Cache,
    /// Output of an ingestion run triggered by this read.
    Refreshed,
    /// Stored rows past the window, served because the refresh failed.
    StaleCache,
}

#[derive(Debug, Clone)]
pub struct ClusterView {
    /// Ranked nodes.
    pub nodes: Vec<PNode>,
    pub network: Option<NetworkStats>,
    pub source: ViewSource,
    /// `updated_at` of the newest row.
    pub as_of: Option<DateTime<Utc>>,
}

pub struct ClusterReader<S, F, C, G, P>
where
    S: NodeStore,
    F: PodSourceFactory,
    C: CreditsSource,
    G: GeoLocator,
    P: LatencyProbe,
{
    service: IngestService<S, F, C, G, P>,
    staleness_window: Duration,
    refresh_lock: Arc<Mutex<()>>,
}

impl<S, F, C, G, P> Clone for ClusterReader<S, F, C, G, P>
where
    S: NodeStore,
    F: PodSourceFactory,
    C: CreditsSource,
    G: GeoLocator,
    P: LatencyProbe,
{
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            staleness_window: self.staleness_window,
            refresh_lock: Arc::clone(&self.refresh_lock),
        }
    }
}

impl<S, F, C, G, P> ClusterReader<S, F, C, G, P>
where
    S: NodeStore,
    F: PodSourceFactory,
    C: CreditsSource,
    G: GeoLocator,
    P: LatencyProbe,
{
    /// Uses the service's configured staleness window.
    pub fn new(service: IngestService<S, F, C, G, P>) -> Self {
        let staleness_window = service.config().staleness_window;
        Self {
            service,
            staleness_window,
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    pub fn service(&self) -> &IngestService<S, F, C, G, P> {
        &self.service
    }

    pub fn store(&self) -> &S {
        self.service.store()
    }

    pub fn staleness_window(&self) -> Duration {
        self.staleness_window
    }

    pub async fn needs_refresh(&self) -> Result<bool, AppError> {
        let newest = self.store().newest_update().await?;
        Ok(is_stale(newest, Utc::now(), self.staleness_window))
    }

    async fn cached_view(&self, source: ViewSource) -> Result<ClusterView, AppError> {
        let nodes = self.store().list_nodes(&NodeFilter::default()).await?;
        let network = self.store().latest_network_stats().await?;
        let as_of = nodes.iter().map(|n| n.updated_at).max();
        Ok(ClusterView {
            nodes,
            network,
            source,
            as_of,
        })
    }

    /// Current nodes, refreshing inline when the store is stale.
    ///
    /// A failed refresh falls back to the stale rows, and only propagates the
    /// error when nothing is stored.
    pub async fn view(&self) -> Result<ClusterView, AppError> {
        if !self.needs_refresh().await? {
            return self.cached_view(ViewSource::Cache).await;
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if !self.needs_refresh().await? {
            return self.cached_view(ViewSource::Cache).await;
        }

        match self.service.run().await {
            Ok(report) => Ok(ClusterView {
                as_of: Some(report.started_at),
                network: Some(report.network),
                nodes: report.nodes,
                source: ViewSource::Refreshed,
            }),
            Err(e) => {
                let stale = self.cached_view(ViewSource::StaleCache).await?;
                if stale.nodes.is_empty() {
                    return Err(e);
                }
                tracing::warn!(
                    error = %e,
                    cached_nodes = stale.nodes.len(),
                    "Refresh failed, serving stale rows"
                );
                Ok(stale)
            }
        }
    }

    /// Runs ingestion regardless of staleness.
    ///
    /// Concurrent calls are serialized, so they never ingest in parallel.
    pub async fn refresh(&self) -> Result<IngestReport, AppError> {
        self.refresh_with_progress(&SilentReporter).await
    }

    pub async fn refresh_with_progress<R: ProgressReporter>(
        &self,
        reporter: &R,
    ) -> Result<IngestReport, AppError> {
        let _guard = self.refresh_lock.lock().await;
        self.service.run_with_progress(reporter).await
    }

    /// One node, under the same freshness rules as [`ClusterReader::view`].
    pub async fn node(&self, pubkey: &str) -> Result<PNode, AppError> {
        let view = self.view().await?;
        if let Some(node) = view.nodes.into_iter().find(|n| n.pubkey == pubkey) {
            return Ok(node);
        }
        // Rows marked offline by the last refresh are not in its output.
        self.store()
            .get_node(pubkey)
            .await?
            .ok_or_else(|| AppError::NodeNotFound(pubkey.to_string()))
    }
}
