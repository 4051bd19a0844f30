//! Background refresh loop keeping the store within its staleness window.
//!
//! ```ignore
//! use podwatch_core::refresher::BackgroundRefresher;
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let refresher = BackgroundRefresher::new(reader.clone(), Duration::from_secs(60));
//! tokio::spawn(async move { refresher.run(cancel, &TracingReporter).await });
//! ```

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cluster::ClusterReader;
use crate::progress::ProgressReporter;
use crate::traits::{CreditsSource, GeoLocator, LatencyProbe, NodeStore, PodSourceFactory};

/// Polls the store every `interval` and refreshes it when stale.
pub struct BackgroundRefresher<S, F, C, G, P>
where
    S: NodeStore,
    F: PodSourceFactory,
    C: CreditsSource,
    G: GeoLocator,
    P: LatencyProbe,
{
    reader: ClusterReader<S, F, C, G, P>,
    interval: Duration,
}

impl<S, F, C, G, P> BackgroundRefresher<S, F, C, G, P>
where
    S: NodeStore,
    F: PodSourceFactory,
    C: CreditsSource,
    G: GeoLocator,
    P: LatencyProbe,
{
    pub fn new(reader: ClusterReader<S, F, C, G, P>, interval: Duration) -> Self {
        Self {
            reader,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// Checks once and refreshes if needed. Returns true when a refresh ran
    /// and succeeded.
    pub async fn tick<R: ProgressReporter>(&self, reporter: &R) -> bool {
        match self.reader.needs_refresh().await {
            Ok(false) => {
                debug!("Store fresh, skipping refresh");
                false
            }
            Ok(true) => match self.reader.refresh_with_progress(reporter).await {
                Ok(report) => {
                    info!(
                        nodes = report.nodes.len(),
                        online = report.network.online_nodes,
                        "Background refresh completed"
                    );
                    true
                }
                Err(e) => {
                    error!(error = %e, "Background refresh failed, retrying next tick");
                    false
                }
            },
            Err(e) => {
                error!(error = %e, "Failed to check store freshness");
                false
            }
        }
    }

    /// Runs until `cancel_token` is cancelled.
    pub async fn run<R: ProgressReporter>(&self, cancel_token: CancellationToken, reporter: &R) {
        info!(interval_secs = self.interval.as_secs(), "Background refresher started");

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = self.tick(reporter) => {}
                _ = cancel_token.cancelled() => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancel_token.cancelled() => break,
            }
        }

        info!("Background refresher stopped");
    }
}
