//! Ingestion service: gossip view in, ranked and enriched node rows out.
//!
//! # Pipeline
//!
//! 1. Fetch pods from every configured pRPC seed concurrently
//! 2. Deduplicate by pubkey
//! 3. Fetch credits (a failure scores every node 0)
//! 4. Geolocate unique IPs through the [`GeoBatcher`]
//! 5. Probe latency through the [`LatencyProber`]
//! 6. Score, tier and rank the nodes
//! 7. Snapshot the previously stored rows
//! 8. Upsert the rows in one transaction and mark absent rows offline
//! 9. Record network aggregates
//! 10. Write notifications diffed against the snapshot
//!
//! Only a failure to reach every seed (1) or to write the rows (8) fails the
//! run; every other step degrades and is reported as
//! [`IngestEvent::StepSkipped`].
//!
//! # Example
//!
//! ```ignore
//! use podwatch_core::{IngestConfig, IngestService, TracingReporter};
//!
//! let service = IngestService::with_config(repo, rpc_factory, credits, geo, probe, config);
//! let report = service.run_with_progress(&TracingReporter).await?;
//! println!("{} nodes, {} online", report.nodes.len(), report.network.online_nodes);
//! ```

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::Utc;
use futures::future::join_all;

use crate::config::IngestConfig;
use crate::geo::GeoBatcher;
use crate::latency::LatencyProber;
use crate::models::{
    IngestReport, IngestStats, NodeFilter, NodeStatus, PNode, PerformanceTier, RawPod,
};
use crate::network::compute_network_stats;
use crate::notify::diff_notifications;
use crate::progress::{IngestEvent, ProgressReporter, SilentReporter};
use crate::scoring::{dedupe_by_pubkey, max_credits, performance_score, rank_by_credits};
use crate::traits::{
    CreditsSource, GeoLocator, LatencyProbe, NodeStore, PodSource, PodSourceFactory,
};
use crate::AppError;

/// Service running the ingestion pipeline.
///
/// # Type Parameters
///
/// * `S` - node store (e.g. `NodeRepository`)
/// * `F` - pRPC source factory
/// * `C` - credits feed
/// * `G` - geolocation service
/// * `P` - latency probe
///
/// Geolocation and latency caches live in the service, so they persist
/// across runs of the same instance and its clones.
pub struct IngestService<S, F, C, G, P>
where
    S: NodeStore,
    F: PodSourceFactory,
    C: CreditsSource,
    G: GeoLocator,
    P: LatencyProbe,
{
    store: S,
    sources: F,
    credits: C,
    geo: GeoBatcher<G>,
    prober: LatencyProber<P>,
    config: IngestConfig,
}

impl<S, F, C, G, P> Clone for IngestService<S, F, C, G, P>
where
    S: NodeStore,
    F: PodSourceFactory,
    C: CreditsSource,
    G: GeoLocator,
    P: LatencyProbe,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            sources: self.sources.clone(),
            credits: self.credits.clone(),
            geo: self.geo.clone(),
            prober: self.prober.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S, F, C, G, P> IngestService<S, F, C, G, P>
where
    S: NodeStore,
    F: PodSourceFactory,
    C: CreditsSource,
    G: GeoLocator,
    P: LatencyProbe,
{
    /// Creates a service with default tunables and no seeds.
    pub fn new(store: S, sources: F, credits: C, locator: G, probe: P) -> Self {
        Self::with_config(store, sources, credits, locator, probe, IngestConfig::default())
    }

    pub fn with_config(
        store: S,
        sources: F,
        credits: C,
        locator: G,
        probe: P,
        config: IngestConfig,
    ) -> Self {
        let geo = GeoBatcher::new(
            locator,
            config.geo_batch_size,
            config.geo_cache_ttl,
            config.circuit_breaker.clone(),
        )
        .with_cache_capacity(config.cache_capacity);
        let prober = LatencyProber::new(
            probe,
            config.probe_concurrency,
            config.probe_timeout,
            config.latency_cache_ttl,
        )
        .with_cache_capacity(config.cache_capacity);
        Self {
            store,
            sources,
            credits,
            geo,
            prober,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn geo(&self) -> &GeoBatcher<G> {
        &self.geo
    }

    pub fn prober(&self) -> &LatencyProber<P> {
        &self.prober
    }

    /// Runs the pipeline once without progress reporting.
    pub async fn run(&self) -> Result<IngestReport, AppError> {
        self.run_with_progress(&SilentReporter).await
    }

    /// Runs the pipeline once, emitting an [`IngestEvent`] per stage.
    ///
    /// # Errors
    ///
    /// * [`AppError::ConfigError`] when no seeds are configured
    /// * [`AppError::SourcesUnavailable`] when every seed failed
    /// * the store error when the upsert fails
    pub async fn run_with_progress<R: ProgressReporter>(
        &self,
        reporter: &R,
    ) -> Result<IngestReport, AppError> {
        let started_at = Utc::now();
        let mut stats = IngestStats::default();

        if self.config.seeds.is_empty() {
            return Err(AppError::ConfigError(
                "no pRPC sources configured".to_string(),
            ));
        }
        reporter.report(IngestEvent::Started {
            sources: self.config.seeds.len(),
        });

        let purged = self.geo.cache().purge_expired() + self.prober.cache().purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "Dropped expired geolocation and latency entries");
        }

        // 1. Gossip view from every seed, in seed order.
        let raw = self.fetch_all_sources(reporter, &mut stats).await?;
        stats.fetched = raw.len();

        // 2. Deduplicate.
        let (pods, duplicates) = dedupe_by_pubkey(raw);
        stats.unique = pods.len();
        stats.duplicates = duplicates;
        reporter.report(IngestEvent::Deduplicated {
            unique: stats.unique,
            duplicates,
        });

        // 3. Credits.
        let credits = match self.credits.fetch_credits().await {
            Ok(credits) => {
                reporter.report(IngestEvent::CreditsFetched {
                    entries: credits.len(),
                });
                credits
            }
            Err(e) => {
                let msg = e.to_string();
                reporter.report(IngestEvent::CreditsUnavailable { error: &msg });
                HashMap::new()
            }
        };

        // 4-5. Enrichment.
        let ips: Vec<Option<IpAddr>> = pods.iter().map(RawPod::ip).collect();

        let locations = self.geo.locate(ips.iter().flatten().copied()).await;
        stats.geolocated = locations.len();
        reporter.report(IngestEvent::Geolocated {
            resolved: locations.len(),
            requested: ips.iter().flatten().count(),
        });

        let targets = pods
            .iter()
            .zip(&ips)
            .filter_map(|(pod, ip)| Some(((*ip)?, pod.probe_endpoint()?)));
        let latencies = self.prober.probe_all(targets).await;
        stats.probed = latencies.len();
        stats.reachable = latencies.values().filter(|l| l.is_some()).count();
        reporter.report(IngestEvent::LatencyProbed {
            reachable: stats.reachable,
            probed: stats.probed,
        });

        // 6. Score and rank.
        let network_max = max_credits(pods.iter().filter_map(|p| credits.get(&p.pubkey)));
        let online_threshold = chrono::Duration::from_std(self.config.online_threshold)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));

        let mut nodes: Vec<PNode> = pods
            .iter()
            .zip(&ips)
            .map(|(pod, ip)| {
                let node_credits = credits.get(&pod.pubkey).copied();
                if node_credits.is_some() {
                    stats.with_credits += 1;
                }
                let node_credits = node_credits.filter(|c| c.is_finite()).unwrap_or(0.0);
                let score = performance_score(node_credits, network_max);
                let location = ip.and_then(|ip| locations.get(&ip));
                let last_seen = pod.last_seen();

                PNode {
                    pubkey: pod.pubkey.clone(),
                    ip: ip
                        .map(|ip| ip.to_string())
                        .unwrap_or_else(|| pod.address.clone()),
                    port: pod.gossip_port(),
                    version: pod.version.clone().filter(|v| !v.is_empty()),
                    status: NodeStatus::from_last_seen(last_seen, started_at, online_threshold),
                    last_seen,
                    credits: node_credits,
                    score,
                    tier: PerformanceTier::from_score(score),
                    rank: 0,
                    latency_ms: ip.and_then(|ip| latencies.get(&ip).copied().flatten()),
                    country: location.map(|l| l.country.clone()),
                    country_code: location.map(|l| l.country_code.clone()),
                    city: location.and_then(|l| l.city.clone()),
                    latitude: location.map(|l| l.latitude),
                    longitude: location.map(|l| l.longitude),
                    storage_committed: pod.storage_committed.unwrap_or(0),
                    storage_used: pod.storage_used.unwrap_or(0),
                    uptime_secs: pod.uptime.unwrap_or(0),
                    is_public: pod.is_public.unwrap_or(false),
                    updated_at: started_at,
                }
            })
            .collect();
        rank_by_credits(&mut nodes);

        // 7. Snapshot for the notification diff.
        let everything = NodeFilter {
            include_absent: true,
            ..Default::default()
        };
        let previous = match self.store.list_nodes(&everything).await {
            Ok(previous) => Some(previous),
            Err(e) => {
                let msg = e.to_string();
                reporter.report(IngestEvent::StepSkipped {
                    step: "snapshot",
                    error: &msg,
                });
                None
            }
        };

        // 8. Persist.
        stats.upserted = self.store.upsert_nodes(&nodes).await?;
        let present: Vec<String> = nodes.iter().map(|n| n.pubkey.clone()).collect();
        match self.store.mark_absent_offline(&present, started_at).await {
            Ok(n) => stats.marked_offline = n,
            Err(e) => {
                let msg = e.to_string();
                reporter.report(IngestEvent::StepSkipped {
                    step: "mark_absent_offline",
                    error: &msg,
                });
            }
        }
        reporter.report(IngestEvent::NodesStored {
            upserted: stats.upserted,
            marked_offline: stats.marked_offline,
        });

        // 9. Aggregates.
        let network = compute_network_stats(&nodes, Utc::now());
        if let Err(e) = self.store.record_network_stats(&network).await {
            let msg = e.to_string();
            reporter.report(IngestEvent::StepSkipped {
                step: "record_network_stats",
                error: &msg,
            });
        }

        // 10. Notifications.
        if let Some(previous) = previous {
            let notifications = diff_notifications(&previous, &nodes, started_at);
            if !notifications.is_empty() {
                match self.store.insert_notifications(&notifications).await {
                    Ok(n) => {
                        stats.notifications = n;
                        reporter.report(IngestEvent::NotificationsWritten { count: n });
                    }
                    Err(e) => {
                        let msg = e.to_string();
                        reporter.report(IngestEvent::StepSkipped {
                            step: "notifications",
                            error: &msg,
                        });
                    }
                }
            }
        }

        reporter.report(IngestEvent::Completed { stats: &stats });

        Ok(IngestReport {
            nodes,
            network,
            stats,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn fetch_all_sources<R: ProgressReporter>(
        &self,
        reporter: &R,
        stats: &mut IngestStats,
    ) -> Result<Vec<RawPod>, AppError> {
        let results = join_all(self.config.seeds.iter().map(|endpoint| async move {
            let source = self.sources.create(endpoint)?;
            source.fetch_pods().await
        }))
        .await;

        let mut pods = Vec::new();
        let mut failures = Vec::new();

        for (endpoint, result) in self.config.seeds.iter().zip(results) {
            match result {
                Ok(fetched) => {
                    stats.sources_ok += 1;
                    reporter.report(IngestEvent::SourceFetched {
                        endpoint,
                        pods: fetched.len(),
                    });
                    pods.extend(fetched);
                }
                Err(e) => {
                    stats.sources_failed += 1;
                    let msg = e.to_string();
                    reporter.report(IngestEvent::SourceFailed {
                        endpoint,
                        error: &msg,
                    });
                    failures.push(format!("{}: {}", endpoint, msg));
                }
            }
        }

        if stats.sources_ok == 0 {
            return Err(AppError::SourcesUnavailable(failures.join("; ")));
        }

        Ok(pods)
    }
}
