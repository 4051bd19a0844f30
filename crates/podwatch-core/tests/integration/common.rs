//! Test utilities and mock implementations for integration tests.
//!
//! Provides in-memory implementations of the core traits for testing
//! `IngestService` and `ClusterReader` in isolation.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use podwatch_core::traits::{
    CreditsSource, GeoLocator, LatencyProbe, NodeStore, PodSource, PodSourceFactory,
};
use podwatch_core::{
    AppError, GeoLocation, IngestConfig, IngestEvent, IngestService, NetworkStats, NodeFilter,
    NodeStatus, Notification, PNode, PerformanceTier, ProgressReporter, RawPod,
};

pub const SEED_A: &str = "http://seed-a.test:6000/rpc";
pub const SEED_B: &str = "http://seed-b.test:6000/rpc";

/// Builds a pod seen `age_secs` ago at a public address.
pub fn pod(pubkey: &str, last_octet: u8, age_secs: i64) -> RawPod {
    RawPod {
        pubkey: pubkey.to_string(),
        address: format!("8.8.4.{}:9001", last_octet),
        version: Some("0.8.0".to_string()),
        last_seen_timestamp: Utc::now().timestamp() - age_secs,
        is_public: Some(true),
        rpc_port: Some(6000),
        storage_committed: Some(1_000),
        storage_used: Some(250),
        storage_usage_percent: Some(25.0),
        uptime: Some(3_600),
    }
}

/// A stored row, as if written by an earlier run at `updated_at`.
pub fn stored_node(pubkey: &str, rank: u32, updated_at: DateTime<Utc>) -> PNode {
    PNode {
        pubkey: pubkey.to_string(),
        ip: "8.8.4.200".to_string(),
        port: 9001,
        version: Some("0.7.3".to_string()),
        status: NodeStatus::Online,
        last_seen: updated_at,
        credits: 10.0,
        score: 50.0,
        tier: PerformanceTier::Fair,
        rank,
        latency_ms: Some(40),
        country: Some("Germany".to_string()),
        country_code: Some("DE".to_string()),
        city: Some("Berlin".to_string()),
        latitude: Some(52.52),
        longitude: Some(13.40),
        storage_committed: 1_000,
        storage_used: 100,
        uptime_secs: 60,
        is_public: true,
        updated_at,
    }
}

pub fn config(seeds: &[&str]) -> IngestConfig {
    IngestConfig::default().with_seeds(seeds.iter().map(|s| s.to_string()).collect())
}

pub type TestService =
    IngestService<MockNodeStore, MockPodSourceFactory, MockCredits, MockGeoLocator, MockProbe>;

/// Service over fresh mocks; the mocks are returned for arranging and asserting.
pub fn service(
    seeds: &[&str],
) -> (
    TestService,
    MockNodeStore,
    MockPodSourceFactory,
    MockCredits,
) {
    let store = MockNodeStore::new();
    let sources = MockPodSourceFactory::new();
    let credits = MockCredits::new();
    let service = IngestService::with_config(
        store.clone(),
        sources.clone(),
        credits.clone(),
        MockGeoLocator,
        MockProbe,
        config(seeds),
    );
    (service, store, sources, credits)
}

// =============================================================================
// MockPodSourceFactory
// =============================================================================

/// Pod sources answering from a shared endpoint table.
///
/// Endpoints missing from the table fail with a network error.
#[derive(Clone, Default)]
pub struct MockPodSourceFactory {
    responses: Arc<Mutex<HashMap<String, Vec<RawPod>>>>,
    fetches: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl MockPodSourceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every fetch sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set(&self, endpoint: &str, pods: Vec<RawPod>) {
        self.responses
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), pods);
    }

    pub fn fail(&self, endpoint: &str) {
        self.responses.lock().unwrap().remove(endpoint);
    }

    /// Total fetches across all endpoints.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct MockPodSource {
    endpoint: String,
    factory: MockPodSourceFactory,
}

impl PodSource for MockPodSource {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch_pods(&self) -> Result<Vec<RawPod>, AppError> {
        self.factory.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.factory.delay {
            tokio::time::sleep(delay).await;
        }
        self.factory
            .responses
            .lock()
            .unwrap()
            .get(&self.endpoint)
            .cloned()
            .ok_or_else(|| AppError::NetworkError(format!("{} unreachable", self.endpoint)))
    }
}

impl PodSourceFactory for MockPodSourceFactory {
    type Source = MockPodSource;

    fn create(&self, endpoint: &str) -> Result<Self::Source, AppError> {
        Ok(MockPodSource {
            endpoint: endpoint.to_string(),
            factory: self.clone(),
        })
    }
}

// =============================================================================
// MockCredits
// =============================================================================

/// Credits feed; `None` makes every fetch fail.
#[derive(Clone)]
pub struct MockCredits {
    credits: Arc<Mutex<Option<HashMap<String, f64>>>>,
}

impl MockCredits {
    pub fn new() -> Self {
        Self {
            credits: Arc::new(Mutex::new(Some(HashMap::new()))),
        }
    }

    pub fn set(&self, entries: &[(&str, f64)]) {
        let map = entries.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        *self.credits.lock().unwrap() = Some(map);
    }

    pub fn fail(&self) {
        *self.credits.lock().unwrap() = None;
    }
}

impl CreditsSource for MockCredits {
    async fn fetch_credits(&self) -> Result<HashMap<String, f64>, AppError> {
        self.credits
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::ClientError("credits feed down".to_string()))
    }
}

// =============================================================================
// MockGeoLocator / MockProbe
// =============================================================================

/// Places every IP in Berlin.
#[derive(Clone)]
pub struct MockGeoLocator;

impl GeoLocator for MockGeoLocator {
    fn max_batch_size(&self) -> usize {
        100
    }

    async fn locate_batch(&self, ips: &[IpAddr]) -> Result<HashMap<IpAddr, GeoLocation>, AppError> {
        Ok(ips
            .iter()
            .map(|ip| {
                (
                    *ip,
                    GeoLocation {
                        country: "Germany".to_string(),
                        country_code: "DE".to_string(),
                        city: Some("Berlin".to_string()),
                        latitude: 52.52,
                        longitude: 13.40,
                    },
                )
            })
            .collect())
    }
}

/// Answers every probe in 12 ms.
#[derive(Clone)]
pub struct MockProbe;

impl LatencyProbe for MockProbe {
    async fn probe(&self, _endpoint: &str) -> Result<u32, AppError> {
        Ok(12)
    }
}

// =============================================================================
// MockNodeStore
// =============================================================================

#[derive(Default)]
struct StoreState {
    nodes: HashMap<String, PNode>,
    snapshots: Vec<NetworkStats>,
    notifications: Vec<Notification>,
    fail_upsert: bool,
    fail_list: bool,
}

/// In-memory node store for testing.
///
/// Mirrors the PostgreSQL repository: rows keyed by pubkey, listed by rank,
/// absent rows flipped offline.
#[derive(Clone, Default)]
pub struct MockNodeStore {
    state: Arc<Mutex<StoreState>>,
}

impl MockNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: Vec<PNode>) -> Self {
        let store = Self::new();
        store.state.lock().unwrap().nodes = nodes
            .into_iter()
            .map(|n| (n.pubkey.clone(), n))
            .collect();
        store
    }

    pub fn fail_upsert(&self, fail: bool) {
        self.state.lock().unwrap().fail_upsert = fail;
    }

    pub fn fail_list(&self, fail: bool) {
        self.state.lock().unwrap().fail_list = fail;
    }

    pub fn node(&self, pubkey: &str) -> Option<PNode> {
        self.state.lock().unwrap().nodes.get(pubkey).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().nodes.len()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.lock().unwrap().notifications.clone()
    }

    pub fn snapshots(&self) -> usize {
        self.state.lock().unwrap().snapshots.len()
    }
}

impl NodeStore for MockNodeStore {
    async fn upsert_nodes(&self, nodes: &[PNode]) -> Result<u64, AppError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_upsert {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        for node in nodes {
            state.nodes.insert(node.pubkey.clone(), node.clone());
        }
        Ok(nodes.len() as u64)
    }

    async fn mark_absent_offline(
        &self,
        present: &[String],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut state = self.state.lock().unwrap();
        let mut marked = 0;
        for node in state.nodes.values_mut() {
            if present.contains(&node.pubkey) {
                continue;
            }
            let mut changed = node.rank != 0;
            if node.status != NodeStatus::Offline {
                node.status = NodeStatus::Offline;
                marked += 1;
                changed = true;
            }
            if changed {
                node.rank = 0;
                node.updated_at = updated_at;
            }
        }
        Ok(marked)
    }

    async fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<PNode>, AppError> {
        let state = self.state.lock().unwrap();
        if state.fail_list {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        let mut nodes: Vec<PNode> = state
            .nodes
            .values()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.pubkey.cmp(&b.pubkey)));
        if let Some(limit) = filter.limit {
            nodes.truncate(limit);
        }
        Ok(nodes)
    }

    async fn get_node(&self, pubkey: &str) -> Result<Option<PNode>, AppError> {
        Ok(self.node(pubkey))
    }

    async fn newest_update(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .nodes
            .values()
            .map(|n| n.updated_at)
            .max())
    }

    async fn record_network_stats(&self, stats: &NetworkStats) -> Result<(), AppError> {
        self.state.lock().unwrap().snapshots.push(stats.clone());
        Ok(())
    }

    async fn latest_network_stats(&self) -> Result<Option<NetworkStats>, AppError> {
        Ok(self.state.lock().unwrap().snapshots.last().cloned())
    }

    async fn network_history(&self, limit: usize) -> Result<Vec<NetworkStats>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.snapshots.iter().rev().take(limit).cloned().collect())
    }

    async fn insert_notifications(&self, notifications: &[Notification]) -> Result<u64, AppError> {
        self.state
            .lock()
            .unwrap()
            .notifications
            .extend_from_slice(notifications);
        Ok(notifications.len() as u64)
    }

    async fn recent_notifications(&self, limit: usize) -> Result<Vec<Notification>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.notifications.iter().rev().take(limit).cloned().collect())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

// =============================================================================
// RecordingReporter
// =============================================================================

/// Collects the debug form of every event.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: IngestEvent<'_>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}
