//! Integration tests for ClusterReader and BackgroundRefresher.

use std::time::Duration;

use chrono::Utc;
use podwatch_core::{
    AppError, BackgroundRefresher, ClusterReader, IngestService, SilentReporter, ViewSource,
};
use tokio_util::sync::CancellationToken;

use crate::integration::common::{
    MockCredits, MockGeoLocator, MockNodeStore, MockPodSourceFactory, MockProbe, SEED_A, TestService,
    config, pod, service, stored_node,
};

fn service_over(store: MockNodeStore, sources: MockPodSourceFactory) -> TestService {
    IngestService::with_config(
        store,
        sources,
        MockCredits::new(),
        MockGeoLocator,
        MockProbe,
        config(&[SEED_A]),
    )
}

fn stale_store() -> MockNodeStore {
    let two_hours_ago = Utc::now() - chrono::Duration::hours(2);
    MockNodeStore::with_nodes(vec![
        stored_node("old-1", 1, two_hours_ago),
        stored_node("old-2", 2, two_hours_ago),
    ])
}

#[tokio::test]
async fn test_fresh_store_is_served_without_ingesting() {
    let store = MockNodeStore::with_nodes(vec![
        stored_node("b", 2, Utc::now()),
        stored_node("a", 1, Utc::now()),
    ]);
    let sources = MockPodSourceFactory::new();
    let reader = ClusterReader::new(service_over(store, sources.clone()));

    let view = reader.view().await.unwrap();

    assert_eq!(view.source, ViewSource::Cache);
    let keys: Vec<&str> = view.nodes.iter().map(|n| n.pubkey.as_str()).collect();
    assert_eq!(keys, vec!["a", "b"], "rows are ordered by rank");
    assert_eq!(sources.fetches(), 0);
}

#[tokio::test]
async fn test_empty_store_triggers_refresh() {
    let (service, store, sources, _) = service(&[SEED_A]);
    sources.set(SEED_A, vec![pod("node-1", 1, 10)]);
    let reader = ClusterReader::new(service);

    let view = reader.view().await.unwrap();

    assert_eq!(view.source, ViewSource::Refreshed);
    assert_eq!(view.nodes.len(), 1);
    assert!(view.network.is_some());
    assert_eq!(store.len(), 1);

    // Second read is within the window.
    let again = reader.view().await.unwrap();
    assert_eq!(again.source, ViewSource::Cache);
    assert_eq!(sources.fetches(), 1);
}

#[tokio::test]
async fn test_stale_store_is_refreshed() {
    let store = stale_store();
    let sources = MockPodSourceFactory::new();
    sources.set(SEED_A, vec![pod("new-1", 1, 10)]);
    let reader = ClusterReader::new(service_over(store.clone(), sources));

    let view = reader.view().await.unwrap();

    assert_eq!(view.source, ViewSource::Refreshed);
    assert_eq!(view.nodes.len(), 1);
    assert_eq!(view.nodes[0].pubkey, "new-1");
    assert_eq!(
        store.node("old-1").unwrap().status,
        podwatch_core::NodeStatus::Offline
    );
}

fn ranked(nodes: &[podwatch_core::PNode]) -> Vec<(String, u32)> {
    nodes.iter().map(|n| (n.pubkey.clone(), n.rank)).collect()
}

#[tokio::test]
async fn test_cached_view_matches_refresh_after_node_leaves() {
    let (service, store, sources, credits) = service(&[SEED_A]);
    credits.set(&[("a", 100.0), ("b", 50.0)]);
    sources.set(SEED_A, vec![pod("a", 1, 10), pod("b", 2, 10)]);
    let reader = ClusterReader::new(service);
    reader.refresh().await.unwrap();

    sources.set(SEED_A, vec![pod("b", 2, 10)]);
    let report = reader.refresh().await.unwrap();

    let first = reader.view().await.unwrap();
    let second = reader.view().await.unwrap();

    assert_eq!(first.source, ViewSource::Cache);
    assert_eq!(ranked(&report.nodes), vec![("b".to_string(), 1)]);
    assert_eq!(ranked(&first.nodes), ranked(&report.nodes));
    assert_eq!(ranked(&second.nodes), ranked(&report.nodes));

    let gone = store.node("a").unwrap();
    assert_eq!(gone.status, podwatch_core::NodeStatus::Offline);
    assert_eq!(gone.rank, 0);
    assert_eq!(reader.node("a").await.unwrap().rank, 0);
}

#[tokio::test]
async fn test_returning_node_is_ranked_again() {
    let (service, _, sources, _) = service(&[SEED_A]);
    sources.set(SEED_A, vec![pod("a", 1, 10), pod("b", 2, 10)]);
    let reader = ClusterReader::new(service);
    reader.refresh().await.unwrap();

    sources.set(SEED_A, vec![pod("b", 2, 10)]);
    reader.refresh().await.unwrap();
    sources.set(SEED_A, vec![pod("a", 1, 10), pod("b", 2, 10)]);
    reader.refresh().await.unwrap();

    let view = reader.view().await.unwrap();
    let mut ranks: Vec<u32> = view.nodes.iter().map(|n| n.rank).collect();
    ranks.sort_unstable();
    assert_eq!(ranks, vec![1, 2]);
}

#[tokio::test]
async fn test_failed_refresh_serves_stale_rows() {
    let sources = MockPodSourceFactory::new();
    let reader = ClusterReader::new(service_over(stale_store(), sources.clone()));

    let view = reader.view().await.unwrap();

    assert_eq!(view.source, ViewSource::StaleCache);
    assert_eq!(view.nodes.len(), 2);
    assert_eq!(sources.fetches(), 1);
}

#[tokio::test]
async fn test_failed_refresh_on_empty_store_is_an_error() {
    let (service, _, _, _) = service(&[SEED_A]);
    let reader = ClusterReader::new(service);

    let err = reader.view().await.unwrap_err();

    assert!(matches!(err, AppError::SourcesUnavailable(_)));
}

#[tokio::test]
async fn test_concurrent_reads_share_one_refresh() {
    let store = stale_store();
    let sources = MockPodSourceFactory::new().with_delay(Duration::from_millis(50));
    sources.set(SEED_A, vec![pod("node-1", 1, 10)]);
    let reader = ClusterReader::new(service_over(store, sources.clone()));

    let (first, second, third) = tokio::join!(reader.view(), reader.view(), reader.view());

    let sources_seen: Vec<ViewSource> = [first, second, third]
        .into_iter()
        .map(|v| v.unwrap().source)
        .collect();
    assert_eq!(sources.fetches(), 1, "only one ingestion should run");
    assert_eq!(
        sources_seen
            .iter()
            .filter(|s| **s == ViewSource::Refreshed)
            .count(),
        1
    );
    assert_eq!(
        sources_seen
            .iter()
            .filter(|s| **s == ViewSource::Cache)
            .count(),
        2
    );
}

#[tokio::test]
async fn test_node_lookup() {
    let store = MockNodeStore::with_nodes(vec![stored_node("a", 1, Utc::now())]);
    let reader = ClusterReader::new(service_over(store, MockPodSourceFactory::new()));

    assert_eq!(reader.node("a").await.unwrap().pubkey, "a");
    let err = reader.node("missing").await.unwrap_err();
    assert!(matches!(err, AppError::NodeNotFound(key) if key == "missing"));
}

#[tokio::test]
async fn test_node_lookup_finds_rows_marked_offline() {
    let store = stale_store();
    let sources = MockPodSourceFactory::new();
    sources.set(SEED_A, vec![pod("new-1", 1, 10)]);
    let reader = ClusterReader::new(service_over(store, sources));

    let node = reader.node("old-2").await.unwrap();

    assert_eq!(node.status, podwatch_core::NodeStatus::Offline);
}

#[tokio::test]
async fn test_explicit_refresh_ignores_staleness() {
    let store = MockNodeStore::with_nodes(vec![stored_node("a", 1, Utc::now())]);
    let sources = MockPodSourceFactory::new();
    sources.set(SEED_A, vec![pod("node-1", 1, 10)]);
    let reader = ClusterReader::new(service_over(store, sources.clone()));

    let report = reader.refresh().await.unwrap();

    assert_eq!(report.nodes.len(), 1);
    assert_eq!(sources.fetches(), 1);
}

#[tokio::test]
async fn test_refresher_tick_only_refreshes_when_stale() {
    let sources = MockPodSourceFactory::new();
    sources.set(SEED_A, vec![pod("node-1", 1, 10)]);
    let reader = ClusterReader::new(service_over(stale_store(), sources.clone()));
    let refresher = BackgroundRefresher::new(reader, Duration::from_secs(60));

    assert!(refresher.tick(&SilentReporter).await);
    assert!(!refresher.tick(&SilentReporter).await);
    assert_eq!(sources.fetches(), 1);
}

#[tokio::test]
async fn test_refresher_tick_reports_failure() {
    let sources = MockPodSourceFactory::new();
    let reader = ClusterReader::new(service_over(stale_store(), sources));
    let refresher = BackgroundRefresher::new(reader, Duration::from_secs(60));

    assert!(!refresher.tick(&SilentReporter).await);
}

#[tokio::test(start_paused = true)]
async fn test_refresher_stops_on_cancel() {
    let (service, _, sources, _) = service(&[SEED_A]);
    sources.set(SEED_A, vec![pod("node-1", 1, 10)]);
    let refresher = BackgroundRefresher::new(ClusterReader::new(service), Duration::from_secs(60));
    let cancel = CancellationToken::new();

    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { refresher.run(cancel, &SilentReporter).await })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(sources.fetches(), 1);
}
