//! Integration tests for IngestService.

use podwatch_core::{AppError, NodeStatus, NotificationKind, PerformanceTier};

use crate::integration::common::{RecordingReporter, SEED_A, SEED_B, pod, service};

#[tokio::test]
async fn test_ingest_requires_seeds() {
    let (service, store, _, _) = service(&[]);

    let err = service.run().await.unwrap_err();

    assert!(matches!(err, AppError::ConfigError(_)));
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn test_ingest_fails_when_every_seed_fails() {
    let (service, store, _, _) = service(&[SEED_A, SEED_B]);

    let err = service.run().await.unwrap_err();

    match err {
        AppError::SourcesUnavailable(msg) => {
            assert!(msg.contains(SEED_A), "message should name seed A: {msg}");
            assert!(msg.contains(SEED_B), "message should name seed B: {msg}");
        }
        other => panic!("expected SourcesUnavailable, got {other:?}"),
    }
    assert_eq!(store.len(), 0, "nothing should be written");
    assert_eq!(store.snapshots(), 0);
}

#[tokio::test]
async fn test_ingest_tolerates_partial_seed_failure() {
    let (service, store, sources, _) = service(&[SEED_A, SEED_B]);
    sources.set(SEED_B, vec![pod("node-1", 1, 10), pod("node-2", 2, 10)]);

    let report = service.run().await.unwrap();

    assert_eq!(report.stats.sources_ok, 1);
    assert_eq!(report.stats.sources_failed, 1);
    assert_eq!(report.nodes.len(), 2);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_ingest_dedupes_across_seeds() {
    let (service, _, sources, _) = service(&[SEED_A, SEED_B]);
    let mut stale = pod("node-1", 1, 3_000);
    stale.version = Some("0.7.0".to_string());
    sources.set(SEED_A, vec![stale, pod("node-2", 2, 10)]);
    sources.set(SEED_B, vec![pod("node-1", 1, 5)]);

    let report = service.run().await.unwrap();

    assert_eq!(report.stats.fetched, 3);
    assert_eq!(report.stats.unique, 2);
    assert_eq!(report.stats.duplicates, 1);
    let node = report.nodes.iter().find(|n| n.pubkey == "node-1").unwrap();
    assert_eq!(node.version.as_deref(), Some("0.8.0"), "latest sighting wins");
    assert_eq!(node.status, NodeStatus::Online);
}

#[tokio::test]
async fn test_ingest_scores_and_ranks_by_credits() {
    let (service, _, sources, credits) = service(&[SEED_A]);
    sources.set(
        SEED_A,
        vec![pod("low", 1, 10), pod("high", 2, 10), pod("none", 3, 10)],
    );
    credits.set(&[("low", 20.0), ("high", 80.0)]);

    let report = service.run().await.unwrap();

    let ranked: Vec<(&str, u32)> = report
        .nodes
        .iter()
        .map(|n| (n.pubkey.as_str(), n.rank))
        .collect();
    assert_eq!(ranked, vec![("high", 1), ("low", 2), ("none", 3)]);

    let high = &report.nodes[0];
    assert_eq!(high.score, 100.0);
    assert_eq!(high.tier, PerformanceTier::Excellent);
    let low = &report.nodes[1];
    assert_eq!(low.score, 25.0);
    assert_eq!(low.tier, PerformanceTier::Poor);
    assert_eq!(report.stats.with_credits, 2);
}

#[tokio::test]
async fn test_ingest_survives_credits_outage() {
    let (service, store, sources, credits) = service(&[SEED_A]);
    sources.set(SEED_A, vec![pod("node-1", 1, 10), pod("node-2", 2, 10)]);
    credits.fail();
    let reporter = RecordingReporter::default();

    let report = service.run_with_progress(&reporter).await.unwrap();

    assert!(report.nodes.iter().all(|n| n.credits == 0.0 && n.score == 0.0));
    assert!(report.nodes.iter().all(|n| n.tier == PerformanceTier::Poor));
    assert_eq!(store.len(), 2);
    assert_eq!(reporter.count("CreditsUnavailable"), 1);
}

#[tokio::test]
async fn test_ingest_enriches_nodes() {
    let (service, _, sources, _) = service(&[SEED_A]);
    let mut offline = pod("node-2", 2, 3_600);
    offline.address = "10.0.0.7:9001".to_string();
    sources.set(SEED_A, vec![pod("node-1", 1, 10), offline]);

    let report = service.run().await.unwrap();

    let online = report.nodes.iter().find(|n| n.pubkey == "node-1").unwrap();
    assert_eq!(online.ip, "8.8.4.1");
    assert_eq!(online.port, 9001);
    assert_eq!(online.country_code.as_deref(), Some("DE"));
    assert_eq!(online.latency_ms, Some(12));
    assert_eq!(online.status, NodeStatus::Online);

    let private = report.nodes.iter().find(|n| n.pubkey == "node-2").unwrap();
    assert_eq!(private.status, NodeStatus::Offline);
    assert_eq!(private.country_code, None, "private IPs are not geolocated");

    assert_eq!(report.network.total_nodes, 2);
    assert_eq!(report.network.online_nodes, 1);
}

#[tokio::test]
async fn test_ingest_records_network_snapshot() {
    let (service, store, sources, _) = service(&[SEED_A]);
    sources.set(SEED_A, vec![pod("node-1", 1, 10)]);

    service.run().await.unwrap();
    service.run().await.unwrap();

    assert_eq!(store.snapshots(), 2);
}

#[tokio::test]
async fn test_first_ingest_writes_no_notifications() {
    let (service, store, sources, _) = service(&[SEED_A]);
    sources.set(SEED_A, vec![pod("node-1", 1, 10), pod("node-2", 2, 10)]);

    let report = service.run().await.unwrap();

    assert_eq!(report.stats.notifications, 0);
    assert!(store.notifications().is_empty());
}

#[tokio::test]
async fn test_second_ingest_diffs_against_stored_rows() {
    let (service, store, sources, _) = service(&[SEED_A]);
    sources.set(SEED_A, vec![pod("node-1", 1, 10), pod("node-2", 2, 10)]);
    service.run().await.unwrap();

    // node-2 leaves gossip, node-3 joins.
    sources.set(SEED_A, vec![pod("node-1", 1, 10), pod("node-3", 3, 10)]);
    let report = service.run().await.unwrap();

    assert_eq!(report.stats.marked_offline, 1);
    assert_eq!(store.node("node-2").unwrap().status, NodeStatus::Offline);

    let mut kinds: Vec<(NotificationKind, String)> = store
        .notifications()
        .into_iter()
        .map(|n| (n.kind, n.pubkey.unwrap_or_default()))
        .collect();
    kinds.sort_by(|a, b| a.1.cmp(&b.1));
    assert_eq!(
        kinds,
        vec![
            (NotificationKind::NodeOffline, "node-2".to_string()),
            (NotificationKind::NodeJoined, "node-3".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_ingest_skips_notifications_when_snapshot_fails() {
    let (service, store, sources, _) = service(&[SEED_A]);
    sources.set(SEED_A, vec![pod("node-1", 1, 10)]);
    service.run().await.unwrap();

    sources.set(SEED_A, vec![pod("node-1", 1, 10), pod("node-2", 2, 10)]);
    store.fail_list(true);
    let reporter = RecordingReporter::default();
    let report = service.run_with_progress(&reporter).await.unwrap();

    assert_eq!(report.nodes.len(), 2);
    assert!(store.notifications().is_empty());
    assert_eq!(reporter.count("StepSkipped"), 1);
}

#[tokio::test]
async fn test_ingest_propagates_upsert_failure() {
    let (service, store, sources, _) = service(&[SEED_A]);
    sources.set(SEED_A, vec![pod("node-1", 1, 10)]);
    store.fail_upsert(true);

    let err = service.run().await.unwrap_err();

    assert!(matches!(err, AppError::DatabaseError(_)));
    assert_eq!(store.snapshots(), 0);
}

#[tokio::test]
async fn test_ingest_reports_progress_in_order() {
    let (service, _, sources, _) = service(&[SEED_A, SEED_B]);
    sources.set(SEED_A, vec![pod("node-1", 1, 10)]);
    let reporter = RecordingReporter::default();

    service.run_with_progress(&reporter).await.unwrap();

    let events = reporter.events();
    assert!(events.first().unwrap().starts_with("Started"));
    assert!(events.last().unwrap().starts_with("Completed"));
    assert_eq!(reporter.count("SourceFetched"), 1);
    assert_eq!(reporter.count("SourceFailed"), 1);
    assert_eq!(reporter.count("NodesStored"), 1);
}
