//! Integration tests for NodeRepository.
//!
//! These tests verify the repository layer against a real PostgreSQL
//! database. Each test runs in an isolated container.

use chrono::{DateTime, Duration, Utc};
use podwatch_core::network::compute_network_stats;
use podwatch_core::{
    NodeFilter, NodeStatus, Notification, NotificationKind, PerformanceTier,
};
use podwatch_db::NodeRepository;

use crate::integration::common::{sample_node, setup_test_db};

/// Current time truncated to whole seconds, which PostgreSQL round-trips exactly.
fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap()
}

#[tokio::test]
async fn test_upsert_and_get_round_trip() {
    let (pool, _container) = setup_test_db().await;
    let repo = NodeRepository::new(pool);
    let node = sample_node("node-a", 1, now());

    let written = repo.upsert_nodes(std::slice::from_ref(&node)).await.unwrap();
    let stored = repo.get_node("node-a").await.unwrap();

    assert_eq!(written, 1);
    assert_eq!(stored, Some(node));
    assert_eq!(repo.get_node("missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_upsert_updates_and_preserves_first_seen() {
    let (pool, _container) = setup_test_db().await;
    let repo = NodeRepository::new(pool.clone());
    let first = now() - Duration::minutes(10);
    repo.upsert_nodes(&[sample_node("node-a", 1, first)])
        .await
        .unwrap();
    let first_seen: DateTime<Utc> =
        sqlx::query_scalar("SELECT first_seen_at FROM pnodes WHERE pubkey = 'node-a'")
            .fetch_one(&pool)
            .await
            .unwrap();

    let mut updated = sample_node("node-a", 3, now());
    updated.version = Some("0.9.0".to_string());
    updated.latency_ms = None;
    repo.upsert_nodes(&[updated.clone()]).await.unwrap();

    let stored = repo.get_node("node-a").await.unwrap().unwrap();
    assert_eq!(stored, updated);
    let first_seen_after: DateTime<Utc> =
        sqlx::query_scalar("SELECT first_seen_at FROM pnodes WHERE pubkey = 'node-a'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(first_seen, first_seen_after);
}

#[tokio::test]
async fn test_list_nodes_orders_and_filters() {
    let (pool, _container) = setup_test_db().await;
    let repo = NodeRepository::new(pool);
    let ts = now();
    let mut offline = sample_node("node-c", 3, ts);
    offline.status = NodeStatus::Offline;
    let mut elsewhere = sample_node("node-b", 2, ts);
    elsewhere.country_code = Some("US".to_string());
    repo.upsert_nodes(&[offline, sample_node("node-a", 1, ts), elsewhere])
        .await
        .unwrap();

    let all = repo.list_nodes(&NodeFilter::default()).await.unwrap();
    let keys: Vec<&str> = all.iter().map(|n| n.pubkey.as_str()).collect();
    assert_eq!(keys, vec!["node-a", "node-b", "node-c"]);

    let online = repo
        .list_nodes(&NodeFilter {
            status: Some(NodeStatus::Online),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(online.len(), 2);

    let german = repo
        .list_nodes(&NodeFilter {
            country: Some("de".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(german.len(), 2);

    let excellent = repo
        .list_nodes(&NodeFilter {
            tier: Some(PerformanceTier::Excellent),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(excellent.len(), 1);
    assert_eq!(excellent[0].pubkey, "node-a");

    let top = repo
        .list_nodes(&NodeFilter {
            limit: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].rank, 1);
}

#[tokio::test]
async fn test_mark_absent_offline() {
    let (pool, _container) = setup_test_db().await;
    let repo = NodeRepository::new(pool);
    let ts = now() - Duration::minutes(5);
    repo.upsert_nodes(&[
        sample_node("node-a", 1, ts),
        sample_node("node-b", 2, ts),
        sample_node("node-c", 3, ts),
    ])
    .await
    .unwrap();

    let refreshed_at = now();
    let marked = repo
        .mark_absent_offline(&["node-a".to_string()], refreshed_at)
        .await
        .unwrap();

    assert_eq!(marked, 2);
    let b = repo.get_node("node-b").await.unwrap().unwrap();
    assert_eq!(b.status, NodeStatus::Offline);
    assert_eq!(b.updated_at, refreshed_at);
    assert_eq!(b.rank, 0);
    let a = repo.get_node("node-a").await.unwrap().unwrap();
    assert_eq!(a.status, NodeStatus::Online);
    assert_eq!(a.rank, 1);

    let again = repo
        .mark_absent_offline(&["node-a".to_string()], now())
        .await
        .unwrap();
    assert_eq!(again, 0, "already-offline rows are left alone");
}

#[tokio::test]
async fn test_absent_rows_drop_out_of_listing() {
    let (pool, _container) = setup_test_db().await;
    let repo = NodeRepository::new(pool);
    let ts = now() - Duration::minutes(5);
    let mut stale = sample_node("node-b", 2, ts);
    stale.status = NodeStatus::Offline;
    repo.upsert_nodes(&[sample_node("node-a", 1, ts), stale])
        .await
        .unwrap();

    let marked = repo
        .mark_absent_offline(&["node-a".to_string()], now())
        .await
        .unwrap();
    assert_eq!(marked, 0);

    let listed = repo.list_nodes(&NodeFilter::default()).await.unwrap();
    let keys: Vec<&str> = listed.iter().map(|n| n.pubkey.as_str()).collect();
    assert_eq!(keys, vec!["node-a"]);

    let everything = repo
        .list_nodes(&NodeFilter {
            include_absent: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(everything.len(), 2);
    assert_eq!(repo.get_node("node-b").await.unwrap().unwrap().rank, 0);
}

#[tokio::test]
async fn test_newest_update() {
    let (pool, _container) = setup_test_db().await;
    let repo = NodeRepository::new(pool);
    assert_eq!(repo.newest_update().await.unwrap(), None);

    let older = now() - Duration::hours(1);
    let newer = now();
    repo.upsert_nodes(&[sample_node("node-a", 1, older), sample_node("node-b", 2, newer)])
        .await
        .unwrap();

    assert_eq!(repo.newest_update().await.unwrap(), Some(newer));
}

#[tokio::test]
async fn test_network_snapshots() {
    let (pool, _container) = setup_test_db().await;
    let repo = NodeRepository::new(pool);
    assert!(repo.latest_network_stats().await.unwrap().is_none());

    let nodes = vec![sample_node("node-a", 1, now()), sample_node("node-b", 2, now())];
    let earlier = compute_network_stats(&nodes[..1], now() - Duration::minutes(10));
    let latest = compute_network_stats(&nodes, now());
    repo.record_network_stats(&earlier).await.unwrap();
    repo.record_network_stats(&latest).await.unwrap();

    let stored = repo.latest_network_stats().await.unwrap().unwrap();
    assert_eq!(stored.total_nodes, 2);
    assert_eq!(stored.tier_distribution, latest.tier_distribution);
    assert_eq!(stored.version_distribution, latest.version_distribution);

    let history = repo.network_history(10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].total_nodes, 2);
    assert_eq!(history[1].total_nodes, 1);
}

#[tokio::test]
async fn test_notifications() {
    let (pool, _container) = setup_test_db().await;
    let repo = NodeRepository::new(pool);
    let older = Notification::new(
        NotificationKind::NodeJoined,
        Some("node-a".to_string()),
        "Node node-a joined the network (203.0.113.1)",
        now() - Duration::minutes(1),
    );
    let newer = Notification::new(
        NotificationKind::NodeOffline,
        Some("node-b".to_string()),
        "Node node-b went offline",
        now(),
    );

    let inserted = repo
        .insert_notifications(&[older.clone(), newer.clone()])
        .await
        .unwrap();
    let duplicate = repo
        .insert_notifications(std::slice::from_ref(&older))
        .await
        .unwrap();

    assert_eq!(inserted, 2);
    assert_eq!(duplicate, 0);
    let recent = repo.recent_notifications(10).await.unwrap();
    assert_eq!(recent, vec![newer.clone(), older]);
    assert_eq!(repo.recent_notifications(1).await.unwrap(), vec![newer]);
}

#[tokio::test]
async fn test_health_check() {
    let (pool, _container) = setup_test_db().await;
    let repo = NodeRepository::new(pool);
    repo.health_check().await.unwrap();
}
