//! Network-wide aggregates over a node list.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::{NetworkStats, NodeStatus, PNode};

/// Sum of pod-reported counters, capped at `u64::MAX`.
pub(crate) fn saturating_sum(values: impl IntoIterator<Item = u64>) -> u64 {
    values.into_iter().fold(0, u64::saturating_add)
}

/// `used / committed` across `nodes`, `None` when nothing is committed.
///
/// Summed as `f64` so the ratio stays meaningful past `u64::MAX` bytes.
pub(crate) fn used_fraction(nodes: &[PNode]) -> Option<f64> {
    let committed: f64 = nodes.iter().map(|n| n.storage_committed as f64).sum();
    let used: f64 = nodes.iter().map(|n| n.storage_used as f64).sum();
    (committed > 0.0).then(|| used / committed)
}

/// Summarizes `nodes` as of `now`.
///
/// Averages over empty sets are 0 for the score and `None` for latency.
/// Utilization is 0 when no storage is committed. Version ties for
/// `most_common_version` resolve to the lexicographically smallest version.
pub fn compute_network_stats(nodes: &[PNode], now: DateTime<Utc>) -> NetworkStats {
    let total_nodes = nodes.len();
    let online_nodes = nodes
        .iter()
        .filter(|n| n.status == NodeStatus::Online)
        .count();
    let public_nodes = nodes.iter().filter(|n| n.is_public).count();

    let latencies: Vec<f64> = nodes
        .iter()
        .filter_map(|n| n.latency_ms.map(f64::from))
        .collect();
    let average_latency_ms = if latencies.is_empty() {
        None
    } else {
        Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
    };

    let total_storage_committed = saturating_sum(nodes.iter().map(|n| n.storage_committed));
    let total_storage_used = saturating_sum(nodes.iter().map(|n| n.storage_used));
    let storage_utilization = used_fraction(nodes).map_or(0.0, |f| f * 100.0);

    let total_credits: f64 = nodes.iter().map(|n| n.credits).sum();
    let average_score = if total_nodes == 0 {
        0.0
    } else {
        nodes.iter().map(|n| n.score).sum::<f64>() / total_nodes as f64
    };

    let countries: HashSet<&str> = nodes
        .iter()
        .filter_map(|n| n.country_code.as_deref())
        .collect();

    let mut version_distribution: BTreeMap<String, usize> = BTreeMap::new();
    for node in nodes {
        if let Some(v) = node.version.as_deref().filter(|v| !v.is_empty()) {
            *version_distribution.entry(v.to_string()).or_default() += 1;
        }
    }
    let most_common_version = version_distribution
        .iter()
        .fold(None::<(&String, usize)>, |best, (v, &count)| match best {
            Some((_, c)) if c >= count => best,
            _ => Some((v, count)),
        })
        .map(|(v, _)| v.clone());

    let mut tier_distribution = BTreeMap::new();
    for node in nodes {
        *tier_distribution.entry(node.tier).or_default() += 1;
    }

    NetworkStats {
        total_nodes,
        online_nodes,
        offline_nodes: total_nodes - online_nodes,
        public_nodes,
        reachable_nodes: latencies.len(),
        total_storage_committed,
        total_storage_used,
        storage_utilization,
        total_credits,
        average_score,
        average_latency_ms,
        countries: countries.len(),
        most_common_version,
        version_distribution,
        tier_distribution,
        computed_at: now,
    }
}
