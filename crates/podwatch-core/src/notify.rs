//! Notifications derived from comparing two consecutive ingestion runs.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::{NodeStatus, Notification, NotificationKind, PNode};

/// Returns the events that turn `previous` into `current`.
///
/// Joins are not reported when `previous` is empty, so the first ingestion
/// into an empty store does not announce every node. A node that was online
/// and is missing from `current` is reported offline, matching the store
/// marking absent rows offline.
pub fn diff_notifications(
    previous: &[PNode],
    current: &[PNode],
    now: DateTime<Utc>,
) -> Vec<Notification> {
    let before: HashMap<&str, &PNode> = previous.iter().map(|n| (n.pubkey.as_str(), n)).collect();
    let mut out = Vec::new();

    for node in current {
        let short = short_key(&node.pubkey);
        let Some(old) = before.get(node.pubkey.as_str()) else {
            if !previous.is_empty() {
                out.push(Notification::new(
                    NotificationKind::NodeJoined,
                    Some(node.pubkey.clone()),
                    format!("Node {} joined the network ({})", short, node.ip),
                    now,
                ));
            }
            continue;
        };

        match (old.status, node.status) {
            (NodeStatus::Online, NodeStatus::Offline) => out.push(Notification::new(
                NotificationKind::NodeOffline,
                Some(node.pubkey.clone()),
                format!("Node {} went offline", short),
                now,
            )),
            (NodeStatus::Offline, NodeStatus::Online) => out.push(Notification::new(
                NotificationKind::NodeRecovered,
                Some(node.pubkey.clone()),
                format!("Node {} is back online", short),
                now,
            )),
            _ => {}
        }

        if old.tier != node.tier {
            out.push(Notification::new(
                NotificationKind::TierChanged,
                Some(node.pubkey.clone()),
                format!("Node {} moved from {} to {} tier", short, old.tier, node.tier),
                now,
            ));
        }
    }

    let present: HashSet<&str> = current.iter().map(|n| n.pubkey.as_str()).collect();
    for old in previous {
        if old.status == NodeStatus::Online && !present.contains(old.pubkey.as_str()) {
            out.push(Notification::new(
                NotificationKind::NodeOffline,
                Some(old.pubkey.clone()),
                format!("Node {} dropped out of gossip", short_key(&old.pubkey)),
                now,
            ));
        }
    }

    out
}

fn short_key(pubkey: &str) -> &str {
    match pubkey.char_indices().nth(8) {
        Some((idx, _)) => &pubkey[..idx],
        None => pubkey,
    }
}
