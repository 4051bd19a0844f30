//! Pure scoring, deduplication and ranking of pNodes.

use std::collections::HashMap;

use crate::models::{PNode, RawPod};

/// Maps a node's credits to a 0–100 score relative to the network maximum.
///
/// Returns 0 when either input is non-positive or not finite. The result is
/// clamped to `[0, 100]` and rounded to two decimals.
///
/// ```
/// use podwatch_core::scoring::performance_score;
///
/// assert_eq!(performance_score(50.0, 200.0), 25.0);
/// assert_eq!(performance_score(10.0, 0.0), 0.0);
/// ```
pub fn performance_score(credits: f64, max_credits: f64) -> f64 {
    if !credits.is_finite() || !max_credits.is_finite() || credits <= 0.0 || max_credits <= 0.0 {
        return 0.0;
    }
    let raw = (credits / max_credits * 100.0).clamp(0.0, 100.0);
    (raw * 100.0).round() / 100.0
}

/// Keeps one record per pubkey.
///
/// The record with the greatest `last_seen_timestamp` wins; on ties the first
/// one seen is kept. Output preserves first-appearance order. Records with an
/// empty pubkey are dropped and counted as duplicates.
///
/// Returns the unique records and the number of records discarded.
pub fn dedupe_by_pubkey(pods: Vec<RawPod>) -> (Vec<RawPod>, usize) {
    let total = pods.len();
    let mut index: HashMap<String, usize> = HashMap::with_capacity(total);
    let mut unique: Vec<RawPod> = Vec::with_capacity(total);

    for pod in pods {
        let key = pod.pubkey.trim();
        if key.is_empty() {
            continue;
        }
        match index.get(key) {
            Some(&i) => {
                if pod.last_seen_timestamp > unique[i].last_seen_timestamp {
                    unique[i] = pod;
                }
            }
            None => {
                index.insert(key.to_string(), unique.len());
                unique.push(pod);
            }
        }
    }

    let duplicates = total - unique.len();
    (unique, duplicates)
}

/// Sorts by credits descending (pubkey ascending on ties) and assigns
/// 1-based ranks.
pub fn rank_by_credits(nodes: &mut [PNode]) {
    nodes.sort_by(|a, b| {
        b.credits
            .total_cmp(&a.credits)
            .then_with(|| a.pubkey.cmp(&b.pubkey))
    });
    for (i, node) in nodes.iter_mut().enumerate() {
        node.rank = (i + 1) as u32;
    }
}

/// Largest finite credits value, 0 for an empty map.
pub fn max_credits<'a>(credits: impl IntoIterator<Item = &'a f64>) -> f64 {
    credits
        .into_iter()
        .copied()
        .filter(|c| c.is_finite())
        .fold(0.0, f64::max)
}
