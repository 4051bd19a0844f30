//! Derived network metrics.
//!
//! Everything here is a pure function of a node list: decentralization,
//! health, per-node X-scores and censorship resistance, plus the statistics
//! they are built from (Gini and Nakamoto coefficients, Shannon entropy).
//! Component scores are reported on a 0–100 scale and final scores are
//! rounded to two decimals.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{NodeStatus, PNode};
use crate::network::used_fraction;

const SECONDS_PER_DAY: f64 = 86_400.0;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Gini coefficient of `values`, in `[0, 1)`.
///
/// Uses the sorted-rank form `2·Σ(i·xᵢ)/(n·Σx) − (n+1)/n` with `i` 1-based
/// over ascending values. Negative and non-finite values count as 0; an empty
/// or zero-sum input yields 0.
pub fn gini_coefficient(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values
        .iter()
        .map(|v| if v.is_finite() { v.max(0.0) } else { 0.0 })
        .collect();
    let n = sorted.len();
    let sum: f64 = sorted.iter().sum();
    if n == 0 || sum <= 0.0 {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);

    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| (i + 1) as f64 * x)
        .sum();
    let n = n as f64;
    (2.0 * weighted / (n * sum) - (n + 1.0) / n).max(0.0)
}

/// Smallest number of the largest entities whose combined share exceeds 50%.
///
/// Returns 0 for an empty or zero total.
pub fn nakamoto_coefficient(amounts: &[f64]) -> usize {
    let mut sorted: Vec<f64> = amounts
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    let total: f64 = sorted.iter().sum();
    if total <= 0.0 {
        return 0;
    }
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    for (i, amount) in sorted.iter().enumerate() {
        cumulative += amount;
        if cumulative > total / 2.0 {
            return i + 1;
        }
    }
    sorted.len()
}

/// Shannon entropy of a count distribution divided by its maximum `ln(k)`.
///
/// 0 when fewer than two categories are present.
pub fn normalized_entropy(counts: &[usize]) -> f64 {
    let present: Vec<f64> = counts.iter().filter(|c| **c > 0).map(|c| *c as f64).collect();
    if present.len() < 2 {
        return 0.0;
    }
    let total: f64 = present.iter().sum();
    let entropy: f64 = present
        .iter()
        .map(|c| {
            let p = c / total;
            -p * p.ln()
        })
        .sum();
    entropy / (present.len() as f64).ln()
}

fn parse_version(version: &str) -> Vec<u64> {
    let trimmed = version.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    let core = trimmed.split(['-', '+']).next().unwrap_or("");
    core.split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

/// Numeric dotted-version comparison.
///
/// A leading `v` and any pre-release or build suffix are ignored; missing
/// components count as 0.
///
/// ```
/// use std::cmp::Ordering;
/// use podwatch_core::metrics::compare_versions;
///
/// assert_eq!(compare_versions("v0.10.0", "0.9.3"), Ordering::Greater);
/// assert_eq!(compare_versions("1.2", "1.2.0-rc1"), Ordering::Equal);
/// ```
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a, b) = (parse_version(a), parse_version(b));
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Latency mapped to 0–100: ≤100 ms scores 100, ≥1000 ms scores 0.
pub fn latency_score(latency_ms: Option<f64>) -> f64 {
    match latency_ms {
        Some(ms) if ms.is_finite() => {
            if ms <= 100.0 {
                100.0
            } else if ms >= 1000.0 {
                0.0
            } else {
                (1000.0 - ms) / 900.0 * 100.0
            }
        }
        _ => 0.0,
    }
}

// =============================================================================
// Decentralization
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryShare {
    pub country_code: String,
    pub country: String,
    pub nodes: usize,
    /// Share of located nodes, 0–1.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecentralizationReport {
    pub total_nodes: usize,
    pub located_nodes: usize,
    /// Nodes without a resolved country; excluded from the country statistics.
    pub unknown_location: usize,
    pub unique_countries: usize,
    pub unique_cities: usize,
    /// Largest country first.
    pub country_distribution: Vec<CountryShare>,
    pub nakamoto_coefficient: usize,
    pub credits_gini: f64,
    pub herfindahl_index: f64,
    pub top_country_share: f64,
    pub version_distribution: BTreeMap<String, usize>,
    pub score: f64,
}

fn country_distribution(nodes: &[PNode]) -> Vec<CountryShare> {
    let mut by_code: HashMap<&str, (&str, usize)> = HashMap::new();
    for node in nodes {
        if let Some(code) = node.country_code.as_deref().filter(|c| !c.is_empty()) {
            let entry = by_code
                .entry(code)
                .or_insert((node.country.as_deref().unwrap_or(code), 0));
            entry.1 += 1;
        }
    }
    let located: usize = by_code.values().map(|(_, n)| n).sum();

    let mut shares: Vec<CountryShare> = by_code
        .into_iter()
        .map(|(code, (name, count))| CountryShare {
            country_code: code.to_string(),
            country: name.to_string(),
            nodes: count,
            share: ratio(count, located),
        })
        .collect();
    shares.sort_by(|a, b| {
        b.nodes
            .cmp(&a.nodes)
            .then_with(|| a.country_code.cmp(&b.country_code))
    });
    shares
}

/// Geographic and economic concentration of the network.
///
/// Score weights: 30% country diversity (`min(countries/20, 1)`), 30%
/// Nakamoto by country (`min(n/7, 1)`), 25% credits equality (`1 − gini`) and
/// 15% `1 − top country share`. An empty network scores 0.
pub fn decentralization(nodes: &[PNode]) -> DecentralizationReport {
    let distribution = country_distribution(nodes);
    let located_nodes: usize = distribution.iter().map(|c| c.nodes).sum();
    let country_counts: Vec<f64> = distribution.iter().map(|c| c.nodes as f64).collect();

    let nakamoto = nakamoto_coefficient(&country_counts);
    let credits: Vec<f64> = nodes.iter().map(|n| n.credits).collect();
    let gini = gini_coefficient(&credits);
    let herfindahl: f64 = distribution.iter().map(|c| c.share * c.share).sum();
    let top_share = distribution.first().map(|c| c.share).unwrap_or(0.0);

    let unique_cities: HashSet<(&str, &str)> = nodes
        .iter()
        .filter_map(|n| Some((n.country_code.as_deref()?, n.city.as_deref()?)))
        .collect();

    let mut version_distribution = BTreeMap::new();
    for node in nodes {
        let version = node.version.clone().unwrap_or_else(|| "unknown".to_string());
        *version_distribution.entry(version).or_default() += 1;
    }

    let score = if nodes.is_empty() {
        0.0
    } else {
        let diversity = (distribution.len() as f64 / 20.0).min(1.0);
        let nakamoto_factor = (nakamoto as f64 / 7.0).min(1.0);
        let equality = 1.0 - gini;
        let spread = 1.0 - top_share;
        round2((0.30 * diversity + 0.30 * nakamoto_factor + 0.25 * equality + 0.15 * spread) * 100.0)
    };

    DecentralizationReport {
        total_nodes: nodes.len(),
        located_nodes,
        unknown_location: nodes.len() - located_nodes,
        unique_countries: distribution.len(),
        unique_cities: unique_cities.len(),
        country_distribution: distribution,
        nakamoto_coefficient: nakamoto,
        credits_gini: gini,
        herfindahl_index: herfindahl,
        top_country_share: top_share,
        version_distribution,
        score,
    }
}

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthGrade {
    A,
    B,
    C,
    D,
    F,
}

impl HealthGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::A
        } else if score >= 75.0 {
            Self::B
        } else if score >= 60.0 {
            Self::C
        } else if score >= 40.0 {
            Self::D
        } else {
            Self::F
        }
    }
}

impl fmt::Display for HealthGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        f.write_str(s)
    }
}

/// Per-factor health scores, each 0–100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthComponents {
    pub online: f64,
    pub reachable: f64,
    pub latency: f64,
    pub version_consensus: f64,
    pub storage_headroom: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub score: f64,
    pub grade: HealthGrade,
    pub total_nodes: usize,
    pub average_latency_ms: Option<f64>,
    pub components: HealthComponents,
}

/// Operational health of the network.
///
/// Weights: 35% online ratio, 20% reachable ratio, 15% latency score of the
/// average probe, 20% share of nodes on the most common version and 10%
/// storage headroom (`1 − used/committed`, 0 when nothing is committed).
pub fn health_score(nodes: &[PNode]) -> HealthScore {
    let total = nodes.len();
    let online = nodes
        .iter()
        .filter(|n| n.status == NodeStatus::Online)
        .count();
    let latencies: Vec<f64> = nodes
        .iter()
        .filter_map(|n| n.latency_ms.map(f64::from))
        .collect();
    let average_latency_ms =
        (!latencies.is_empty()).then(|| latencies.iter().sum::<f64>() / latencies.len() as f64);

    let mut versions: HashMap<&str, usize> = HashMap::new();
    for version in nodes.iter().filter_map(|n| n.version.as_deref()) {
        *versions.entry(version).or_default() += 1;
    }
    let top_version = versions.values().copied().max().unwrap_or(0);

    let headroom = used_fraction(nodes).map_or(0.0, |f| (1.0 - f).clamp(0.0, 1.0));

    let components = HealthComponents {
        online: ratio(online, total) * 100.0,
        reachable: ratio(latencies.len(), total) * 100.0,
        latency: latency_score(average_latency_ms),
        version_consensus: ratio(top_version, total) * 100.0,
        storage_headroom: headroom * 100.0,
    };
    let score = round2(
        0.35 * components.online
            + 0.20 * components.reachable
            + 0.15 * components.latency
            + 0.20 * components.version_consensus
            + 0.10 * components.storage_headroom,
    );

    HealthScore {
        score,
        grade: HealthGrade::from_score(score),
        total_nodes: total,
        average_latency_ms,
        components,
    }
}

// =============================================================================
// X-score
// =============================================================================

/// Network-wide references an individual X-score is measured against.
#[derive(Debug, Clone, Default)]
pub struct XScoreContext {
    pub max_storage_committed: u64,
    pub newest_version: Option<String>,
}

impl XScoreContext {
    pub fn from_nodes(nodes: &[PNode]) -> Self {
        Self {
            max_storage_committed: nodes
                .iter()
                .map(|n| n.storage_committed)
                .max()
                .unwrap_or(0),
            newest_version: nodes
                .iter()
                .filter_map(|n| n.version.as_deref())
                .max_by(|a, b| compare_versions(a, b))
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XScore {
    pub pubkey: String,
    pub score: f64,
    /// 1-based position in [`x_scores`] output; 0 for a standalone score.
    pub rank: u32,
    pub performance: f64,
    pub uptime: f64,
    pub latency: f64,
    pub storage: f64,
    pub version: f64,
    pub online: f64,
}

/// Composite operator score for one node.
///
/// Weights: 40% performance score, 20% uptime (`min(uptime/30 days, 1)`),
/// 15% latency score, 10% committed storage relative to the largest node,
/// 10% running the newest version and 5% online.
pub fn x_score(node: &PNode, ctx: &XScoreContext) -> XScore {
    let uptime = (node.uptime_secs as f64 / (30.0 * SECONDS_PER_DAY)).min(1.0) * 100.0;
    let latency = latency_score(node.latency_ms.map(f64::from));
    let storage = if ctx.max_storage_committed == 0 {
        0.0
    } else {
        node.storage_committed as f64 / ctx.max_storage_committed as f64 * 100.0
    };
    let version = match (node.version.as_deref(), ctx.newest_version.as_deref()) {
        (Some(v), Some(newest)) if compare_versions(v, newest) != Ordering::Less => 100.0,
        _ => 0.0,
    };
    let online = if node.is_online() { 100.0 } else { 0.0 };
    let performance = node.score.clamp(0.0, 100.0);

    let score = round2(
        0.40 * performance
            + 0.20 * uptime
            + 0.15 * latency
            + 0.10 * storage
            + 0.10 * version
            + 0.05 * online,
    );

    XScore {
        pubkey: node.pubkey.clone(),
        score,
        rank: 0,
        performance,
        uptime,
        latency,
        storage,
        version,
        online,
    }
}

/// X-scores for every node, best first (pubkey ascending on ties), ranked.
pub fn x_scores(nodes: &[PNode]) -> Vec<XScore> {
    let ctx = XScoreContext::from_nodes(nodes);
    let mut scores: Vec<XScore> = nodes.iter().map(|n| x_score(n, &ctx)).collect();
    scores.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.pubkey.cmp(&b.pubkey))
    });
    for (i, s) in scores.iter_mut().enumerate() {
        s.rank = (i + 1) as u32;
    }
    scores
}

// =============================================================================
// Censorship resistance
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResistanceLevel {
    High,
    Moderate,
    Low,
}

impl ResistanceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            Self::High
        } else if score >= 40.0 {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for ResistanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensorshipResistance {
    pub score: f64,
    pub level: ResistanceLevel,
    pub nakamoto_coefficient: usize,
    /// Normalized Shannon entropy of the country distribution, 0–1.
    pub country_entropy: f64,
    /// Share of located nodes in the three largest countries, 0–1.
    pub top3_country_share: f64,
    pub public_ratio: f64,
}

/// How hard it would be to silence the network by jurisdiction.
///
/// Weights: 35% Nakamoto by country (`min(n/7, 1)`), 30% normalized country
/// entropy, 20% `1 − top-3 country share` and 15% public-node ratio. An empty
/// network scores 0.
pub fn censorship_resistance(nodes: &[PNode]) -> CensorshipResistance {
    let distribution = country_distribution(nodes);
    let counts: Vec<usize> = distribution.iter().map(|c| c.nodes).collect();
    let amounts: Vec<f64> = counts.iter().map(|c| *c as f64).collect();

    let nakamoto = nakamoto_coefficient(&amounts);
    let entropy = normalized_entropy(&counts);
    let top3: f64 = distribution.iter().take(3).map(|c| c.share).sum();
    let public_ratio = ratio(nodes.iter().filter(|n| n.is_public).count(), nodes.len());

    let score = if nodes.is_empty() {
        0.0
    } else {
        round2(
            (0.35 * (nakamoto as f64 / 7.0).min(1.0)
                + 0.30 * entropy
                + 0.20 * (1.0 - top3)
                + 0.15 * public_ratio)
                * 100.0,
        )
    };

    CensorshipResistance {
        score,
        level: ResistanceLevel::from_score(score),
        nakamoto_coefficient: nakamoto,
        country_entropy: entropy,
        top3_country_share: top3,
        public_ratio,
    }
}
