//! Domain models for pNodes and network aggregates.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Port the pRPC service listens on when a pod does not advertise one.
pub const DEFAULT_RPC_PORT: u16 = 6000;

/// A pod record as reported by a pRPC seed (`get-pods-with-stats`).
///
/// Only `pubkey`, `address` and `last_seen_timestamp` are always present;
/// the stats fields are missing when the seed answers the older `get-pods`
/// method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPod {
    pub pubkey: String,
    /// Gossip address in `ip:port` form.
    pub address: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub last_seen_timestamp: i64,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub rpc_port: Option<u16>,
    #[serde(default)]
    pub storage_committed: Option<u64>,
    #[serde(default)]
    pub storage_used: Option<u64>,
    #[serde(default)]
    pub storage_usage_percent: Option<f64>,
    /// Seconds since the pod process started.
    #[serde(default)]
    pub uptime: Option<u64>,
}

impl RawPod {
    fn socket_addr(&self) -> Option<SocketAddr> {
        self.address.parse().ok()
    }

    /// Host part of the gossip address.
    pub fn ip(&self) -> Option<IpAddr> {
        if let Some(addr) = self.socket_addr() {
            return Some(addr.ip());
        }
        // Some seeds report a bare IP without a port.
        self.address.trim_matches(['[', ']']).parse().ok()
    }

    /// Port part of the gossip address, 0 when absent.
    pub fn gossip_port(&self) -> u16 {
        self.socket_addr().map(|a| a.port()).unwrap_or(0)
    }

    /// URL probed for latency measurements.
    pub fn probe_endpoint(&self) -> Option<String> {
        let port = self.rpc_port.unwrap_or(DEFAULT_RPC_PORT);
        self.ip().map(|ip| match ip {
            IpAddr::V4(v4) => format!("http://{}:{}/", v4, port),
            IpAddr::V6(v6) => format!("http://[{}]:{}/", v6, port),
        })
    }

    /// Last time the seed heard from this pod.
    pub fn last_seen(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.last_seen_timestamp, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// Resolved location of a node IP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub country: String,
    pub country_code: String,
    pub city: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Performance tier derived from the 0–100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl PerformanceTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Excellent
        } else if score >= 60.0 {
            Self::Good
        } else if score >= 40.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }
}

impl fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PerformanceTier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "excellent" => Ok(Self::Excellent),
            "good" => Ok(Self::Good),
            "fair" => Ok(Self::Fair),
            "poor" => Ok(Self::Poor),
            _ => Err(AppError::Generic(format!(
                "Unknown performance tier: '{}'. Valid options: excellent, good, fair, poor",
                s
            ))),
        }
    }
}

/// Liveness of a node as seen through gossip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Online,
    Offline,
}

impl NodeStatus {
    /// Online when the node was seen within `threshold` of `now`.
    pub fn from_last_seen(
        last_seen: DateTime<Utc>,
        now: DateTime<Utc>,
        threshold: chrono::Duration,
    ) -> Self {
        if now.signed_duration_since(last_seen) <= threshold {
            Self::Online
        } else {
            Self::Offline
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            _ => Err(AppError::Generic(format!(
                "Unknown node status: '{}'. Valid options: online, offline",
                s
            ))),
        }
    }
}

/// An enriched, ranked pNode row as persisted and served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PNode {
    pub pubkey: String,
    pub ip: String,
    pub port: u16,
    pub version: Option<String>,
    pub status: NodeStatus,
    pub last_seen: DateTime<Utc>,
    pub credits: f64,
    /// Performance score in `[0, 100]`.
    pub score: f64,
    pub tier: PerformanceTier,
    /// 1-based rank by credits; 0 once the node is absent from the gossip
    /// view.
    pub rank: u32,
    /// Round-trip time of the last probe; `None` when unreachable.
    pub latency_ms: Option<u32>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub storage_committed: u64,
    pub storage_used: u64,
    pub uptime_secs: u64,
    pub is_public: bool,
    pub updated_at: DateTime<Utc>,
}

impl PNode {
    pub fn is_online(&self) -> bool {
        self.status == NodeStatus::Online
    }

    pub fn is_reachable(&self) -> bool {
        self.latency_ms.is_some()
    }
}

/// Network-wide aggregates recomputed after every ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub total_nodes: usize,
    pub online_nodes: usize,
    pub offline_nodes: usize,
    pub public_nodes: usize,
    pub reachable_nodes: usize,
    pub total_storage_committed: u64,
    pub total_storage_used: u64,
    /// Used / committed storage, in percent.
    pub storage_utilization: f64,
    pub total_credits: f64,
    pub average_score: f64,
    pub average_latency_ms: Option<f64>,
    pub countries: usize,
    pub most_common_version: Option<String>,
    pub version_distribution: BTreeMap<String, usize>,
    pub tier_distribution: BTreeMap<PerformanceTier, usize>,
    pub computed_at: DateTime<Utc>,
}

/// Filter applied when listing stored nodes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NodeFilter {
    pub status: Option<NodeStatus>,
    /// ISO country code, matched case-insensitively.
    pub country: Option<String>,
    pub tier: Option<PerformanceTier>,
    pub limit: Option<usize>,
    /// Also list rows that the latest run no longer saw (rank 0).
    pub include_absent: bool,
}

impl NodeFilter {
    pub fn matches(&self, node: &PNode) -> bool {
        (self.include_absent || node.rank > 0)
            && self.status.is_none_or(|s| node.status == s)
            && self.tier.is_none_or(|t| node.tier == t)
            && self.country.as_deref().is_none_or(|c| {
                node.country_code
                    .as_deref()
                    .is_some_and(|code| code.eq_ignore_ascii_case(c))
            })
    }
}

/// Kind of event recorded in the notifications table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NodeJoined,
    NodeOffline,
    NodeRecovered,
    TierChanged,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NodeJoined => "node_joined",
            Self::NodeOffline => "node_offline",
            Self::NodeRecovered => "node_recovered",
            Self::TierChanged => "tier_changed",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node_joined" => Ok(Self::NodeJoined),
            "node_offline" => Ok(Self::NodeOffline),
            "node_recovered" => Ok(Self::NodeRecovered),
            "tier_changed" => Ok(Self::TierChanged),
            _ => Err(AppError::Generic(format!(
                "Unknown notification kind: '{}'",
                s
            ))),
        }
    }
}

/// A notification row produced by comparing two ingestion runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub pubkey: Option<String>,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        pubkey: Option<String>,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pubkey,
            kind,
            message: message.into(),
            created_at,
        }
    }
}

/// Counters collected during one ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub fetched: usize,
    pub duplicates: usize,
    pub unique: usize,
    pub with_credits: usize,
    pub geolocated: usize,
    pub probed: usize,
    pub reachable: usize,
    pub upserted: u64,
    pub marked_offline: u64,
    pub notifications: u64,
}

/// Output of one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Nodes ranked by credits.
    pub nodes: Vec<PNode>,
    pub network: NetworkStats,
    pub stats: IngestStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
