//! Response DTOs for API endpoints.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use podwatch_core::metrics::{CountryShare, HealthComponents};
use podwatch_core::{
    CensorshipResistance, DecentralizationReport, HealthScore, IngestReport, IngestStats,
    NetworkStats, Notification, PNode, ViewSource, XScore,
};

/// Where served rows came from: `cache`, `refreshed` or `stale_cache`.
pub fn view_source_label(source: ViewSource) -> String {
    match source {
        ViewSource::Cache => "cache",
        ViewSource::Refreshed => "refreshed",
        ViewSource::StaleCache => "stale_cache",
    }
    .to_string()
}

// =============================================================================
// Health
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("healthy" or "degraded")
    pub status: String,
    /// Server version
    pub version: String,
    /// Database connectivity status
    pub database: ServiceStatus,
}

/// Status of an individual service component.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceStatus {
    /// Whether the service is reachable
    pub healthy: bool,
    /// Optional message (e.g., error details)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Nodes
// =============================================================================

/// An enriched, ranked pNode.
#[derive(Debug, Serialize, ToSchema)]
pub struct NodeResponse {
    pub pubkey: String,
    pub ip: String,
    pub port: u16,
    pub version: Option<String>,
    /// online or offline
    pub status: String,
    pub last_seen: DateTime<Utc>,
    pub credits: f64,
    /// Performance score, 0 to 100
    pub score: f64,
    /// excellent, good, fair or poor
    pub tier: String,
    /// 1-based rank by credits
    pub rank: u32,
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

impl From<PNode> for NodeResponse {
    fn from(n: PNode) -> Self {
        Self {
            status: n.status.to_string(),
            tier: n.tier.to_string(),
            pubkey: n.pubkey,
            ip: n.ip,
            port: n.port,
            version: n.version,
            last_seen: n.last_seen,
            credits: n.credits,
            score: n.score,
            rank: n.rank,
            latency_ms: n.latency_ms,
            country: n.country,
            country_code: n.country_code,
            city: n.city,
            latitude: n.latitude,
            longitude: n.longitude,
            storage_committed: n.storage_committed,
            storage_used: n.storage_used,
            uptime_secs: n.uptime_secs,
            is_public: n.is_public,
            updated_at: n.updated_at,
        }
    }
}

/// Node listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct NodesResponse {
    /// cache, refreshed or stale_cache
    pub source: String,
    /// `updated_at` of the newest row
    pub as_of: Option<DateTime<Utc>>,
    /// Number of nodes returned
    pub count: usize,
    /// Nodes ordered by rank
    pub nodes: Vec<NodeResponse>,
}

// =============================================================================
// Network
// =============================================================================

/// Network-wide aggregate.
#[derive(Debug, Serialize, ToSchema)]
pub struct NetworkStatsResponse {
    pub total_nodes: usize,
    pub online_nodes: usize,
    pub offline_nodes: usize,
    pub public_nodes: usize,
    pub reachable_nodes: usize,
    pub total_storage_committed: u64,
    pub total_storage_used: u64,
    /// Used over committed, 0 to 1
    pub storage_utilization: f64,
    pub total_credits: f64,
    pub average_score: f64,
    pub average_latency_ms: Option<f64>,
    pub countries: usize,
    pub most_common_version: Option<String>,
    pub version_distribution: BTreeMap<String, usize>,
    pub tier_distribution: BTreeMap<String, usize>,
    pub computed_at: DateTime<Utc>,
}

impl From<NetworkStats> for NetworkStatsResponse {
    fn from(s: NetworkStats) -> Self {
        Self {
            total_nodes: s.total_nodes,
            online_nodes: s.online_nodes,
            offline_nodes: s.offline_nodes,
            public_nodes: s.public_nodes,
            reachable_nodes: s.reachable_nodes,
            total_storage_committed: s.total_storage_committed,
            total_storage_used: s.total_storage_used,
            storage_utilization: s.storage_utilization,
            total_credits: s.total_credits,
            average_score: s.average_score,
            average_latency_ms: s.average_latency_ms,
            countries: s.countries,
            most_common_version: s.most_common_version,
            version_distribution: s.version_distribution,
            tier_distribution: s
                .tier_distribution
                .into_iter()
                .map(|(tier, count)| (tier.to_string(), count))
                .collect(),
            computed_at: s.computed_at,
        }
    }
}

/// Current network aggregate.
#[derive(Debug, Serialize, ToSchema)]
pub struct NetworkResponse {
    /// cache, refreshed or stale_cache
    pub source: String,
    pub as_of: Option<DateTime<Utc>>,
    pub network: NetworkStatsResponse,
}

/// Recorded network snapshots, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct NetworkHistoryResponse {
    pub count: usize,
    pub snapshots: Vec<NetworkStatsResponse>,
}

// =============================================================================
// Metrics
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct CountryShareDto {
    pub country_code: String,
    pub country: String,
    pub nodes: usize,
    /// Share of located nodes, 0 to 1
    pub share: f64,
}

impl From<CountryShare> for CountryShareDto {
    fn from(c: CountryShare) -> Self {
        Self {
            country_code: c.country_code,
            country: c.country,
            nodes: c.nodes,
            share: c.share,
        }
    }
}

/// Geographic and economic concentration of the network.
#[derive(Debug, Serialize, ToSchema)]
pub struct DecentralizationResponse {
    pub total_nodes: usize,
    pub located_nodes: usize,
    pub unknown_location: usize,
    pub unique_countries: usize,
    pub unique_cities: usize,
    /// Largest country first
    pub country_distribution: Vec<CountryShareDto>,
    pub nakamoto_coefficient: usize,
    pub credits_gini: f64,
    pub herfindahl_index: f64,
    pub top_country_share: f64,
    pub version_distribution: BTreeMap<String, usize>,
    /// Decentralization score, 0 to 100
    pub score: f64,
}

impl From<DecentralizationReport> for DecentralizationResponse {
    fn from(r: DecentralizationReport) -> Self {
        Self {
            total_nodes: r.total_nodes,
            located_nodes: r.located_nodes,
            unknown_location: r.unknown_location,
            unique_countries: r.unique_countries,
            unique_cities: r.unique_cities,
            country_distribution: r
                .country_distribution
                .into_iter()
                .map(CountryShareDto::from)
                .collect(),
            nakamoto_coefficient: r.nakamoto_coefficient,
            credits_gini: r.credits_gini,
            herfindahl_index: r.herfindahl_index,
            top_country_share: r.top_country_share,
            version_distribution: r.version_distribution,
            score: r.score,
        }
    }
}

/// Per-factor health scores, each 0 to 100.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthComponentsDto {
    pub online: f64,
    pub reachable: f64,
    pub latency: f64,
    pub version_consensus: f64,
    pub storage_headroom: f64,
}

impl From<HealthComponents> for HealthComponentsDto {
    fn from(c: HealthComponents) -> Self {
        Self {
            online: c.online,
            reachable: c.reachable,
            latency: c.latency,
            version_consensus: c.version_consensus,
            storage_headroom: c.storage_headroom,
        }
    }
}

/// Operational health of the network.
#[derive(Debug, Serialize, ToSchema)]
pub struct NetworkHealthResponse {
    /// Health score, 0 to 100
    pub score: f64,
    /// Letter grade A to F
    pub grade: String,
    pub total_nodes: usize,
    pub average_latency_ms: Option<f64>,
    pub components: HealthComponentsDto,
}

impl From<HealthScore> for NetworkHealthResponse {
    fn from(h: HealthScore) -> Self {
        Self {
            score: h.score,
            grade: h.grade.to_string(),
            total_nodes: h.total_nodes,
            average_latency_ms: h.average_latency_ms,
            components: h.components.into(),
        }
    }
}

/// Resistance of the network to jurisdictional pressure.
#[derive(Debug, Serialize, ToSchema)]
pub struct CensorshipResponse {
    /// Resistance score, 0 to 100
    pub score: f64,
    /// high, moderate or low
    pub level: String,
    pub nakamoto_coefficient: usize,
    pub country_entropy: f64,
    pub top3_country_share: f64,
    pub public_ratio: f64,
}

impl From<CensorshipResistance> for CensorshipResponse {
    fn from(c: CensorshipResistance) -> Self {
        Self {
            score: c.score,
            level: c.level.to_string(),
            nakamoto_coefficient: c.nakamoto_coefficient,
            country_entropy: c.country_entropy,
            top3_country_share: c.top3_country_share,
            public_ratio: c.public_ratio,
        }
    }
}

/// Composite operator score of one node.
#[derive(Debug, Serialize, ToSchema)]
pub struct XScoreDto {
    pub pubkey: String,
    pub score: f64,
    pub rank: u32,
    pub performance: f64,
    pub uptime: f64,
    pub latency: f64,
    pub storage: f64,
    pub version: f64,
    pub online: f64,
}

impl From<XScore> for XScoreDto {
    fn from(x: XScore) -> Self {
        Self {
            pubkey: x.pubkey,
            score: x.score,
            rank: x.rank,
            performance: x.performance,
            uptime: x.uptime,
            latency: x.latency,
            storage: x.storage,
            version: x.version,
            online: x.online,
        }
    }
}

/// X-score leaderboard, best first.
#[derive(Debug, Serialize, ToSchema)]
pub struct XScoresResponse {
    pub count: usize,
    pub scores: Vec<XScoreDto>,
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationDto {
    pub id: Uuid,
    pub pubkey: Option<String>,
    /// node_joined, node_offline, node_recovered or tier_changed
    pub kind: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationDto {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            pubkey: n.pubkey,
            kind: n.kind.to_string(),
            message: n.message,
            created_at: n.created_at,
        }
    }
}

/// Recent notifications, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationsResponse {
    pub count: usize,
    pub notifications: Vec<NotificationDto>,
}

// =============================================================================
// Refresh
// =============================================================================

/// Counters collected during one ingestion run.
#[derive(Debug, Serialize, ToSchema)]
pub struct IngestStatsDto {
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

impl From<IngestStats> for IngestStatsDto {
    fn from(s: IngestStats) -> Self {
        Self {
            sources_ok: s.sources_ok,
            sources_failed: s.sources_failed,
            fetched: s.fetched,
            duplicates: s.duplicates,
            unique: s.unique,
            with_credits: s.with_credits,
            geolocated: s.geolocated,
            probed: s.probed,
            reachable: s.reachable,
            upserted: s.upserted,
            marked_offline: s.marked_offline,
            notifications: s.notifications,
        }
    }
}

/// Summary of a completed refresh.
#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_nodes: usize,
    pub online_nodes: usize,
    pub stats: IngestStatsDto,
}

impl From<IngestReport> for RefreshResponse {
    fn from(r: IngestReport) -> Self {
        Self {
            started_at: r.started_at,
            finished_at: r.finished_at,
            total_nodes: r.nodes.len(),
            online_nodes: r.network.online_nodes,
            stats: r.stats.into(),
        }
    }
}
