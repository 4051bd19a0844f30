//! Node repository for PostgreSQL.

use chrono::{DateTime, Utc};
use podwatch_core::error::AppError;
use podwatch_core::models::{
    NetworkStats, NodeFilter, NodeStatus, Notification, NotificationKind, PNode, PerformanceTier,
};
use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

/// Column list for SELECT queries. Must remain a const literal to ensure SQL safety
/// since format!() bypasses sqlx compile-time validation.
const NODE_COLUMNS: &str = "pubkey, ip, port, version, status, last_seen, credits, score, tier, rank, latency_ms, country, country_code, city, latitude, longitude, storage_committed, storage_used, uptime_secs, is_public, updated_at";

/// Repository for node rows, network snapshots and notifications.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use podwatch_db::NodeRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/podwatch")
///     .await?;
///
/// podwatch_db::MIGRATOR.run(&pool).await?;
/// let repo = NodeRepository::new(pool);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NodeRepository {
    pool: Pool<Postgres>,
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

impl NodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or updates every node in one transaction.
    ///
    /// `first_seen_at` is set on insert only. Returns the number of rows written.
    pub async fn upsert_nodes(&self, nodes: &[PNode]) -> Result<u64, AppError> {
        if nodes.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected = 0;

        for node in nodes {
            let result = sqlx::query(
                r#"
                INSERT INTO pnodes (
                    pubkey, ip, port, version, status, last_seen, credits, score,
                    tier, rank, latency_ms, country, country_code, city, latitude,
                    longitude, storage_committed, storage_used, uptime_secs,
                    is_public, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                        $15, $16, $17, $18, $19, $20, $21)
                ON CONFLICT (pubkey)
                DO UPDATE SET
                    ip = EXCLUDED.ip,
                    port = EXCLUDED.port,
                    version = EXCLUDED.version,
                    status = EXCLUDED.status,
                    last_seen = EXCLUDED.last_seen,
                    credits = EXCLUDED.credits,
                    score = EXCLUDED.score,
                    tier = EXCLUDED.tier,
                    rank = EXCLUDED.rank,
                    latency_ms = EXCLUDED.latency_ms,
                    country = EXCLUDED.country,
                    country_code = EXCLUDED.country_code,
                    city = EXCLUDED.city,
                    latitude = EXCLUDED.latitude,
                    longitude = EXCLUDED.longitude,
                    storage_committed = EXCLUDED.storage_committed,
                    storage_used = EXCLUDED.storage_used,
                    uptime_secs = EXCLUDED.uptime_secs,
                    is_public = EXCLUDED.is_public,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(&node.pubkey)
            .bind(&node.ip)
            .bind(i32::from(node.port))
            .bind(&node.version)
            .bind(node.status.as_str())
            .bind(node.last_seen)
            .bind(node.credits)
            .bind(node.score)
            .bind(node.tier.as_str())
            .bind(i32::try_from(node.rank).unwrap_or(i32::MAX))
            .bind(node.latency_ms.map(|l| i32::try_from(l).unwrap_or(i32::MAX)))
            .bind(&node.country)
            .bind(&node.country_code)
            .bind(&node.city)
            .bind(node.latitude)
            .bind(node.longitude)
            .bind(to_i64(node.storage_committed))
            .bind(to_i64(node.storage_used))
            .bind(to_i64(node.uptime_secs))
            .bind(node.is_public)
            .bind(node.updated_at)
            .execute(&mut *tx)
            .await?;

            affected += result.rows_affected();
        }

        tx.commit().await?;
        Ok(affected)
    }

    /// Flips every non-offline row whose pubkey is not in `present` to offline
    /// and clears the rank of every absent row.
    ///
    /// Returns the number of rows whose status changed.
    pub async fn mark_absent_offline(
        &self,
        present: &[String],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            r#"
            UPDATE pnodes
            SET status = 'offline', rank = 0, updated_at = $2
            WHERE status <> 'offline' AND NOT (pubkey = ANY($1))
            "#,
        )
        .bind(present)
        .bind(updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE pnodes
            SET rank = 0, updated_at = $2
            WHERE rank <> 0 AND NOT (pubkey = ANY($1))
            "#,
        )
        .bind(present)
        .bind(updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(flipped.rows_affected())
    }

    /// Lists nodes ordered by rank.
    ///
    /// Rows absent from the latest run (rank 0) are skipped unless
    /// `filter.include_absent` is set.
    pub async fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<PNode>, AppError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM pnodes WHERE TRUE", NODE_COLUMNS));

        if !filter.include_absent {
            qb.push(" AND rank > 0");
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(country) = &filter.country {
            qb.push(" AND UPPER(country_code) = UPPER(")
                .push_bind(country.clone())
                .push(")");
        }
        if let Some(tier) = filter.tier {
            qb.push(" AND tier = ").push_bind(tier.as_str());
        }
        qb.push(" ORDER BY rank ASC, pubkey ASC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows: Vec<NodeRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(NodeRow::into_node).collect()
    }

    pub async fn get_node(&self, pubkey: &str) -> Result<Option<PNode>, AppError> {
        let query = format!("SELECT {} FROM pnodes WHERE pubkey = $1", NODE_COLUMNS);
        let row = sqlx::query_as::<_, NodeRow>(&query)
            .bind(pubkey)
            .fetch_optional(&self.pool)
            .await?;

        row.map(NodeRow::into_node).transpose()
    }

    /// `MAX(updated_at)` across all rows.
    pub async fn newest_update(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        let newest: Option<DateTime<Utc>> = sqlx::query_scalar("SELECT MAX(updated_at) FROM pnodes")
            .fetch_one(&self.pool)
            .await?;
        Ok(newest)
    }

    pub async fn record_network_stats(&self, stats: &NetworkStats) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO network_snapshots (
                total_nodes, online_nodes, total_credits, average_score, stats, computed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(i32::try_from(stats.total_nodes).unwrap_or(i32::MAX))
        .bind(i32::try_from(stats.online_nodes).unwrap_or(i32::MAX))
        .bind(stats.total_credits)
        .bind(stats.average_score)
        .bind(Json(stats))
        .bind(stats.computed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn latest_network_stats(&self) -> Result<Option<NetworkStats>, AppError> {
        Ok(self.network_history(1).await?.into_iter().next())
    }

    /// Most recent snapshots, newest first.
    pub async fn network_history(&self, limit: usize) -> Result<Vec<NetworkStats>, AppError> {
        let rows: Vec<Json<NetworkStats>> = sqlx::query_scalar(
            r#"
            SELECT stats
            FROM network_snapshots
            ORDER BY computed_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|Json(stats)| stats).collect())
    }

    /// Inserts notifications in one transaction, ignoring ids already stored.
    pub async fn insert_notifications(
        &self,
        notifications: &[Notification],
    ) -> Result<u64, AppError> {
        if notifications.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for notification in notifications {
            let result = sqlx::query(
                r#"
                INSERT INTO notifications (id, pubkey, kind, message, created_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(notification.id)
            .bind(&notification.pubkey)
            .bind(notification.kind.as_str())
            .bind(&notification.message)
            .bind(notification.created_at)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Most recent notifications, newest first.
    pub async fn recent_notifications(&self, limit: usize) -> Result<Vec<Notification>, AppError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT id, pubkey, kind, message, created_at
            FROM notifications
            ORDER BY created_at DESC, id
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(NotificationRow::into_notification).collect()
    }

    /// Checks database connectivity by executing a simple query.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Helper struct for deserializing node rows
#[derive(sqlx::FromRow)]
struct NodeRow {
    pubkey: String,
    ip: String,
    port: i32,
    version: Option<String>,
    status: String,
    last_seen: DateTime<Utc>,
    credits: f64,
    score: f64,
    tier: String,
    rank: i32,
    latency_ms: Option<i32>,
    country: Option<String>,
    country_code: Option<String>,
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    storage_committed: i64,
    storage_used: i64,
    uptime_secs: i64,
    is_public: bool,
    updated_at: DateTime<Utc>,
}

impl NodeRow {
    fn into_node(self) -> Result<PNode, AppError> {
        Ok(PNode {
            status: self.status.parse::<NodeStatus>()?,
            tier: self.tier.parse::<PerformanceTier>()?,
            pubkey: self.pubkey,
            ip: self.ip,
            port: u16::try_from(self.port).unwrap_or(0),
            version: self.version,
            last_seen: self.last_seen,
            credits: self.credits,
            score: self.score,
            rank: u32::try_from(self.rank).unwrap_or(0),
            latency_ms: self.latency_ms.and_then(|l| u32::try_from(l).ok()),
            country: self.country,
            country_code: self.country_code,
            city: self.city,
            latitude: self.latitude,
            longitude: self.longitude,
            storage_committed: to_u64(self.storage_committed),
            storage_used: to_u64(self.storage_used),
            uptime_secs: to_u64(self.uptime_secs),
            is_public: self.is_public,
            updated_at: self.updated_at,
        })
    }
}

/// Helper struct for deserializing notification rows
#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    pubkey: Option<String>,
    kind: String,
    message: String,
    created_at: DateTime<Utc>,
}

impl NotificationRow {
    fn into_notification(self) -> Result<Notification, AppError> {
        Ok(Notification {
            id: self.id,
            pubkey: self.pubkey,
            kind: self.kind.parse::<NotificationKind>()?,
            message: self.message,
            created_at: self.created_at,
        })
    }
}

// =============================================================================
// Trait Implementation: NodeStore
// =============================================================================

impl podwatch_core::traits::NodeStore for NodeRepository {
    async fn upsert_nodes(&self, nodes: &[PNode]) -> Result<u64, AppError> {
        NodeRepository::upsert_nodes(self, nodes).await
    }

    async fn mark_absent_offline(
        &self,
        present: &[String],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        NodeRepository::mark_absent_offline(self, present, updated_at).await
    }

    async fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<PNode>, AppError> {
        NodeRepository::list_nodes(self, filter).await
    }

    async fn get_node(&self, pubkey: &str) -> Result<Option<PNode>, AppError> {
        NodeRepository::get_node(self, pubkey).await
    }

    async fn newest_update(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        NodeRepository::newest_update(self).await
    }

    async fn record_network_stats(&self, stats: &NetworkStats) -> Result<(), AppError> {
        NodeRepository::record_network_stats(self, stats).await
    }

    async fn latest_network_stats(&self) -> Result<Option<NetworkStats>, AppError> {
        NodeRepository::latest_network_stats(self).await
    }

    async fn network_history(&self, limit: usize) -> Result<Vec<NetworkStats>, AppError> {
        NodeRepository::network_history(self, limit).await
    }

    async fn insert_notifications(&self, notifications: &[Notification]) -> Result<u64, AppError> {
        NodeRepository::insert_notifications(self, notifications).await
    }

    async fn recent_notifications(&self, limit: usize) -> Result<Vec<Notification>, AppError> {
        NodeRepository::recent_notifications(self, limit).await
    }

    async fn health_check(&self) -> Result<(), AppError> {
        NodeRepository::health_check(self).await
    }
}
