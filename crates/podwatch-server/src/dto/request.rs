//! Request DTOs for API endpoints.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use podwatch_core::{NodeFilter, NodeStatus, PerformanceTier};

use crate::error::ApiError;

/// Maximum number of rows any list endpoint returns.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Query parameters for listing nodes.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct NodesQuery {
    /// Filter by status: online or offline
    #[param(example = "online")]
    pub status: Option<String>,

    /// Filter by ISO country code (case-insensitive)
    #[param(example = "DE")]
    pub country: Option<String>,

    /// Filter by performance tier: excellent, good, fair or poor
    #[param(example = "excellent")]
    pub tier: Option<String>,

    /// Maximum number of nodes (max: 1000)
    #[param(example = 50)]
    pub limit: Option<usize>,
}

impl NodesQuery {
    /// Validates the query into a store filter.
    pub fn into_filter(self) -> Result<NodeFilter, ApiError> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<NodeStatus>)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let tier = self
            .tier
            .as_deref()
            .map(str::parse::<PerformanceTier>)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let country = self
            .country
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());

        Ok(NodeFilter {
            status,
            country,
            tier,
            limit: self.limit.map(|l| l.min(MAX_LIST_LIMIT)),
            include_absent: false,
        })
    }
}

/// Query parameters for endpoints that only take a row limit.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct LimitQuery {
    /// Maximum number of rows (max: 1000)
    #[param(example = 20)]
    pub limit: Option<usize>,
}

impl LimitQuery {
    /// The requested limit clamped to `1..=MAX_LIST_LIMIT`, or `default`.
    pub fn resolve(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).clamp(1, MAX_LIST_LIMIT)
    }
}
