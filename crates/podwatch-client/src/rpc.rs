//! JSON-RPC client for pRPC seed nodes.
//!
//! Seeds expose the gossip view of the network through two methods:
//! `get-pods-with-stats` (newer nodes, includes storage and uptime) and
//! `get-pods` (older nodes, address and version only). Both answer with the
//! same envelope:
//!
//! ```json
//! {"jsonrpc": "2.0", "id": 1, "result": {"pods": [...], "total_count": 42}}
//! ```

use podwatch_core::traits::{PodSource, PodSourceFactory};
use podwatch_core::{AppError, HttpConfig, RawPod};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::retry::{RetryPolicy, send_with_retry};

/// JSON-RPC code for an unknown method.
const METHOD_NOT_FOUND: i64 = -32601;

const GET_PODS_WITH_STATS: &str = "get-pods-with-stats";
const GET_PODS: &str = "get-pods";

#[derive(Serialize, Debug)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    id: u64,
}

#[derive(Deserialize, Debug)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize, Debug)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

/// `result` payload of both pod listing methods.
///
/// Pod records stay untyped until [`collect_pods`], so one malformed record
/// does not reject the whole seed.
#[derive(Deserialize, Debug, Clone)]
pub struct PodsResult {
    #[serde(default)]
    pub pods: Vec<Value>,
    #[serde(default)]
    pub total_count: Option<usize>,
}

/// Client for a single pRPC endpoint.
///
/// # Examples
///
/// ```no_run
/// use podwatch_client::PodRpcClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = PodRpcClient::new("http://127.0.0.1:6000/rpc")?;
/// let pods = client.fetch_pods().await?;
/// println!("{} pods in gossip", pods.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PodRpcClient {
    client: Client,
    endpoint: Url,
    policy: RetryPolicy,
}

impl PodRpcClient {
    /// Creates a client with its own connection pool and default HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidSourceUrl` if the URL is not an http(s) URL.
    pub fn new(endpoint: &str) -> Result<Self, AppError> {
        let http_config = HttpConfig::default();
        let client = crate::build_client(http_config.timeout)?;
        Self::with_client(client, endpoint, RetryPolicy::from(&http_config))
    }

    /// Creates a client sharing an existing connection pool.
    pub fn with_client(client: Client, endpoint: &str, policy: RetryPolicy) -> Result<Self, AppError> {
        Ok(Self {
            client,
            endpoint: parse_source_url(endpoint)?,
            policy,
        })
    }

    async fn call(&self, method: &str) -> Result<PodsResult, AppError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            id: 1,
        };

        let resp = send_with_retry(
            || self.client.post(self.endpoint.clone()).json(&request),
            &self.policy,
        )
        .await?;

        let body: RpcResponse<PodsResult> = resp
            .json()
            .await
            .map_err(|e| AppError::ClientError(format!("Invalid pRPC response: {}", e)))?;

        if let Some(error) = body.error {
            return Err(AppError::RpcError {
                code: error.code,
                message: error.message,
            });
        }

        body.result.ok_or(AppError::EmptyResponse)
    }

    /// Calls `get-pods-with-stats`.
    pub async fn get_pods_with_stats(&self) -> Result<PodsResult, AppError> {
        self.call(GET_PODS_WITH_STATS).await
    }

    /// Calls the older `get-pods` method.
    pub async fn get_pods(&self) -> Result<PodsResult, AppError> {
        self.call(GET_PODS).await
    }

    /// Lists pods, falling back to `get-pods` on seeds that predate the stats
    /// method.
    pub async fn fetch_pods(&self) -> Result<Vec<RawPod>, AppError> {
        let result = match self.get_pods_with_stats().await {
            Err(AppError::RpcError { code, .. }) if code == METHOD_NOT_FOUND => {
                debug!(endpoint = %self.endpoint, "get-pods-with-stats unsupported, using get-pods");
                self.get_pods().await?
            }
            other => other?,
        };

        if let Some(total) = result.total_count {
            if total != result.pods.len() {
                debug!(
                    endpoint = %self.endpoint,
                    total,
                    returned = result.pods.len(),
                    "Seed reported a different total_count"
                );
            }
        }

        Ok(collect_pods(result.pods))
    }
}

/// Converts raw pod records, skipping those without a usable identity.
///
/// Records that fail strict parsing are salvaged field by field: `pubkey`
/// and `address` must be non-empty strings and `last_seen_timestamp` an
/// integer (or an integer string). Stats fields that are out of range or of
/// the wrong type become `None`.
pub fn collect_pods(rows: Vec<Value>) -> Vec<RawPod> {
    let mut pods = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;

    for row in rows {
        let pod = match serde_json::from_value::<RawPod>(row.clone()) {
            Ok(pod) => Some(pod),
            Err(_) => salvage_pod(&row),
        };
        match pod {
            Some(pod) if !pod.pubkey.trim().is_empty() => pods.push(pod),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(skipped, "Skipped malformed pod records");
    }
    pods
}

fn salvage_pod(row: &Value) -> Option<RawPod> {
    let non_empty = |key: &str| {
        row.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let last_seen_timestamp = match row.get("last_seen_timestamp") {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n.as_i64()?,
        Some(Value::String(s)) => s.trim().parse().ok()?,
        Some(_) => return None,
    };
    let u64_field = |key: &str| row.get(key).and_then(Value::as_u64);

    Some(RawPod {
        pubkey: non_empty("pubkey")?,
        address: non_empty("address")?,
        version: non_empty("version"),
        last_seen_timestamp,
        is_public: row.get("is_public").and_then(Value::as_bool),
        rpc_port: u64_field("rpc_port").and_then(|p| u16::try_from(p).ok()),
        storage_committed: u64_field("storage_committed"),
        storage_used: u64_field("storage_used"),
        storage_usage_percent: row
            .get("storage_usage_percent")
            .and_then(Value::as_f64)
            .filter(|p| p.is_finite()),
        uptime: u64_field("uptime"),
    })
}

fn parse_source_url(endpoint: &str) -> Result<Url, AppError> {
    let url = Url::parse(endpoint).map_err(|_| AppError::InvalidSourceUrl(endpoint.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(AppError::InvalidSourceUrl(endpoint.to_string())),
    }
}

impl PodSource for PodRpcClient {
    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    async fn fetch_pods(&self) -> Result<Vec<RawPod>, AppError> {
        PodRpcClient::fetch_pods(self).await
    }
}

/// Creates [`PodRpcClient`]s that share one connection pool.
#[derive(Clone)]
pub struct PodRpcFactory {
    client: Client,
    policy: RetryPolicy,
}

impl PodRpcFactory {
    pub fn new(http_config: &HttpConfig) -> Result<Self, AppError> {
        Ok(Self {
            client: crate::build_client(http_config.timeout)?,
            policy: RetryPolicy::from(http_config),
        })
    }
}

impl PodSourceFactory for PodRpcFactory {
    type Source = PodRpcClient;

    fn create(&self, endpoint: &str) -> Result<Self::Source, AppError> {
        PodRpcClient::with_client(self.client.clone(), endpoint, self.policy.clone())
    }
}
