//! HTTP latency probe.

use std::time::{Duration, Instant};

use podwatch_core::AppError;
use podwatch_core::traits::LatencyProbe;
use reqwest::Client;

/// Measures the time to the first HTTP response of a `HEAD` request.
///
/// Any status counts as reachable: nodes commonly answer the pRPC root with
/// 404 or 405, which still proves the host is up. Redirects are not followed.
#[derive(Clone)]
pub struct HttpLatencyProbe {
    client: Client,
    timeout: Duration,
}

impl HttpLatencyProbe {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    /// Round-trip time to `endpoint` in milliseconds.
    pub async fn measure(&self, endpoint: &str) -> Result<u32, AppError> {
        let start = Instant::now();
        match self.client.head(endpoint).send().await {
            Ok(_) => Ok(u32::try_from(start.elapsed().as_millis()).unwrap_or(u32::MAX)),
            Err(e) if e.is_timeout() => Err(AppError::Timeout(self.timeout.as_secs())),
            Err(e) if e.is_connect() => Err(AppError::NetworkError(e.to_string())),
            Err(e) => Err(AppError::ClientError(e.to_string())),
        }
    }
}

impl LatencyProbe for HttpLatencyProbe {
    async fn probe(&self, endpoint: &str) -> Result<u32, AppError> {
        self.measure(endpoint).await
    }
}
