//! Shared retry loop for outbound HTTP requests.

use std::time::Duration;

use podwatch_core::{AppError, HttpConfig};
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, Response, StatusCode};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry limits for one kind of request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts for server errors, timeouts and connection failures.
    pub max_retries: u32,
    /// Attempts for 429 responses. Higher than `max_retries` because rate
    /// limits are transient: with a 500ms base and a 30s cap this waits
    /// 1s, 2s, 4s, 8s, 16s, then 30s per attempt.
    pub rate_limit_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Client timeout, reported in [`AppError::Timeout`].
    pub timeout: Duration,
}

impl RetryPolicy {
    pub const RATE_LIMIT_MAX_RETRIES: u32 = 10;
    pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

    /// Gives up on the first 429 so the caller's circuit breaker sees it.
    pub fn fail_fast_on_rate_limit(mut self) -> Self {
        self.rate_limit_attempts = 1;
        self
    }

    fn rate_limit_delay(&self, attempt: u32, headers: &HeaderMap) -> Duration {
        retry_after(headers).unwrap_or_else(|| {
            self.base_delay
                .saturating_mul(2_u32.saturating_pow(attempt))
                .min(self.max_delay)
        })
    }
}

impl From<&HttpConfig> for RetryPolicy {
    fn from(config: &HttpConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            rate_limit_attempts: Self::RATE_LIMIT_MAX_RETRIES.max(config.max_retries),
            base_delay: config.retry_base_delay,
            max_delay: Self::MAX_RETRY_DELAY,
            timeout: config.timeout,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

/// Server-requested wait: `Retry-After` in seconds, else ip-api's `X-Ttl`.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    ["retry-after", "x-ttl"].iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    })
}

/// Sends the request built by `build` until it succeeds or retries run out.
///
/// * 2xx returns the response
/// * 429 waits per [`retry_after`] or exponential backoff, then
///   [`AppError::RateLimitExceeded`] once `rate_limit_attempts` are spent
/// * 5xx, timeouts and connection failures back off linearly up to
///   `max_retries`
/// * any other status fails immediately with [`AppError::ClientError`]
pub async fn send_with_retry<F>(build: F, policy: &RetryPolicy) -> Result<Response, AppError>
where
    F: Fn() -> RequestBuilder,
{
    let max_retries = policy.max_retries.max(1);
    let effective_max = policy.rate_limit_attempts.max(max_retries);
    let mut last_error = AppError::Generic("No attempts made".to_string());

    for attempt in 1..=effective_max {
        match build().send().await {
            Ok(resp) => {
                let status = resp.status();

                if status.is_success() {
                    return Ok(resp);
                }

                if status == StatusCode::TOO_MANY_REQUESTS {
                    if attempt >= policy.rate_limit_attempts {
                        return Err(AppError::RateLimitExceeded);
                    }
                    let delay = policy.rate_limit_delay(attempt, resp.headers());
                    debug!(
                        url = %resp.url(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    sleep(delay).await;
                    continue;
                }

                if status.is_server_error() {
                    last_error =
                        AppError::ClientError(format!("Server error: HTTP {}", status.as_u16()));
                    if attempt < max_retries {
                        warn!(url = %resp.url(), status = status.as_u16(), attempt, "Server error, retrying");
                        sleep(policy.base_delay * attempt).await;
                        continue;
                    }
                    return Err(last_error);
                }

                return Err(AppError::ClientError(format!(
                    "HTTP {} from {}",
                    status.as_u16(),
                    resp.url()
                )));
            }
            Err(e) => {
                let transient = e.is_timeout() || e.is_connect();
                last_error = if e.is_timeout() {
                    AppError::Timeout(policy.timeout.as_secs())
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {}", e))
                } else {
                    AppError::ClientError(e.to_string())
                };

                if transient && attempt < max_retries {
                    warn!(error = %e, attempt, "Request failed, retrying");
                    sleep(policy.base_delay * attempt).await;
                    continue;
                }
                return Err(last_error);
            }
        }
    }

    Err(last_error)
}
