//! Client for the pod credits API.

use std::collections::HashMap;

use podwatch_core::traits::CreditsSource;
use podwatch_core::{AppError, HttpConfig};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::retry::{RetryPolicy, send_with_retry};

#[derive(Deserialize, Debug)]
struct CreditsResponse {
    #[serde(default)]
    pods_credits: Vec<Value>,
}

/// One row of `pods_credits`. Older deployments key rows by `pubkey`.
#[derive(Deserialize, Debug)]
struct CreditEntry {
    #[serde(alias = "pubkey")]
    pod_id: String,
    credits: f64,
}

/// Folds credit rows into a pubkey map.
///
/// Rows that do not parse, have an empty id or a non-finite balance are
/// skipped; duplicate ids keep the largest balance.
fn collect_credits(rows: Vec<Value>) -> HashMap<String, f64> {
    let mut credits: HashMap<String, f64> = HashMap::with_capacity(rows.len());
    let mut skipped = 0usize;

    for row in rows {
        let entry = match serde_json::from_value::<CreditEntry>(row) {
            Ok(entry) => entry,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        let id = entry.pod_id.trim();
        if id.is_empty() || !entry.credits.is_finite() {
            skipped += 1;
            continue;
        }
        credits
            .entry(id.to_string())
            .and_modify(|c| *c = c.max(entry.credits))
            .or_insert(entry.credits);
    }

    if skipped > 0 {
        debug!(skipped, "Skipped malformed credit rows");
    }
    credits
}

/// HTTP client for the credits feed.
#[derive(Clone)]
pub struct CreditsClient {
    client: Client,
    url: Url,
    policy: RetryPolicy,
}

impl CreditsClient {
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if `url` does not parse.
    pub fn new(url: &str, http_config: &HttpConfig) -> Result<Self, AppError> {
        let url = Url::parse(url).map_err(|_| AppError::InvalidUrl(url.to_string()))?;
        Ok(Self {
            client: crate::build_client(http_config.timeout)?,
            url,
            policy: RetryPolicy::from(http_config),
        })
    }

    #[cfg(test)]
    fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn fetch_credits(&self) -> Result<HashMap<String, f64>, AppError> {
        let resp = send_with_retry(|| self.client.get(self.url.clone()), &self.policy).await?;

        let body: CreditsResponse = resp
            .json()
            .await
            .map_err(|e| AppError::ClientError(format!("Invalid credits response: {}", e)))?;

        Ok(collect_credits(body.pods_credits))
    }
}

impl CreditsSource for CreditsClient {
    async fn fetch_credits(&self) -> Result<HashMap<String, f64>, AppError> {
        CreditsClient::fetch_credits(self).await
    }
}
