//! Batch IP geolocation through ip-api.com.
//!
//! The batch endpoint takes a JSON array of up to 100 IPs and answers with one
//! object per IP, in request order. Free-tier limits are reported through the
//! `X-Rl` (requests left) and `X-Ttl` (seconds until reset) headers.

use std::collections::HashMap;
use std::net::IpAddr;

use podwatch_core::traits::GeoLocator;
use podwatch_core::{AppError, GeoLocation, HttpConfig};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::retry::{RetryPolicy, send_with_retry};

/// Largest batch ip-api accepts per request.
pub const IP_API_MAX_BATCH: usize = 100;

const FIELDS: &str = "status,message,country,countryCode,city,lat,lon,query";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct IpApiEntry {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    query: String,
}

impl IpApiEntry {
    fn into_location(self) -> Option<(IpAddr, GeoLocation)> {
        if self.status != "success" {
            debug!(ip = %self.query, message = ?self.message, "ip-api lookup failed");
            return None;
        }
        let ip = self.query.parse().ok()?;
        Some((
            ip,
            GeoLocation {
                country: self.country.filter(|c| !c.is_empty())?,
                country_code: self.country_code.filter(|c| !c.is_empty())?,
                city: self.city.filter(|c| !c.is_empty()),
                latitude: self.lat?,
                longitude: self.lon?,
            },
        ))
    }
}

/// Client for the ip-api batch endpoint.
///
/// Rate limits are not retried here: a 429 surfaces as
/// `AppError::RateLimitExceeded` so the caller's circuit breaker can back off.
#[derive(Clone)]
pub struct IpApiClient {
    client: Client,
    url: Url,
    policy: RetryPolicy,
}

impl IpApiClient {
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if `url` does not parse.
    pub fn new(url: &str, http_config: &HttpConfig) -> Result<Self, AppError> {
        let mut url = Url::parse(url).map_err(|_| AppError::InvalidUrl(url.to_string()))?;
        url.query_pairs_mut().append_pair("fields", FIELDS);
        Ok(Self {
            client: crate::build_client(http_config.timeout)?,
            url,
            policy: RetryPolicy::from(http_config).fail_fast_on_rate_limit(),
        })
    }

    pub async fn locate(&self, ips: &[IpAddr]) -> Result<HashMap<IpAddr, GeoLocation>, AppError> {
        if ips.is_empty() {
            return Ok(HashMap::new());
        }
        if ips.len() > IP_API_MAX_BATCH {
            return Err(AppError::Generic(format!(
                "Geolocation batch of {} exceeds the limit of {}",
                ips.len(),
                IP_API_MAX_BATCH
            )));
        }

        let body: Vec<String> = ips.iter().map(|ip| ip.to_string()).collect();
        let resp = send_with_retry(
            || self.client.post(self.url.clone()).json(&body),
            &self.policy,
        )
        .await?;

        let entries: Vec<IpApiEntry> = resp
            .json()
            .await
            .map_err(|e| AppError::ClientError(format!("Invalid ip-api response: {}", e)))?;

        Ok(entries
            .into_iter()
            .filter_map(IpApiEntry::into_location)
            .collect())
    }
}

impl GeoLocator for IpApiClient {
    fn max_batch_size(&self) -> usize {
        IP_API_MAX_BATCH
    }

    async fn locate_batch(&self, ips: &[IpAddr]) -> Result<HashMap<IpAddr, GeoLocation>, AppError> {
        self.locate(ips).await
    }
}
