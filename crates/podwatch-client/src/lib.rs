//! podwatch Client - HTTP clients for external APIs
//!
//! This crate provides HTTP clients for interacting with:
//!
//! - [`rpc`] - pRPC seed nodes (JSON-RPC gossip view)
//! - [`credits`] - the pod credits API
//! - [`geo`] - ip-api.com batch geolocation
//! - [`probe`] - HEAD latency probes against node endpoints
//!
//! # Overview
//!
//! Each client implements the matching trait from `podwatch_core::traits`.
//! Request retries, rate-limit backoff and error mapping are shared through
//! [`retry::send_with_retry`].

use std::time::Duration;

use podwatch_core::AppError;
use reqwest::Client;

pub mod credits;
pub mod geo;
pub mod probe;
pub mod retry;
pub mod rpc;

// Re-export main client types
pub use credits::CreditsClient;
pub use geo::IpApiClient;
pub use probe::HttpLatencyProbe;
pub use retry::RetryPolicy;
pub use rpc::{PodRpcClient, PodRpcFactory};

pub(crate) const USER_AGENT: &str = concat!("podwatch/", env!("CARGO_PKG_VERSION"));

pub(crate) fn build_client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::ClientError(e.to_string()))
}
