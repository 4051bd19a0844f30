//! HTTP request handlers for API endpoints.

pub mod health;
pub mod metrics;
pub mod network;
pub mod nodes;
pub mod notifications;
pub mod refresh;
