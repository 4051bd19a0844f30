//! podwatch Server - REST API for pNode inventories and network metrics
//!
//! This crate exposes the podwatch read path over HTTP:
//!
//! - **Nodes**: ranked pNodes with filters by status, country and tier
//! - **Network**: current aggregate and recorded snapshot history
//! - **Metrics**: decentralization, health, censorship resistance, X-scores
//! - **Notifications**: joins, outages, recoveries and tier changes
//! - **Refresh**: admin-only manual ingestion
//!
//! # API Documentation
//!
//! When running the server, interactive API documentation is available
//! at `/swagger-ui`.

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod router;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use router::create_router;
pub use state::AppState;
