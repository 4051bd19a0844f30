//! Progress reporting for ingestion runs.
//!
//! [`IngestService`](crate::ingest::IngestService) emits an [`IngestEvent`] at
//! each pipeline stage. Frontends decide what to do with them: the CLI and
//! server log them through [`TracingReporter`], tests use [`SilentReporter`].

use tracing::{info, warn};

use crate::models::IngestStats;

/// Events emitted during one ingestion run.
#[derive(Debug, Clone)]
pub enum IngestEvent<'a> {
    Started { sources: usize },
    SourceFetched { endpoint: &'a str, pods: usize },
    SourceFailed { endpoint: &'a str, error: &'a str },
    Deduplicated { unique: usize, duplicates: usize },
    CreditsFetched { entries: usize },
    CreditsUnavailable { error: &'a str },
    Geolocated { resolved: usize, requested: usize },
    LatencyProbed { reachable: usize, probed: usize },
    NodesStored { upserted: u64, marked_offline: u64 },
    NotificationsWritten { count: u64 },
    /// A non-fatal step failed and was skipped.
    StepSkipped { step: &'a str, error: &'a str },
    Completed { stats: &'a IngestStats },
}

/// Receiver for [`IngestEvent`]s.
pub trait ProgressReporter: Send + Sync {
    /// The default implementation does nothing.
    fn report(&self, event: IngestEvent<'_>) {
        let _ = event;
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: IngestEvent<'_>) {
        match event {
            IngestEvent::Started { sources } => {
                info!(sources, "Ingestion started");
            }
            IngestEvent::SourceFetched { endpoint, pods } => {
                info!(endpoint, pods, "Fetched pods from source");
            }
            IngestEvent::SourceFailed { endpoint, error } => {
                warn!(endpoint, error, "Source failed");
            }
            IngestEvent::Deduplicated { unique, duplicates } => {
                info!(unique, duplicates, "Deduplicated pods");
            }
            IngestEvent::CreditsFetched { entries } => {
                info!(entries, "Fetched credits");
            }
            IngestEvent::CreditsUnavailable { error } => {
                warn!(error, "Credits unavailable, scoring every node 0");
            }
            IngestEvent::Geolocated {
                resolved,
                requested,
            } => {
                info!(resolved, requested, "Geolocated IPs");
            }
            IngestEvent::LatencyProbed { reachable, probed } => {
                info!(reachable, probed, "Probed latency");
            }
            IngestEvent::NodesStored {
                upserted,
                marked_offline,
            } => {
                info!(upserted, marked_offline, "Stored nodes");
            }
            IngestEvent::NotificationsWritten { count } => {
                tracing::debug!(count, "Wrote notifications");
            }
            IngestEvent::StepSkipped { step, error } => {
                warn!(step, error, "Ingestion step skipped");
            }
            IngestEvent::Completed { stats } => {
                info!(
                    fetched = stats.fetched,
                    unique = stats.unique,
                    upserted = stats.upserted,
                    reachable = stats.reachable,
                    geolocated = stats.geolocated,
                    "Ingestion completed"
                );
            }
        }
    }
}
