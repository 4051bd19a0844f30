//! Bounded-concurrency latency probing with per-IP memoization.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::cache::{DEFAULT_CACHE_CAPACITY, TtlCache};
use crate::traits::LatencyProbe;

/// Probes node endpoints, at most `concurrency` at a time.
///
/// Both outcomes are memoized for `cache_ttl`: a latency for reachable IPs and
/// `None` for IPs that failed or timed out.
#[derive(Clone)]
pub struct LatencyProber<P: LatencyProbe> {
    probe: P,
    cache: Arc<TtlCache<IpAddr, Option<u32>>>,
    cache_ttl: Duration,
    concurrency: usize,
    timeout: Duration,
}

impl<P: LatencyProbe> LatencyProber<P> {
    pub fn new(probe: P, concurrency: usize, timeout: Duration, cache_ttl: Duration) -> Self {
        Self {
            probe,
            cache: Arc::new(TtlCache::with_ttl(DEFAULT_CACHE_CAPACITY, cache_ttl)),
            cache_ttl,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = Arc::new(TtlCache::with_ttl(capacity, self.cache_ttl));
        self
    }

    pub fn cache(&self) -> &TtlCache<IpAddr, Option<u32>> {
        &self.cache
    }

    /// Measures latency for each `(ip, endpoint)` target.
    ///
    /// Only the first endpoint seen for an IP is probed. The result has one
    /// entry per unique IP; `None` means unreachable.
    pub async fn probe_all(
        &self,
        targets: impl IntoIterator<Item = (IpAddr, String)>,
    ) -> HashMap<IpAddr, Option<u32>> {
        let mut results: HashMap<IpAddr, Option<u32>> = HashMap::new();
        let mut pending: Vec<(IpAddr, String)> = Vec::new();
        let mut seen = HashSet::new();

        for (ip, endpoint) in targets {
            if !seen.insert(ip) {
                continue;
            }
            match self.cache.get(&ip) {
                Some(latency) => {
                    results.insert(ip, latency);
                }
                None => pending.push((ip, endpoint)),
            }
        }

        let timeout = self.timeout;
        let measured: Vec<(IpAddr, Option<u32>)> = stream::iter(pending)
            .map(|(ip, endpoint)| {
                let probe = self.probe.clone();
                async move {
                    let latency = match tokio::time::timeout(timeout, probe.probe(&endpoint)).await {
                        Ok(Ok(ms)) => Some(ms),
                        Ok(Err(e)) => {
                            tracing::debug!(%ip, error = %e, "Probe failed");
                            None
                        }
                        Err(_) => {
                            tracing::debug!(%ip, timeout_ms = timeout.as_millis() as u64, "Probe timed out");
                            None
                        }
                    };
                    (ip, latency)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        self.cache.insert_many(measured.iter().copied());
        results.extend(measured);
        results
    }
}
