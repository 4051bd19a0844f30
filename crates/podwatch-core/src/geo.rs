//! Batched, memoized geolocation of node IPs.
//!
//! Lookups are chunked to the locator's batch limit and issued one chunk at a
//! time through a circuit breaker, so a rate-limited or unreachable service
//! costs at most a few failed requests per run. Results are memoized in an
//! in-process [`TtlCache`] shared by every run of the owning service.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{DEFAULT_CACHE_CAPACITY, TtlCache};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use crate::models::GeoLocation;
use crate::traits::GeoLocator;

/// True for addresses a public geolocation service can resolve.
pub fn is_routable(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation())
        }
        IpAddr::V6(v6) => {
            !(v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_unique_local()
                || v6.is_unicast_link_local())
        }
    }
}

#[derive(Clone)]
pub struct GeoBatcher<G: GeoLocator> {
    locator: G,
    cache: Arc<TtlCache<IpAddr, GeoLocation>>,
    cache_ttl: Duration,
    circuit_breaker: CircuitBreaker,
    batch_size: usize,
}

impl<G: GeoLocator> GeoBatcher<G> {
    pub fn new(
        locator: G,
        batch_size: usize,
        cache_ttl: Duration,
        circuit_breaker: CircuitBreakerConfig,
    ) -> Self {
        Self {
            locator,
            cache: Arc::new(TtlCache::with_ttl(DEFAULT_CACHE_CAPACITY, cache_ttl)),
            cache_ttl,
            circuit_breaker: CircuitBreaker::new("geolocation", circuit_breaker),
            batch_size: batch_size.max(1),
        }
    }

    /// Replaces the memo with an empty one holding at most `capacity` IPs.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = Arc::new(TtlCache::with_ttl(capacity, self.cache_ttl));
        self
    }

    pub fn cache(&self) -> &TtlCache<IpAddr, GeoLocation> {
        &self.cache
    }

    fn effective_batch_size(&self) -> usize {
        self.batch_size.min(self.locator.max_batch_size()).max(1)
    }

    /// Resolves as many of `ips` as possible.
    ///
    /// Non-routable and duplicate IPs are skipped. Chunk failures are logged and
    /// skipped; an open circuit abandons the remaining chunks.
    pub async fn locate(&self, ips: impl IntoIterator<Item = IpAddr>) -> HashMap<IpAddr, GeoLocation> {
        let mut resolved = HashMap::new();
        let mut seen = HashSet::new();
        let mut misses = Vec::new();

        for ip in ips {
            if !is_routable(&ip) || !seen.insert(ip) {
                continue;
            }
            match self.cache.get(&ip) {
                Some(location) => {
                    resolved.insert(ip, location);
                }
                None => misses.push(ip),
            }
        }

        let cached = resolved.len();
        let batch_size = self.effective_batch_size();

        for chunk in misses.chunks(batch_size) {
            match self
                .circuit_breaker
                .call(|| self.locator.locate_batch(chunk))
                .await
            {
                Ok(found) => {
                    self.cache
                        .insert_many(found.iter().map(|(ip, loc)| (*ip, loc.clone())));
                    resolved.extend(found);
                }
                Err(CircuitBreakerError::Open { retry_after, .. }) => {
                    tracing::warn!(
                        retry_after_secs = retry_after.as_secs(),
                        "Geolocation circuit open, skipping remaining lookups"
                    );
                    break;
                }
                Err(CircuitBreakerError::Inner(e)) => {
                    tracing::warn!(
                        chunk_size = chunk.len(),
                        error = %e,
                        "Geolocation chunk failed"
                    );
                }
            }
        }

        tracing::debug!(
            cached,
            looked_up = misses.len(),
            resolved = resolved.len(),
            "Geolocation finished"
        );

        resolved
    }
}
