//! Circuit breaker around geolocation lookups.
//!
//! ```text
//! CLOSED --[N transient failures]--> OPEN --[cooldown]--> HALF_OPEN
//!   ^                                  ^                      |
//!   |                                  +----[probe fails]-----+
//!   +---------------------[M probe successes]-----------------+
//! ```
//!
//! Only errors for which [`AppError::should_trip_circuit`] holds are counted.
//! A rate-limited failure that opens the circuit multiplies the cooldown,
//! up to `max_recovery_timeout`.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive transient failures before the circuit opens.
    pub failure_threshold: u32,
    /// Successful probes while half-open before the circuit closes.
    pub success_threshold: u32,
    /// Cooldown before an open circuit lets a probe through.
    pub recovery_timeout: Duration,
    pub rate_limit_backoff_multiplier: f32,
    pub max_recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(30),
            rate_limit_backoff_multiplier: 2.0,
            max_recovery_timeout: Duration::from_secs(300),
        }
    }
}

impl CircuitBreakerConfig {
    /// Reads `CB_FAILURE_THRESHOLD`, `CB_SUCCESS_THRESHOLD` and
    /// `CB_RECOVERY_TIMEOUT_SECS` through `lookup`, falling back to defaults.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let threshold = |key: &str, default: u32| {
            parse(key)
                .map(|v| u32::try_from(v.max(1)).unwrap_or(u32::MAX))
                .unwrap_or(default)
        };

        Self {
            failure_threshold: threshold("CB_FAILURE_THRESHOLD", defaults.failure_threshold),
            success_threshold: threshold("CB_SUCCESS_THRESHOLD", defaults.success_threshold),
            recovery_timeout: parse("CB_RECOVERY_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.recovery_timeout),
            ..defaults
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen { successes: u32 },
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    cooldown: Duration,
}

/// Outcome of [`CircuitBreaker::call`].
#[derive(Debug)]
pub enum CircuitBreakerError {
    /// Rejected without calling the service.
    Open { name: String, retry_after: Duration },
    /// The wrapped call failed.
    Inner(AppError),
}

/// Shared breaker; clones see the same state.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let inner = Inner {
            phase: Phase::Closed { failures: 0 },
            cooldown: config.recovery_timeout,
        };
        Self {
            name: name.into(),
            config,
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let phase = inner.phase;
        if let Phase::Open { since } = phase {
            if since.elapsed() >= inner.cooldown {
                tracing::info!(circuit = %self.name, "Circuit breaker half-open");
                inner.phase = Phase::HalfOpen { successes: 0 };
            }
        }
        inner
    }

    pub fn state(&self) -> CircuitState {
        match self.lock().phase {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Time left before an open circuit admits a probe; `None` unless open.
    pub fn retry_after(&self) -> Option<Duration> {
        let inner = self.lock();
        let phase = inner.phase;
        match phase {
            Phase::Open { since } => Some(inner.cooldown.saturating_sub(since.elapsed())),
            _ => None,
        }
    }

    /// Runs `operation` unless the circuit is open, recording the outcome.
    pub async fn call<F, T, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if let Some(retry_after) = self.retry_after() {
            return Err(CircuitBreakerError::Open {
                name: self.name.clone(),
                retry_after,
            });
        }

        let result = operation().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(e) if e.should_trip_circuit() => self.record_failure(e),
            Err(_) => {}
        }
        result.map_err(CircuitBreakerError::Inner)
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        let phase = inner.phase;
        match phase {
            Phase::Closed { .. } => inner.phase = Phase::Closed { failures: 0 },
            Phase::HalfOpen { successes } if successes + 1 >= self.config.success_threshold => {
                tracing::info!(circuit = %self.name, "Circuit breaker closed");
                inner.phase = Phase::Closed { failures: 0 };
                inner.cooldown = self.config.recovery_timeout;
            }
            Phase::HalfOpen { successes } => {
                inner.phase = Phase::HalfOpen {
                    successes: successes + 1,
                }
            }
            Phase::Open { .. } => {}
        }
    }

    fn record_failure(&self, error: &AppError) {
        let mut inner = self.lock();
        let phase = inner.phase;
        let opens = match phase {
            Phase::Closed { failures } => {
                let failures = failures + 1;
                inner.phase = Phase::Closed { failures };
                failures >= self.config.failure_threshold
            }
            Phase::HalfOpen { .. } => true,
            Phase::Open { .. } => false,
        };
        if !opens {
            return;
        }

        if matches!(error, AppError::RateLimitExceeded) {
            let scaled = inner
                .cooldown
                .mul_f32(self.config.rate_limit_backoff_multiplier.max(1.0));
            inner.cooldown = scaled.min(self.config.max_recovery_timeout);
        }
        tracing::warn!(
            circuit = %self.name,
            error = %error,
            cooldown_secs = inner.cooldown.as_secs(),
            "Circuit breaker opened"
        );
        inner.phase = Phase::Open {
            since: Instant::now(),
        };
    }

    #[cfg(test)]
    fn failures(&self) -> u32 {
        match self.lock().phase {
            Phase::Closed { failures } => failures,
            _ => 0,
        }
    }
}
