//! Rate-Limited Provider Client
//!
//! Wraps a raw [`GeocodeProvider`] with the process-wide rate limiter,
//! a per-call timeout and exponential-backoff retries.

use crate::application::engine_config::EngineConfig;
use crate::domain::entities::Coordinate;
use crate::domain::error::GeocodeError;
use crate::domain::ports::GeocodeProvider;
use crate::domain::value_objects::NormalizedKey;
use crate::infrastructure::rate_limiter::RateLimiter;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Retry schedule for retryable provider failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base: Duration,
    /// Upper bound for any single delay
    pub max: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base: config.backoff_base,
            max: config.backoff_max,
        }
    }

    /// Undithered delay before retry number `attempt` (0-based).
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Delay before retry number `attempt`, with up to 50% jitter taken off.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        let scale = rand::thread_rng().gen_range(0.5..=1.0);
        ceiling.mul_f64(scale)
    }
}

/// Provider client shared by every worker of every batch.
///
/// Each attempt, first or retry, waits for a permit from the shared
/// [`RateLimiter`] before reaching the provider, so retries count against
/// the same ceiling as fresh lookups. `ProviderRejected` is terminal.
/// Timeouts, throttling and transient failures are retried up to
/// `max_retries` times; after that the last error is returned.
pub struct RateLimitedProvider {
    inner: Arc<dyn GeocodeProvider>,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl RateLimitedProvider {
    pub fn new(
        inner: Arc<dyn GeocodeProvider>,
        limiter: Arc<RateLimiter>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner,
            limiter,
            timeout,
            retry,
        }
    }

    /// Build from engine configuration around an existing limiter.
    pub fn from_config(
        inner: Arc<dyn GeocodeProvider>,
        limiter: Arc<RateLimiter>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(
            inner,
            limiter,
            config.provider_timeout,
            RetryPolicy::from_config(config),
        )
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    async fn attempt(&self, key: &NormalizedKey) -> Result<Coordinate, GeocodeError> {
        self.limiter.acquire().await;

        match tokio::time::timeout(self.timeout, self.inner.resolve(key)).await {
            Ok(result) => result,
            Err(_) => Err(GeocodeError::ProviderTimeout(self.timeout)),
        }
    }
}

#[async_trait]
impl GeocodeProvider for RateLimitedProvider {
    async fn resolve(&self, key: &NormalizedKey) -> Result<Coordinate, GeocodeError> {
        let mut retries = 0;

        loop {
            match self.attempt(key).await {
                Ok(coordinate) => return Ok(coordinate),
                Err(e) if e.is_retryable() && retries < self.retry.max_retries => {
                    let delay = self.retry.backoff(retries);
                    tracing::debug!(
                        "lookup {} failed ({}), retry {}/{} in {:?}",
                        key,
                        e,
                        retries + 1,
                        self.retry.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::warn!("lookup {} gave up after {} retries: {}", key, retries, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}
