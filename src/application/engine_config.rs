//! Engine Configuration
//!
//! Tunables for the batch scheduler and the rate-limited provider client.

use std::time::Duration;

/// Configuration for the geocoding engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on simultaneous provider calls (default: 8)
    pub max_concurrent_workers: usize,

    /// Global ceiling on provider calls per second, retries included (default: 10)
    pub rate_limit_per_second: u64,

    /// Per-call provider timeout (default: 5s)
    pub provider_timeout: Duration,

    /// Retries after the first attempt for transient failures (default: 3)
    pub max_retries: u32,

    /// Overall budget for one batch (default: 30s)
    pub batch_deadline: Duration,

    /// First backoff delay, doubled on each retry (default: 100ms)
    pub backoff_base: Duration,

    /// Backoff cap (default: 2s)
    pub backoff_max: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workers: 8,
            rate_limit_per_second: 10,
            provider_timeout: Duration::from_millis(5000),
            max_retries: 3,
            batch_deadline: Duration::from_millis(30_000),
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_secs(2),
        }
    }
}

impl EngineConfig {
    /// Set the worker pool size.
    pub fn max_concurrent_workers(mut self, n: usize) -> Self {
        self.max_concurrent_workers = n;
        self
    }

    /// Set the provider rate ceiling.
    pub fn rate_limit_per_second(mut self, n: u64) -> Self {
        self.rate_limit_per_second = n;
        self
    }

    /// Set the per-call timeout.
    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Set the retry ceiling.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the batch deadline.
    pub fn batch_deadline(mut self, deadline: Duration) -> Self {
        self.batch_deadline = deadline;
        self
    }

    /// Set the backoff schedule.
    pub fn backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.rate_limit_per_second == 0 {
            return Err(ConfigError::NoRateBudget);
        }
        if self.provider_timeout.is_zero() {
            return Err(ConfigError::ZeroProviderTimeout);
        }
        if self.batch_deadline.is_zero() {
            return Err(ConfigError::ZeroBatchDeadline);
        }
        if self.backoff_max < self.backoff_base {
            return Err(ConfigError::BackoffCapBelowBase);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_concurrent_workers must be at least 1")]
    NoWorkers,
    #[error("rate_limit_per_second must be at least 1")]
    NoRateBudget,
    #[error("provider_timeout must be non-zero")]
    ZeroProviderTimeout,
    #[error("batch_deadline must be non-zero")]
    ZeroBatchDeadline,
    #[error("backoff_max must not be below backoff_base")]
    BackoffCapBelowBase,
}
