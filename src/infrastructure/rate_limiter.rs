//! Rate Limiter
//!
//! Process-wide permit limiter for outbound provider calls.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum permits granted within any window
    pub max_requests: u64,
    /// Length of the sliding window
    pub window: Duration,
}

impl RateLimitConfig {
    /// `n` permits per second.
    pub fn per_second(n: u64) -> Self {
        Self {
            max_requests: n,
            window: Duration::from_secs(1),
        }
    }
}

/// Sliding-window permit limiter.
///
/// Every permit is a token stamped with its grant time; a token returns to
/// the bucket exactly one window after it was spent. This gives a hard
/// ceiling: no span of `window` length ever contains more than
/// `max_requests` grants, regardless of how many tasks are acquiring.
pub struct RateLimiter {
    config: RateLimitConfig,
    /// Grant times still inside the window, oldest first
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter. A zero ceiling is raised to one.
    pub fn new(mut config: RateLimitConfig) -> Self {
        config.max_requests = config.max_requests.max(1);
        Self {
            grants: Mutex::new(VecDeque::new()),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Wait until a permit is free and take it.
    ///
    /// This is the only suspension point of the limiter. Waiters are not
    /// queued; whoever polls first after a permit frees up gets it.
    pub async fn acquire(&self) {
        loop {
            match self.poll_permit() {
                Ok(_) => return,
                Err(wait) => {
                    tracing::trace!("rate limit reached, waiting {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Permits available right now.
    pub fn remaining(&self) -> u64 {
        let now = Instant::now();
        let mut grants = self.grants.lock();
        Self::evict(&mut grants, now, self.config.window);
        self.config.max_requests - grants.len() as u64
    }

    /// `Ok(remaining)` after taking a permit, or `Err(wait)` until the
    /// oldest grant leaves the window.
    fn poll_permit(&self) -> Result<u64, Duration> {
        let now = Instant::now();
        let mut grants = self.grants.lock();
        Self::evict(&mut grants, now, self.config.window);

        let used = grants.len() as u64;
        if used < self.config.max_requests {
            grants.push_back(now);
            return Ok(self.config.max_requests - used - 1);
        }

        let wait = grants
            .front()
            .map(|oldest| (*oldest + self.config.window).saturating_duration_since(now))
            .unwrap_or(self.config.window);
        Err(wait)
    }

    fn evict(grants: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = grants.front() {
            if now.duration_since(*oldest) >= window {
                grants.pop_front();
            } else {
                break;
            }
        }
    }
}
