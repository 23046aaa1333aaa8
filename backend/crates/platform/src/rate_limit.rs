//! Rate Limiting Infrastructure
//!
//! Fixed-window counters on top of any [`KeyValueStore`]: the first hit in a
//! window creates the counter with the window as its TTL, later hits only
//! increment it, and the counter disappears when the window elapses.

use std::time::Duration;

use crate::kv::{KeyValueStore, KvResult};

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

/// Rate limit check result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Counter value including this attempt
    pub count: u64,
    pub limit: u32,
    /// `max(limit - count, 0)`
    pub remaining: u32,
    /// Time until the current window resets
    pub reset_after: Duration,
}

impl RateLimitResult {
    fn evaluate(count: i64, config: &RateLimitConfig, reset_after: Duration) -> Self {
        let count = count.max(0) as u64;
        let limit = config.max_requests;
        Self {
            allowed: count <= u64::from(limit),
            count,
            limit,
            remaining: u64::from(limit).saturating_sub(count) as u32,
            reset_after,
        }
    }

    /// Whole minutes to wait, rounded up the way users read it ("in 1 minute"
    /// rather than "in 0 minutes").
    pub fn retry_after_minutes(&self) -> u64 {
        self.reset_after.as_secs() / 60 + 1
    }
}

/// Trait for rate limit storage backends
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Count this attempt and report whether it is within the limit
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> KvResult<RateLimitResult>;
}

impl<S> RateLimitStore for S
where
    S: KeyValueStore + Sync,
{
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> KvResult<RateLimitResult> {
        let count = self.incr_with_ttl(key, config.window).await?;
        let reset_after = self.ttl(key).await?.unwrap_or(config.window);
        Ok(RateLimitResult::evaluate(count, config, reset_after))
    }
}
