//! Login Attempt Limiter
//!
//! Two fixed windows guard the login endpoint: one per client address
//! (`login:limit:ip:<addr>`, 1 hour) and one per submitted identifier
//! (`login:limit:user:<identifier>`, 15 minutes). Every attempt counts,
//! successful or not. The limiter is advisory: when the store is down the
//! attempt goes through.

use std::sync::Arc;
use std::time::Duration;

use platform::clock::Clock;
use platform::kv::{KeyValueStore, with_deadline};
use platform::rate_limit::{RateLimitConfig, RateLimitResult, RateLimitStore};

use crate::application::config::AuthConfig;

const IP_KEY_PREFIX: &str = "login:limit:ip:";
const USER_KEY_PREFIX: &str = "login:limit:user:";

const IP_WINDOW: Duration = Duration::from_secs(3600);
const USER_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Which window rejected the attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    Address,
    Identifier,
}

/// Address window state, reported in `X-RateLimit-*` headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressWindow {
    pub limit: u32,
    pub remaining: u32,
    /// Unix seconds when the window resets
    pub reset_at: i64,
}

/// Rejected attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blocked {
    pub scope: LimitScope,
    pub retry_after: Duration,
}

impl Blocked {
    /// Minutes to show the user, rounded up
    pub fn retry_after_minutes(&self) -> u64 {
        self.retry_after.as_secs() / 60 + 1
    }
}

/// Outcome of one limiter check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitDecision {
    /// `None` when the address counter could not be read
    pub address: Option<AddressWindow>,
    pub blocked: Option<Blocked>,
}

impl LimitDecision {
    pub fn is_allowed(&self) -> bool {
        self.blocked.is_none()
    }
}

/// Per-address and per-identifier login limiter
pub struct LoginLimiter<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    ip: RateLimitConfig,
    user: RateLimitConfig,
    timeout: Duration,
}

impl<S> Clone for LoginLimiter<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            ip: self.ip,
            user: self.user,
            timeout: self.timeout,
        }
    }
}

impl<S> LoginLimiter<S>
where
    S: KeyValueStore + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>, config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ip: RateLimitConfig {
                max_requests: config.login_ip_limit,
                window: IP_WINDOW,
            },
            user: RateLimitConfig {
                max_requests: config.login_user_limit,
                window: USER_WINDOW,
            },
            timeout: config.store_timeout,
        }
    }

    /// Count one login attempt from `ip` for `identifier`.
    ///
    /// The address window is checked first; the identifier window only when
    /// an identifier was supplied and the address passed.
    pub async fn check(&self, ip: &str, identifier: Option<&str>) -> LimitDecision {
        let mut decision = LimitDecision::default();

        let ip_key = format!("{IP_KEY_PREFIX}{ip}");
        if let Some(result) = self.count(&ip_key, &self.ip).await {
            decision.address = Some(AddressWindow {
                limit: result.limit,
                remaining: result.remaining,
                reset_at: self.clock.now().timestamp() + result.reset_after.as_secs() as i64,
            });
            if !result.allowed {
                tracing::warn!(
                    ip = %ip,
                    count = result.count,
                    "Login rate limit exceeded for address"
                );
                decision.blocked = Some(Blocked {
                    scope: LimitScope::Address,
                    retry_after: result.reset_after,
                });
                return decision;
            }
        }

        let Some(identifier) = identifier.map(str::trim).filter(|i| !i.is_empty()) else {
            return decision;
        };

        let user_key = format!("{USER_KEY_PREFIX}{identifier}");
        if let Some(result) = self.count(&user_key, &self.user).await {
            if !result.allowed {
                tracing::warn!(count = result.count, "Login rate limit exceeded for identifier");
                decision.blocked = Some(Blocked {
                    scope: LimitScope::Identifier,
                    retry_after: result.reset_after,
                });
            }
        }

        decision
    }

    async fn count(&self, key: &str, config: &RateLimitConfig) -> Option<RateLimitResult> {
        match with_deadline(self.timeout, self.store.check_and_increment(key, config)).await {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::warn!(error = %e, "Login limiter store failed, allowing attempt");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::clock::ManualClock;
    use platform::kv::MemoryStore;

    fn limiter(ip_limit: u32, user_limit: u32) -> (LoginLimiter<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let config = AuthConfig {
            login_ip_limit: ip_limit,
            login_user_limit: user_limit,
            ..AuthConfig::default()
        };
        (LoginLimiter::new(store, &config, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_address_limit_n_then_reject() {
        let (limiter, _clock) = limiter(10, 100);

        for i in 0..10 {
            let decision = limiter.check("1.2.3.4", Some(&format!("user{i}"))).await;
            assert!(decision.is_allowed());
            assert_eq!(decision.address.unwrap().remaining, 9 - i);
        }

        let decision = limiter.check("1.2.3.4", Some("user10")).await;
        let blocked = decision.blocked.unwrap();
        assert_eq!(blocked.scope, LimitScope::Address);
        assert!(blocked.retry_after_minutes() >= 1);
        assert_eq!(decision.address.unwrap().remaining, 0);

        assert!(limiter.check("5.6.7.8", Some("user10")).await.is_allowed());
    }

    #[tokio::test]
    async fn test_identifier_limit_across_addresses() {
        let (limiter, _clock) = limiter(100, 5);

        for i in 0..5 {
            assert!(limiter.check(&format!("10.0.0.{i}"), Some("alice")).await.is_allowed());
        }

        let decision = limiter.check("10.0.0.99", Some("alice")).await;
        assert_eq!(decision.blocked.unwrap().scope, LimitScope::Identifier);
        // 900 s left in the window reads as "16 minutes"
        assert_eq!(decision.blocked.unwrap().retry_after_minutes(), 16);
        assert!(limiter.check("10.0.0.99", Some("bob")).await.is_allowed());
    }

    #[tokio::test]
    async fn test_blank_identifier_skips_user_window() {
        let (limiter, _clock) = limiter(100, 1);
        assert!(limiter.check("1.1.1.1", Some("  ")).await.is_allowed());
        assert!(limiter.check("1.1.1.1", Some("")).await.is_allowed());
        assert!(limiter.check("1.1.1.1", None).await.is_allowed());
    }

    #[tokio::test]
    async fn test_window_reset() {
        let (limiter, clock) = limiter(1, 100);
        assert!(limiter.check("1.1.1.1", None).await.is_allowed());
        assert!(!limiter.check("1.1.1.1", None).await.is_allowed());

        clock.advance(chrono::Duration::hours(1));
        assert!(limiter.check("1.1.1.1", None).await.is_allowed());
    }

    #[tokio::test]
    async fn test_reset_header_value() {
        let (limiter, clock) = limiter(10, 100);
        let decision = limiter.check("1.1.1.1", None).await;
        let window = decision.address.unwrap();
        assert_eq!(window.limit, 10);
        assert_eq!(window.reset_at, clock.now().timestamp() + 3600);
    }
}
