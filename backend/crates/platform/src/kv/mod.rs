//! Key-Value Store
//!
//! Minimal key-value contract used for token revocation entries and
//! rate-limit counters. All mutating operations are atomic at the store
//! level; callers never do read-modify-write on the client side.
//!
//! Backends:
//! - [`RedisStore`] - shared store for multi-instance deployments
//! - [`MemoryStore`] - single-process store (development and tests)

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use std::time::Duration;

use thiserror::Error;

/// Key-value store errors
#[derive(Debug, Error)]
pub enum KvError {
    /// The backing store returned an error or is unreachable
    #[error("key-value backend error: {0}")]
    Backend(String),

    /// The operation did not finish within its deadline
    #[error("key-value operation timed out after {0:?}")]
    Timeout(Duration),

    /// The store returned a value of an unexpected shape
    #[error("unexpected key-value response: {0}")]
    Protocol(String),
}

pub type KvResult<T> = Result<T, KvError>;

/// Key-value store contract
#[trait_variant::make(KeyValueStore: Send)]
pub trait LocalKeyValueStore {
    /// Read a string value
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Set a value with a time-to-live, overwriting any previous value
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()>;

    /// Set a value with a time-to-live only if the key is absent.
    ///
    /// Returns `true` when this call created the key.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool>;

    /// Atomically increment an integer counter.
    ///
    /// When the key carries no expiry yet (first increment of a window) the
    /// given `ttl` is attached. Returns the counter value after the increment.
    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> KvResult<i64>;

    /// Remaining time-to-live, `None` if the key is missing or never expires
    async fn ttl(&self, key: &str) -> KvResult<Option<Duration>>;

    /// Check whether a key exists
    async fn exists(&self, key: &str) -> KvResult<bool>;
}

/// Run a store operation under a deadline.
///
/// Elapsed deadlines surface as [`KvError::Timeout`]; callers decide whether
/// that fails open or closed.
pub async fn with_deadline<T, F>(deadline: Duration, op: F) -> KvResult<T>
where
    F: std::future::Future<Output = KvResult<T>>,
{
    match tokio::time::timeout(deadline, op).await {
        Ok(result) => result,
        Err(_) => Err(KvError::Timeout(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_deadline_passes_result_through() {
        let value = with_deadline(Duration::from_millis(50), async { Ok::<_, KvError>(3) })
            .await
            .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_with_deadline_times_out() {
        let result = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, KvError>(())
        })
        .await;
        assert!(matches!(result, Err(KvError::Timeout(_))));
    }
}
