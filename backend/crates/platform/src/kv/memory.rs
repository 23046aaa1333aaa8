//! In-process key-value store
//!
//! Expiry is evaluated lazily against the injected [`Clock`], so a
//! `ManualClock` can expire counters and revocation entries in tests.
//! Writes also sweep every expired entry at most once per
//! [`SWEEP_INTERVAL`], so keys that are never touched again do not pile up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{KeyValueStore, KvError, KvResult};
use crate::clock::{Clock, SystemClock};

/// Minimum time between full sweeps of expired entries
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, Entry>,
    last_sweep: Option<DateTime<Utc>>,
}

impl Entries {
    fn sweep_if_due(&mut self, now: DateTime<Utc>) {
        let due = self.last_sweep.is_none_or(|at| {
            (now - at).to_std().is_ok_and(|elapsed| elapsed >= SWEEP_INTERVAL)
        });
        if due {
            self.map.retain(|_, e| e.is_live(now));
            self.last_sweep = Some(now);
        }
    }
}

/// Mutex-guarded map with per-key expiry
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<Entries>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries::default())),
            clock,
        }
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock().map.values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock for a write, sweeping expired entries first when a sweep is due
    fn lock_for_write(&self, now: DateTime<Utc>) -> MutexGuard<'_, Entries> {
        let mut entries = self.lock();
        entries.sweep_if_due(now);
        entries
    }

    fn expiry(&self, now: DateTime<Utc>, ttl: Duration) -> KvResult<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| KvError::Protocol(format!("ttl out of range: {e}")))?;
        Ok(now + ttl)
    }

    /// Drop the entry under `key` if it has expired, returning the live one.
    fn live<'a>(
        map: &'a mut HashMap<String, Entry>,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<&'a mut Entry> {
        if map.get(key).is_some_and(|e| !e.is_live(now)) {
            map.remove(key);
        }
        map.get_mut(key)
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let now = self.clock.now();
        let mut entries = self.lock();
        Ok(Self::live(&mut entries.map, key, now).map(|e| e.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        let now = self.clock.now();
        let expires_at = self.expiry(now, ttl)?;
        self.lock_for_write(now).map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool> {
        let now = self.clock.now();
        let expires_at = self.expiry(now, ttl)?;
        let mut entries = self.lock_for_write(now);
        if Self::live(&mut entries.map, key, now).is_some() {
            return Ok(false);
        }
        entries.map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(expires_at),
            },
        );
        Ok(true)
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> KvResult<i64> {
        let now = self.clock.now();
        let expires_at = self.expiry(now, ttl)?;
        let mut entries = self.lock_for_write(now);
        let map = &mut entries.map;

        match Self::live(map, key, now) {
            Some(entry) => {
                let current: i64 = entry
                    .value
                    .parse()
                    .map_err(|_| KvError::Protocol(format!("value at {key} is not an integer")))?;
                let next = current + 1;
                entry.value = next.to_string();
                if entry.expires_at.is_none() {
                    entry.expires_at = Some(expires_at);
                }
                Ok(next)
            }
            None => {
                map.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: Some(expires_at),
                    },
                );
                Ok(1)
            }
        }
    }

    async fn ttl(&self, key: &str) -> KvResult<Option<Duration>> {
        let now = self.clock.now();
        let mut entries = self.lock();
        Ok(Self::live(&mut entries.map, key, now)
            .and_then(|e| e.expires_at)
            .and_then(|at| (at - now).to_std().ok()))
    }

    async fn exists(&self, key: &str) -> KvResult<bool> {
        let now = self.clock.now();
        let mut entries = self.lock();
        Ok(Self::live(&mut entries.map, key, now).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        (MemoryStore::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_set_ex_expires() {
        let (store, clock) = store();
        store.set_ex("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        clock.advance(chrono::Duration::seconds(10));
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_nx_only_once() {
        let (store, _clock) = store();
        assert!(store.set_nx_ex("k", "1", Duration::from_secs(5)).await.unwrap());
        assert!(!store.set_nx_ex("k", "2", Duration::from_secs(5)).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_incr_seeds_ttl_on_first_increment_only() {
        let (store, clock) = store();
        let window = Duration::from_secs(60);

        assert_eq!(store.incr_with_ttl("c", window).await.unwrap(), 1);
        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(store.incr_with_ttl("c", window).await.unwrap(), 2);

        // Window is anchored at the first increment, not extended by the second.
        let ttl = store.ttl("c").await.unwrap().unwrap();
        assert_eq!(ttl, Duration::from_secs(30));

        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(store.incr_with_ttl("c", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let (store, _clock) = store();
        store.set_ex("c", "abc", Duration::from_secs(5)).await.unwrap();
        let result = store.incr_with_ttl("c", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(KvError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_write_sweeps_untouched_expired_keys() {
        let (store, clock) = store();
        for i in 0..10_000 {
            store
                .incr_with_ttl(&format!("login:limit:ip:{i}"), Duration::from_secs(60))
                .await
                .unwrap();
        }
        assert_eq!(store.lock().map.len(), 10_000);

        clock.advance(chrono::Duration::hours(2));
        store
            .incr_with_ttl("login:limit:ip:fresh", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.lock().map.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_keeps_live_entries() {
        let (store, clock) = store();
        store.set_ex("short", "v", Duration::from_secs(30)).await.unwrap();
        store.set_ex("long", "v", Duration::from_secs(600)).await.unwrap();

        clock.advance(chrono::Duration::seconds(120));
        store.set_ex("new", "v", Duration::from_secs(30)).await.unwrap();

        assert_eq!(store.lock().map.len(), 2);
        assert_eq!(store.get("long").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.get("short").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_missing_key() {
        let (store, _clock) = store();
        assert_eq!(store.ttl("nope").await.unwrap(), None);
        assert!(store.is_empty());
    }
}
