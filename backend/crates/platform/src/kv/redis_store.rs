//! Redis-backed key-value store

use std::time::Duration;

use redis::aio::ConnectionManager;

use super::{KeyValueStore, KvError, KvResult};

/// INCR and seed the window TTL in one server-side step. A key left without
/// expiry (for example after a partial write) gets one on the next hit.
const INCR_WITH_TTL_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if redis.call('PTTL', KEYS[1]) < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Redis store over a multiplexed, auto-reconnecting connection
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    incr_script: redis::Script,
}

impl RedisStore {
    /// Connect to the given `redis://` URL
    pub async fn connect(url: &str) -> KvResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            incr_script: redis::Script::new(INCR_WITH_TTL_SCRIPT),
        }
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    // PX 0 is rejected by Redis
    (ttl.as_millis() as u64).max(1)
}

impl From<redis::RedisError> for KvError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            KvError::Timeout(Duration::ZERO)
        } else {
            KvError::Backend(err.to_string())
        }
    }
}

impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool> {
        let mut conn = self.conn.clone();
        // SET ... NX replies OK when written and nil when the key existed
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> KvResult<i64> {
        let mut conn = self.conn.clone();
        let count: i64 = self
            .incr_script
            .key(key)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn ttl(&self, key: &str) -> KvResult<Option<Duration>> {
        let mut conn = self.conn.clone();
        let millis: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
        // -2: missing, -1: no expiry
        Ok((millis >= 0).then(|| Duration::from_millis(millis as u64)))
    }

    async fn exists(&self, key: &str) -> KvResult<bool> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_never_zero() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2000);
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let result = RedisStore::connect("not-a-redis-url").await;
        assert!(matches!(result, Err(KvError::Backend(_))));
    }
}
