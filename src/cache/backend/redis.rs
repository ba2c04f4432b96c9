use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Script, aio::MultiplexedConnection};

use super::CacheBackend;
use crate::error::CacheResult;

const SCAN_BATCH: usize = 500;

// ARGV[1] is "1" when a current value is expected, ARGV[2] that value,
// ARGV[3] the replacement, ARGV[4] its expiry in ms or "" for none.
const COMPARE_AND_SET: &str = r#"
local current = redis.call('GET', KEYS[1])
if ARGV[1] == '1' then
    if current ~= ARGV[2] then
        return 0
    end
elseif current then
    return 0
end
if ARGV[4] == '' then
    redis.call('SET', KEYS[1], ARGV[3])
else
    redis.call('SET', KEYS[1], ARGV[3], 'PX', ARGV[4])
end
return 1
"#;

/// Redis backed store. Expiry is enforced by Redis itself with millisecond
/// precision.
#[derive(Clone)]
pub struct RedisBackend {
    conn: MultiplexedConnection,
    cas_script: Script,
}

impl RedisBackend {
    /// Opens the one shared multiplexed connection used for every call.
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            cas_script: Script::new(COMPARE_AND_SET),
        }
    }

    async fn scan_batch(&self, cursor: u64) -> CacheResult<(u64, Vec<String>)> {
        let mut conn = self.conn.clone();
        let batch: (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg("*")
            .arg("COUNT")
            .arg(SCAN_BATCH)
            .query_async(&mut conn)
            .await?;
        Ok(batch)
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn expires_natively(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let millis = ttl.as_millis().max(1) as u64;
                let _: () = conn.pset_ex(key, value, millis).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut cursor = 0;
        let mut removed = 0usize;
        loop {
            let (next, keys) = self.scan_batch(cursor).await?;
            if !keys.is_empty() {
                removed += keys.len();
                let mut conn = self.conn.clone();
                let _: () = conn.del(keys).await?;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        tracing::debug!("Wiped {} keys from redis", removed);
        Ok(())
    }

    async fn memory_usage(&self) -> CacheResult<u64> {
        let mut conn = self.conn.clone();
        let info: redis::InfoDict = redis::cmd("INFO")
            .arg("memory")
            .query_async(&mut conn)
            .await?;
        Ok(info.get::<u64>("used_memory").unwrap_or(0))
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        let mut cursor = 0;
        let mut all = Vec::new();
        loop {
            let (next, keys) = self.scan_batch(cursor).await?;
            all.extend(keys);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may report a key more than once
        all.sort_unstable();
        all.dedup();
        Ok(all)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: String,
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let expiry = ttl
            .map(|ttl| ttl.as_millis().max(1).to_string())
            .unwrap_or_default();
        let mut invocation = self.cas_script.key(key);
        invocation
            .arg(if expected.is_some() { "1" } else { "0" })
            .arg(expected.unwrap_or_default())
            .arg(value)
            .arg(expiry);
        let stored: i32 = invocation.invoke_async(&mut conn).await?;
        Ok(stored == 1)
    }
}
