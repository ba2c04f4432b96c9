use std::time::Duration;

use crate::cache::backend::CacheBackend;
use crate::cache::models::{StaticResponse, StaticResponseEntry};
use crate::clock::Clock;
use crate::error::{CacheError, CacheResult};

/// 静态响应缓存操作
pub struct StaticResponseCacheOperations;

impl StaticResponseCacheOperations {
    /// 缓存响应
    ///
    /// Stamps the capture time. Stores that expire natively get `ttl` as
    /// their expiry, the local store keeps the entry until a reader finds it
    /// too old.
    pub async fn write(
        backend: &dyn CacheBackend,
        clock: &dyn Clock,
        key: &str,
        response: StaticResponse,
        ttl: Duration,
    ) -> CacheResult<StaticResponseEntry> {
        if ttl.is_zero() {
            return Err(CacheError::invalid("static response ttl must be positive"));
        }
        let entry = StaticResponseEntry::capture(response, clock.now_ms());
        let json = serde_json::to_string(&entry)?;
        backend.set(key, json, Some(ttl)).await?;
        Ok(entry)
    }

    /// 获取缓存响应
    ///
    /// An entry whose age has reached `max_age` is deleted and reported
    /// absent when the store does not police expiry itself, the same instant
    /// a millisecond TTL would have dropped it.
    pub async fn read(
        backend: &dyn CacheBackend,
        clock: &dyn Clock,
        key: &str,
        max_age: Duration,
    ) -> CacheResult<Option<StaticResponseEntry>> {
        if max_age.is_zero() {
            return Err(CacheError::invalid("no max age provided"));
        }

        let Some(json) = backend.get(key).await? else {
            return Ok(None);
        };
        let entry: StaticResponseEntry = serde_json::from_str(&json)?;

        if !backend.expires_natively() && entry.age_ms(clock.now_ms()) >= max_age.as_millis() as i64 {
            tracing::debug!("Static response {} expired, evicting", key);
            backend.delete(key).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }
}
