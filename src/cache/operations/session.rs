use std::time::Duration;

use crate::cache::backend::CacheBackend;
use crate::cache::keys;
use crate::cache::models::SessionRecord;
use crate::database::SessionStore;
use crate::error::{CacheError, CacheResult};
use crate::utils::format_permissions;

/// 会话缓存操作
pub struct SessionCacheOperations;

impl SessionCacheOperations {
    /// 缓存会话
    pub async fn cache_session(
        backend: &dyn CacheBackend,
        token: &str,
        record: &SessionRecord,
        ttl: Duration,
    ) -> CacheResult<()> {
        if token.is_empty() {
            return Err(CacheError::invalid("No token provided"));
        }
        let json = serde_json::to_string(record)?;
        backend.set(&keys::webtoken_key(token), json, Some(ttl)).await
    }

    /// 获取缓存中的会话，不访问数据库
    pub async fn get_session(backend: &dyn CacheBackend, token: &str) -> CacheResult<Option<SessionRecord>> {
        match backend.get(&keys::webtoken_key(token)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// 解析会话
    ///
    /// Cache first. On a miss the persisted webtoken is loaded together with
    /// the user's permissions and written back to the cache. Concurrent
    /// misses for one token may both hit the database, the last cache write
    /// wins.
    pub async fn resolve(
        backend: &dyn CacheBackend,
        store: &dyn SessionStore,
        token: &str,
        ttl: Duration,
    ) -> CacheResult<Option<SessionRecord>> {
        if token.is_empty() {
            return Err(CacheError::invalid("No token provided"));
        }

        if let Some(record) = Self::get_session(backend, token).await? {
            tracing::debug!("Webtoken cache hit on {}", token);
            return Ok(Some(record));
        }
        tracing::debug!("Webtoken cache miss on {}", token);

        let mut rows = store.get_session_by_token(token).await?;
        if rows.len() != 1 {
            if rows.len() > 1 {
                tracing::warn!("{} persisted sessions share one token, ignoring them", rows.len());
            }
            return Ok(None);
        }
        let row = rows.remove(0);

        let grants = store.get_user_permissions(&row.username).await?;
        let record = SessionRecord {
            permissions: format_permissions(&grants),
            username: row.username,
            language: row.language.unwrap_or_default(),
            ip: row.ip.unwrap_or_default(),
            browser: row.browser.unwrap_or_default(),
            time: row.time,
        };

        match Self::cache_session(backend, token, &record, ttl).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            // the record is still valid, only the accelerator missed out
            Err(e) => tracing::warn!("Failed to cache webtoken {}: {}", token, e),
        }

        Ok(Some(record))
    }

    /// 删除会话缓存，数据库中的记录保持不变
    pub async fn remove_session(backend: &dyn CacheBackend, token: &str) -> CacheResult<()> {
        if token.is_empty() {
            return Err(CacheError::invalid("No token provided"));
        }
        backend.delete(&keys::webtoken_key(token)).await
    }
}
