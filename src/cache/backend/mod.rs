//! Key/value substrate underneath the cache.
//!
//! Values are opaque strings (JSON written by the operations layer). The two
//! implementations differ in one important way: [`RedisBackend`] enforces the
//! TTL passed to [`CacheBackend::set`], [`LocalBackend`] ignores it and relies
//! on readers checking the age stamped into the value.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheResult;

mod local;
mod redis;

pub use local::LocalBackend;
pub use self::redis::RedisBackend;

#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether TTL hints given to `set` are enforced by the store itself.
    fn expires_natively(&self) -> bool;

    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Removes every key, whatever its kind.
    async fn clear(&self) -> CacheResult<()>;

    async fn memory_usage(&self) -> CacheResult<u64>;

    async fn keys(&self) -> CacheResult<Vec<String>>;

    /// Stores `value` only if the current value equals `expected`
    /// (`None` meaning the key must be absent). Returns whether it was stored.
    /// `ttl` is a hint with the same meaning as for `set`.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: String,
        ttl: Option<Duration>,
    ) -> CacheResult<bool>;
}
