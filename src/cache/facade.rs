use std::sync::Arc;
use std::time::Duration;

use crate::cache::backend::{CacheBackend, LocalBackend, RedisBackend};
use crate::cache::keys::{self, KeyKind};
use crate::cache::models::{LimitVerdict, RateCounter, SessionRecord, StaticResponse, StaticResponseEntry};
use crate::cache::operations::{
    RateLimitCacheOperations, SessionCacheOperations, StaticResponseCacheOperations,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{CacheDriver, Config};
use crate::database::SessionStore;
use crate::error::{CacheError, CacheResult};

#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    /// Limiter threshold, also the decay rate per minute.
    pub decrease_per_min: f64,
    pub session_ttl: Duration,
}

impl From<&Config> for CacheSettings {
    fn from(config: &Config) -> Self {
        Self {
            decrease_per_min: config.decrease_per_min,
            session_ttl: config.webtoken_duration(),
        }
    }
}

/// Entry point for middleware: limiter, static responses and sessions on
/// top of whichever backend was chosen at startup.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
}

impl Cache {
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            backend,
            sessions,
            clock,
            settings,
        }
    }

    /// Builds the backend named by `CacheDriver` on the system clock.
    pub async fn connect(config: &Config, sessions: Arc<dyn SessionStore>) -> CacheResult<Self> {
        let backend: Arc<dyn CacheBackend> = match config.cache_driver {
            CacheDriver::Local => match config.local_cache_max_bytes {
                Some(max) => Arc::new(LocalBackend::with_capacity_limit(max)),
                None => Arc::new(LocalBackend::new()),
            },
            CacheDriver::Redis => Arc::new(RedisBackend::connect(&config.redis_url).await?),
        };
        tracing::info!("Cache driver: {}", backend.name());

        Ok(Self::new(
            backend,
            sessions,
            Arc::new(SystemClock),
            CacheSettings::from(config),
        ))
    }

    pub fn backend(&self) -> &dyn CacheBackend {
        self.backend.as_ref()
    }

    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn settings(&self) -> CacheSettings {
        self.settings
    }

    // ---- limiter ----

    /// Decays the IP counter without charging it.
    pub async fn ip_check(&self, ip: &str) -> CacheResult<LimitVerdict> {
        RateLimitCacheOperations::peek(
            self.backend(),
            self.clock(),
            &keys::ip_limit_key(non_empty(ip, "ip")?),
            self.settings.decrease_per_min,
        )
        .await
    }

    pub async fn ip_limit(&self, ip: &str, cost: f64) -> CacheResult<LimitVerdict> {
        RateLimitCacheOperations::charge(
            self.backend(),
            self.clock(),
            &keys::ip_limit_key(non_empty(ip, "ip")?),
            cost,
            self.settings.decrease_per_min,
        )
        .await
    }

    /// Generic limiter keyed by a route, action or token.
    pub async fn limit(&self, key: &str, cost: f64) -> CacheResult<LimitVerdict> {
        RateLimitCacheOperations::charge(
            self.backend(),
            self.clock(),
            &keys::key_limit_key(non_empty(key, "key")?),
            cost,
            self.settings.decrease_per_min,
        )
        .await
    }

    pub async fn ip_counter(&self, ip: &str) -> CacheResult<Option<RateCounter>> {
        RateLimitCacheOperations::get_counter(self.backend(), &keys::ip_limit_key(ip)).await
    }

    pub async fn limit_counter(&self, key: &str) -> CacheResult<Option<RateCounter>> {
        RateLimitCacheOperations::get_counter(self.backend(), &keys::key_limit_key(key)).await
    }

    // ---- static responses ----

    pub async fn get_public_response(
        &self,
        route: &str,
        max_age: Duration,
    ) -> CacheResult<Option<StaticResponseEntry>> {
        let key = keys::public_response_key(non_empty(route, "route")?);
        StaticResponseCacheOperations::read(self.backend(), self.clock(), &key, max_age).await
    }

    pub async fn put_public_response(
        &self,
        route: &str,
        response: StaticResponse,
        ttl: Duration,
    ) -> CacheResult<StaticResponseEntry> {
        let key = keys::public_response_key(non_empty(route, "route")?);
        StaticResponseCacheOperations::write(self.backend(), self.clock(), &key, response, ttl).await
    }

    pub async fn get_private_response(
        &self,
        route: &str,
        token: &str,
        max_age: Duration,
    ) -> CacheResult<Option<StaticResponseEntry>> {
        let key = keys::private_response_key(non_empty(route, "route")?, non_empty(token, "token")?);
        StaticResponseCacheOperations::read(self.backend(), self.clock(), &key, max_age).await
    }

    pub async fn put_private_response(
        &self,
        route: &str,
        token: &str,
        response: StaticResponse,
        ttl: Duration,
    ) -> CacheResult<StaticResponseEntry> {
        let key = keys::private_response_key(non_empty(route, "route")?, non_empty(token, "token")?);
        StaticResponseCacheOperations::write(self.backend(), self.clock(), &key, response, ttl).await
    }

    // ---- sessions ----

    pub async fn resolve_session(&self, token: &str) -> CacheResult<Option<SessionRecord>> {
        SessionCacheOperations::resolve(
            self.backend(),
            self.sessions(),
            token,
            self.settings.session_ttl,
        )
        .await
    }

    /// Puts a freshly created session straight into the cache.
    pub async fn add_session(&self, token: &str, record: &SessionRecord) -> CacheResult<()> {
        SessionCacheOperations::cache_session(self.backend(), token, record, self.settings.session_ttl).await
    }

    /// Drops the cached session only; the persisted row is left alone.
    pub async fn invalidate_session(&self, token: &str) -> CacheResult<()> {
        SessionCacheOperations::remove_session(self.backend(), token).await
    }

    // ---- maintenance ----

    pub async fn memory_usage(&self) -> CacheResult<u64> {
        self.backend.memory_usage().await
    }

    pub async fn wipe(&self) -> CacheResult<()> {
        tracing::info!("Wiping {} cache", self.backend.name());
        self.backend.clear().await
    }

    /// Deletes every record stamped before `cutoff_ms`, on either backend.
    /// Sessions are aged by their persisted creation time. Returns how many
    /// keys were removed.
    pub async fn purge_older_than(&self, cutoff_ms: i64) -> CacheResult<usize> {
        let mut removed = 0;
        for key in self.backend.keys().await? {
            let Some(kind) = keys::kind_of(&key) else {
                continue;
            };
            // gone between listing and reading
            let Some(json) = self.backend.get(&key).await? else {
                continue;
            };
            let stamp = match stamp_of(kind, &json) {
                Ok(stamp) => stamp,
                Err(e) => {
                    tracing::warn!("Skipping unreadable cache entry {}: {}", key, e);
                    continue;
                }
            };
            if stamp < cutoff_ms {
                self.backend.delete(&key).await?;
                removed += 1;
            }
        }
        tracing::info!("Purged {} cache entries older than {}", removed, cutoff_ms);
        Ok(removed)
    }
}

fn stamp_of(kind: KeyKind, json: &str) -> Result<i64, serde_json::Error> {
    Ok(match kind {
        KeyKind::RateCounter => serde_json::from_str::<RateCounter>(json)?.updated_at,
        KeyKind::Webtoken => serde_json::from_str::<SessionRecord>(json)?.time.timestamp_millis(),
        KeyKind::StaticResponse => serde_json::from_str::<StaticResponseEntry>(json)?.captured_at,
    })
}

fn non_empty<'a>(value: &'a str, what: &str) -> CacheResult<&'a str> {
    if value.is_empty() {
        Err(CacheError::invalid(format!("No {} provided", what)))
    } else {
        Ok(value)
    }
}
