#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use gatecache::{
    AppState,
    cache::{Cache, CacheBackend, CacheSettings, LocalBackend},
    clock::{Clock, ManualClock},
    config::Config,
    database::{SessionStore, UserPermissionEntity, WebtokenEntity},
    error::CacheResult,
};

pub const START_MS: i64 = 1_700_000_000_000;
pub const CLIENT_IP: &str = "10.0.0.1";
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
pub const BROWSER: &str = "Chrome";

pub fn test_config(pairs: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    vars.entry("DATABASE_URL".into())
        .or_insert_with(|| "postgres://localhost/unused".into());
    Config::from_lookup(|name| vars.get(name).cloned()).unwrap()
}

pub fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

/// Session store kept in memory, counting how often it is consulted.
#[derive(Default)]
pub struct MemorySessionStore {
    rows: Mutex<Vec<WebtokenEntity>>,
    grants: Mutex<HashMap<String, Vec<UserPermissionEntity>>>,
    lookups: AtomicUsize,
}

impl MemorySessionStore {
    pub fn insert_session(&self, token: &str, username: &str, ip: &str, time_ms: i64) {
        self.rows.lock().unwrap().push(WebtokenEntity {
            username: username.into(),
            token: token.into(),
            ip: Some(ip.into()),
            browser: Some(BROWSER.into()),
            language: Some("en".into()),
            time: at(time_ms),
        });
    }

    pub fn grant(&self, username: &str, permission: &str, read: bool, write: bool) {
        self.grants
            .lock()
            .unwrap()
            .entry(username.into())
            .or_default()
            .push(UserPermissionEntity {
                permission: permission.into(),
                read,
                write,
            });
    }

    pub fn has_session(&self, token: &str) -> bool {
        self.rows.lock().unwrap().iter().any(|row| row.token == token)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_session_by_token(&self, token: &str) -> Result<Vec<WebtokenEntity>, sqlx::Error> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.token == token)
            .cloned()
            .collect())
    }

    async fn get_user_permissions(&self, username: &str) -> Result<Vec<UserPermissionEntity>, sqlx::Error> {
        Ok(self
            .grants
            .lock()
            .unwrap()
            .get(username)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_session(&self, token: &str) -> Result<(), sqlx::Error> {
        self.rows.lock().unwrap().retain(|row| row.token != token);
        Ok(())
    }
}

/// Store that enforces TTLs on its own, against a manual clock.
pub struct ExpiringBackend {
    clock: ManualClock,
    entries: Mutex<HashMap<String, (String, Option<i64>)>>,
}

impl ExpiringBackend {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn live(&self, key: &str) -> Option<String> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock().unwrap();
        let expired = matches!(entries.get(key), Some((_, Some(expires_at))) if *expires_at <= now);
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|(value, _)| value.clone())
    }
}

#[async_trait]
impl CacheBackend for ExpiringBackend {
    fn name(&self) -> &'static str {
        "expiring"
    }

    fn expires_natively(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.live(key))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        let expires_at = ttl.map(|ttl| self.clock.now_ms() + ttl.as_millis() as i64);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.live(key).is_some())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }

    async fn memory_usage(&self) -> CacheResult<u64> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(k, (v, _))| (k.len() + v.len()) as u64)
            .sum())
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        let keys: Vec<String> = self.entries.lock().unwrap().keys().cloned().collect();
        Ok(keys.into_iter().filter(|k| self.live(k).is_some()).collect())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: String,
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        if self.live(key).as_deref() != expected {
            return Ok(false);
        }
        let expires_at = ttl.map(|ttl| self.clock.now_ms() + ttl.as_millis() as i64);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, expires_at));
        Ok(true)
    }
}

pub struct Harness {
    pub state: AppState,
    pub clock: ManualClock,
    pub store: Arc<MemorySessionStore>,
    pub backend: Arc<dyn CacheBackend>,
}

impl Harness {
    pub fn cache(&self) -> &Cache {
        &self.state.cache
    }
}

/// Local backend, manual clock and in-memory sessions.
pub fn harness(pairs: &[(&str, &str)]) -> Harness {
    harness_on(pairs, |_| Arc::new(LocalBackend::new()))
}

pub fn harness_on<F>(pairs: &[(&str, &str)], backend: F) -> Harness
where
    F: FnOnce(&ManualClock) -> Arc<dyn CacheBackend>,
{
    let config = test_config(pairs);
    let clock = ManualClock::new(START_MS);
    let backend = backend(&clock);
    let store = Arc::new(MemorySessionStore::default());
    let cache = Cache::new(
        backend.clone(),
        store.clone(),
        Arc::new(clock.clone()),
        CacheSettings::from(&config),
    );
    Harness {
        state: AppState::new(cache, config),
        clock,
        store,
        backend,
    }
}
