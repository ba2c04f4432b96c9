use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::CacheBackend;
use crate::error::{CacheError, CacheResult};

/// In-process hash table. Volatile across restarts and never expires
/// anything by itself.
#[derive(Debug, Default)]
pub struct LocalBackend {
    entries: DashMap<String, String>,
    used_bytes: AtomicUsize,
    max_bytes: Option<usize>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that refuses writes which would take it past `max_bytes` of
    /// key and value data.
    pub fn with_capacity_limit(max_bytes: usize) -> Self {
        Self {
            max_bytes: Some(max_bytes),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn reserve(&self, key: &str, added: usize, removed: usize) -> CacheResult<()> {
        let max = self.max_bytes;
        self.used_bytes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                let next = used.saturating_sub(removed) + added;
                match max {
                    Some(max) if next > max => None,
                    _ => Some(next),
                }
            })
            .map(|_| ())
            .map_err(|used| {
                CacheError::StoreWriteFailure(format!(
                    "out of memory writing {} ({} of {:?} bytes used)",
                    key, used, max
                ))
            })
    }

    fn store(&self, key: &str, value: String) -> CacheResult<()> {
        let added = key.len() + value.len();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let removed = key.len() + entry.get().len();
                self.reserve(key, added, removed)?;
                entry.insert(value);
            }
            Entry::Vacant(entry) => {
                self.reserve(key, added, 0)?;
                entry.insert(value);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn expires_natively(&self) -> bool {
        false
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    // The ttl is advisory here, readers check the stamped age themselves.
    async fn set(&self, key: &str, value: String, _ttl: Option<Duration>) -> CacheResult<()> {
        self.store(key, value)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.entries.contains_key(key))
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        if let Some((k, v)) = self.entries.remove(key) {
            let freed = k.len() + v.len();
            let _ = self
                .used_bytes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                    Some(used.saturating_sub(freed))
                });
        }
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.entries.clear();
        self.used_bytes.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn memory_usage(&self) -> CacheResult<u64> {
        Ok(self.used_bytes.load(Ordering::SeqCst) as u64)
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }

    // Same as `set`, the ttl is only a hint here.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: String,
        _ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let added = key.len() + value.len();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if expected != Some(entry.get().as_str()) {
                    return Ok(false);
                }
                let removed = key.len() + entry.get().len();
                self.reserve(key, added, removed)?;
                entry.insert(value);
            }
            Entry::Vacant(entry) => {
                if expected.is_some() {
                    return Ok(false);
                }
                self.reserve(key, added, 0)?;
                entry.insert(value);
            }
        }
        Ok(true)
    }
}
