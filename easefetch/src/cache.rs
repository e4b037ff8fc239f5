use crate::{CacheConfig, StorageBackend, StorageError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A source of wall-clock milliseconds.
pub trait Clock: Send + Sync + Debug {
    fn now_millis(&self) -> i64;
}

/// The real clock, in UTC milliseconds since the epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now)),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A cached value and the time it was written, as stored in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: i64,
}

/// An entry is fresh while it is strictly younger than `expires_ms`.
///
/// An age equal to the expiry is stale, and so is every entry when
/// `expires_ms` is zero or negative.
pub fn is_fresh<T>(entry: &CacheEntry<T>, expires_ms: i64, now: i64) -> bool {
    now.saturating_sub(entry.stored_at) < expires_ms
}

/// Read-through / write-through access to one storage backend.
#[derive(Debug, Clone)]
pub struct ResultCache {
    backend: Arc<dyn StorageBackend>,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Looks up `key`. A missing key, an unreadable backend and a payload that
    /// does not parse as an entry are all misses.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let raw = match self.backend.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                trace!(key, "cache miss");
                return None;
            }
            Err(e) => {
                debug!(key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(key, error = %e, "cache entry does not parse, treating as miss");
                None
            }
        }
    }

    /// Reads `key` and keeps the entry only if it is fresh at `now`.
    pub fn read_fresh<T: DeserializeOwned>(
        &self,
        key: &str,
        expires_ms: i64,
        now: i64,
    ) -> Option<CacheEntry<T>> {
        let entry = self.read(key)?;
        if is_fresh(&entry, expires_ms, now) {
            Some(entry)
        } else {
            debug!(key, stored_at = entry.stored_at, now, "cache entry is stale");
            None
        }
    }

    /// Stores `{ value, storedAt: now }` under `key`, replacing any prior entry.
    pub fn write<T: Serialize>(&self, key: &str, value: &T, now: i64) -> Result<(), StorageError> {
        let entry = CacheEntry {
            value,
            stored_at: now,
        };
        let raw = serde_json::to_string(&entry)?;
        self.backend.set_item(key, &raw)
    }
}

/// The cache as seen by a tracker: already bound to a key, an expiry and a
/// value type, so the tracker itself needs no serde bounds.
pub(crate) trait ResultCacheLayer<T>: Send + Sync {
    fn lookup(&self, now: i64) -> Option<T>;

    fn store(&self, value: &T, now: i64);

    fn writes_results(&self) -> bool;
}

pub(crate) struct BoundCache<T> {
    cache: ResultCache,
    config: CacheConfig,
    _value: PhantomData<fn() -> T>,
}

impl<T> BoundCache<T> {
    pub(crate) fn new(cache: ResultCache, config: CacheConfig) -> Self {
        Self {
            cache,
            config,
            _value: PhantomData,
        }
    }
}

impl<T> ResultCacheLayer<T> for BoundCache<T>
where
    T: Serialize + DeserializeOwned,
{
    fn lookup(&self, now: i64) -> Option<T> {
        self.cache
            .read_fresh(&self.config.cache_key, self.config.cache_expires, now)
            .map(|entry| entry.value)
    }

    fn store(&self, value: &T, now: i64) {
        if let Err(e) = self.cache.write(&self.config.cache_key, value, now) {
            warn!(key = %self.config.cache_key, error = %e, "cache write failed");
        }
    }

    fn writes_results(&self) -> bool {
        self.config.cache_result
    }
}
