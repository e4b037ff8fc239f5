use crate::cache::{BoundCache, ResultCacheLayer};
use crate::{AsyncError, Clock, ConfigError, ResultCache, Storages, SystemClock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// How a tracker caches its results.
///
/// Deserialises from the same camelCase shape the options take in a JSON
/// configuration file:
///
/// ```
/// use easefetch::CacheConfig;
///
/// let config = CacheConfig::from_json(
///     r#"{ "cacheResult": true, "cacheKey": "todos", "cacheExpires": 20000, "useLocalStorage": false }"#,
/// ).unwrap();
/// assert_eq!(config.cache_key, "todos");
/// ```
///
/// Only `cacheKey` is required. `cacheResult` defaults to true both here and
/// in [`CacheConfig::new`]; `cacheExpires` defaults to 0, which disables reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Write resolved values through to the backend.
    #[serde(default = "default_cache_result")]
    pub cache_result: bool,
    pub cache_key: String,
    /// Age in milliseconds after which an entry is stale. Zero or negative
    /// means entries are never reused.
    #[serde(default)]
    pub cache_expires: i64,
    /// Persistent backend when true, session backend otherwise.
    #[serde(default)]
    pub use_local_storage: bool,
}

fn default_cache_result() -> bool {
    true
}

impl CacheConfig {
    /// A configuration that writes results under `cache_key` in the session
    /// backend.
    ///
    /// The expiry starts at 0, so entries are written but never served back
    /// until [`CacheConfig::expires_ms`] or [`CacheConfig::expires_after`]
    /// sets a positive age.
    ///
    /// ## Examples
    ///
    /// ```
    /// use easefetch::CacheConfig;
    /// use std::time::Duration;
    ///
    /// let config = CacheConfig::new("todos");
    /// assert!(config.cache_result);
    /// assert_eq!(config.cache_expires, 0);
    ///
    /// let config = config.expires_after(Duration::from_secs(20));
    /// assert_eq!(config.cache_expires, 20000);
    /// ```
    pub fn new(cache_key: impl Into<String>) -> Self {
        Self {
            cache_result: true,
            cache_key: cache_key.into(),
            cache_expires: 0,
            use_local_storage: false,
        }
    }

    /// Parses and validates a camelCase JSON object.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: CacheConfig =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// With `false`, the cache is only read. Useful when another tracker
    /// owns the entry.
    pub fn cache_result(mut self, cache_result: bool) -> Self {
        self.cache_result = cache_result;
        self
    }

    pub fn expires_ms(mut self, cache_expires: i64) -> Self {
        self.cache_expires = cache_expires;
        self
    }

    pub fn expires_after(self, expires: Duration) -> Self {
        self.expires_ms(i64::try_from(expires.as_millis()).unwrap_or(i64::MAX))
    }

    /// Selects [`crate::Storages::local`] instead of the session backend.
    pub fn use_local_storage(mut self, use_local_storage: bool) -> Self {
        self.use_local_storage = use_local_storage;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_key.is_empty() {
            return Err(ConfigError::EmptyCacheKey);
        }
        Ok(())
    }
}

fn bind_cache<T>(cache: ResultCache, config: CacheConfig) -> Arc<dyn ResultCacheLayer<T>>
where
    T: Serialize + DeserializeOwned + 'static,
{
    Arc::new(BoundCache::new(cache, config))
}

pub(crate) type TypeCheck<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
pub(crate) type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
pub(crate) type ErrorCallback<E> = Arc<dyn Fn(&AsyncError<E>) + Send + Sync>;

/// Options for one tracked producer. Everything is optional; without a cache
/// configuration nothing is read from or written to storage.
pub struct FetchConfig<T, E> {
    pub(crate) type_check: Option<TypeCheck<T>>,
    pub(crate) on_success: Option<SuccessCallback<T>>,
    pub(crate) on_error: Option<ErrorCallback<E>>,
    pub(crate) cache_config: Option<CacheConfig>,
    pub(crate) bind_cache: Option<fn(ResultCache, CacheConfig) -> Arc<dyn ResultCacheLayer<T>>>,
    pub(crate) storages: Storages,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<T, E> FetchConfig<T, E> {
    pub fn new() -> Self {
        Self {
            type_check: None,
            on_success: None,
            on_error: None,
            cache_config: None,
            bind_cache: None,
            storages: Storages::unavailable(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Rejects resolved values for which `check` returns false.
    ///
    /// A rejected value settles as [`AsyncError::TypeCheck`], is reported to
    /// `on_error` and is never cached. A panic inside `check` settles as
    /// [`AsyncError::Panicked`].
    ///
    /// ## Examples
    ///
    /// ```
    /// use easefetch::FetchConfig;
    ///
    /// let config = FetchConfig::<Vec<u32>, String>::new().type_check(|ids| !ids.is_empty());
    /// ```
    pub fn type_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.type_check = Some(Arc::new(check));
        self
    }

    /// Called once per invocation that resolves, passes the type check and
    /// is still current. Not called for cache hits.
    ///
    /// Runs on the tracker's task after the cache write and before the state
    /// becomes `Success`. A panic is logged and does not change the outcome.
    ///
    /// ## Examples
    ///
    /// ```
    /// use easefetch::FetchConfig;
    ///
    /// let config = FetchConfig::<Vec<u32>, String>::new()
    ///     .on_success(|ids| println!("fetched {} ids", ids.len()));
    /// ```
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    /// Called once per current invocation that fails, whether it was
    /// rejected, panicked or failed the type check. A panic is logged and the
    /// state still becomes `Fail`.
    ///
    /// ## Examples
    ///
    /// ```
    /// use easefetch::{AsyncError, FetchConfig};
    ///
    /// let config = FetchConfig::<u32, String>::new().on_error(|error: &AsyncError<String>| {
    ///     if let Some(reason) = error.rejection() {
    ///         eprintln!("request rejected: {reason}");
    ///     }
    /// });
    /// ```
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&AsyncError<E>) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Enables the result cache. Fails if the cache key is empty.
    ///
    /// ## Examples
    ///
    /// ```
    /// use easefetch::{CacheConfig, ConfigError, FetchConfig};
    ///
    /// let config = FetchConfig::<Vec<u32>, String>::new()
    ///     .cache(CacheConfig::new("ids").expires_ms(60_000))
    ///     .unwrap();
    /// assert_eq!(config.cache_config().unwrap().cache_key, "ids");
    ///
    /// let empty = FetchConfig::<Vec<u32>, String>::new().cache(CacheConfig::new(""));
    /// assert!(matches!(empty, Err(ConfigError::EmptyCacheKey)));
    /// ```
    pub fn cache(mut self, config: CacheConfig) -> Result<Self, ConfigError>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        config.validate()?;
        self.cache_config = Some(config);
        self.bind_cache = Some(bind_cache::<T>);
        Ok(self)
    }

    /// The backends the cache reads and writes. Defaults to
    /// [`Storages::unavailable`], which makes every lookup a miss.
    pub fn storages(mut self, storages: Storages) -> Self {
        self.storages = storages;
        self
    }

    /// Time source for freshness checks and `storedAt`. Tests inject a
    /// [`crate::ManualClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache_config(&self) -> Option<&CacheConfig> {
        self.cache_config.as_ref()
    }

    pub(crate) fn result_cache(&self) -> Option<Arc<dyn ResultCacheLayer<T>>> {
        let config = self.cache_config.clone()?;
        let bind = self.bind_cache?;
        let backend = self.storages.select(config.use_local_storage);
        Some(bind(ResultCache::new(backend), config))
    }
}

impl<T, E> Default for FetchConfig<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for FetchConfig<T, E> {
    fn clone(&self) -> Self {
        Self {
            type_check: self.type_check.clone(),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            cache_config: self.cache_config.clone(),
            bind_cache: self.bind_cache,
            storages: self.storages.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<T, E> Debug for FetchConfig<T, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchConfig")
            .field("type_check", &self.type_check.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("cache", &self.cache_config)
            .field("storages", &self.storages)
            .field("clock", &self.clock)
            .finish()
    }
}
