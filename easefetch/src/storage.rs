use crate::StorageError;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// A synchronous string key-value store, shaped like browser storage.
///
/// Both operations are fallible because real hosts can refuse access (storage
/// disabled, sandboxed, quota exceeded). Callers in this crate treat every
/// error as "no cache" and never surface it.
pub trait StorageBackend: Send + Sync + Debug {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Session-scoped storage: an in-memory map dropped with the session.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Persistent storage: a JSON object of string values kept in one file.
///
/// The file is re-read on every access so that several processes (sessions)
/// observe each other's writes. A missing file is an empty store.
///
/// Writes go to a temporary file in the same directory, which then replaces
/// the store with a rename, so readers see either the old or the new contents
/// and never a partial file. Writers in one process are serialised; across
/// processes a write is a read-modify-replace of the whole file, so concurrent
/// writers are last-writer-wins and one of two simultaneous updates can be
/// lost.
///
/// ## Examples
///
/// ```no_run
/// use easefetch::{FileStorage, StorageBackend};
///
/// let storage = FileStorage::new("/tmp/easefetch-local.json");
/// storage.set_item("todos", "[]").unwrap();
/// assert_eq!(storage.get_item("todos").unwrap().as_deref(), Some("[]"));
/// ```
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn replace(&self, items: &HashMap<String, String>) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut file, items)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.load()?;
        items.insert(key.to_string(), value.to_string());
        self.replace(&items)
    }
}

/// A backend for hosts without storage. Every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStorage;

impl StorageBackend for NoopStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }
}

/// The two interchangeable backends a tracker can cache into.
///
/// `session` is used by default; [`crate::CacheConfig::use_local_storage`]
/// switches a tracker to `local`. Both are shared, so trackers built from
/// clones of one `Storages` see each other's entries.
///
/// ## Examples
///
/// ```
/// use easefetch::{MemoryStorage, NoopStorage, StorageBackend, Storages};
/// use std::sync::Arc;
///
/// let session = Arc::new(MemoryStorage::new());
/// let storages = Storages::new(session.clone(), Arc::new(NoopStorage));
///
/// storages.select(false).set_item("k", "v").unwrap();
/// assert_eq!(session.len(), 1);
/// assert!(storages.select(true).get_item("k").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Storages {
    pub session: Arc<dyn StorageBackend>,
    pub local: Arc<dyn StorageBackend>,
}

impl Storages {
    /// Pairs a session backend with a persistent one.
    pub fn new(session: Arc<dyn StorageBackend>, local: Arc<dyn StorageBackend>) -> Self {
        Self { session, local }
    }

    /// Neither backend is reachable; caching always misses.
    pub fn unavailable() -> Self {
        Self::new(Arc::new(NoopStorage), Arc::new(NoopStorage))
    }

    /// Session storage in memory, persistent storage in the file at `path`.
    ///
    /// ```no_run
    /// use easefetch::{CacheConfig, FetchConfig, Storages};
    ///
    /// let config = FetchConfig::<Vec<u32>, String>::new()
    ///     .storages(Storages::with_file("/tmp/easefetch-local.json"))
    ///     .cache(CacheConfig::new("ids").expires_ms(60_000).use_local_storage(true))
    ///     .unwrap();
    /// ```
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(MemoryStorage::new()), Arc::new(FileStorage::new(path)))
    }

    /// `local` when `use_local_storage` is true, `session` otherwise.
    pub fn select(&self, use_local_storage: bool) -> Arc<dyn StorageBackend> {
        if use_local_storage {
            self.local.clone()
        } else {
            self.session.clone()
        }
    }
}

impl Default for Storages {
    fn default() -> Self {
        Self::unavailable()
    }
}
