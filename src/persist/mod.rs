//! Duplicate cache: the persisted set of keys already delivered.
//!
//! File sync and live listening share one cache, so it is the single record
//! of what has been sent. Implementations never lose a key except through
//! [`DupeCache::clear`].

/// Sorted newline-delimited key file.
pub mod file;
/// SQLite-backed cache safe for concurrent processes.
pub mod sqlite;

use std::sync::Arc;

use hashbrown::HashSet;
use tokio::sync::Mutex;

use crate::types::DupeKey;

/// Failure to write or clear the cache.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Filesystem failure.
    #[error("cache io: {0}")]
    Io(#[from] std::io::Error),
    /// SQLite failure.
    #[error("cache sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The blocking task running a cache call did not complete.
    #[error("cache task: {0}")]
    Join(String),
}

/// Result alias for cache writes.
pub type PersistResult<T> = Result<T, PersistError>;

/// Load/add/clear contract shared by both ingestion paths.
pub trait DupeCache: Send {
    /// Reads every stored key. A missing or unreadable store is empty.
    fn load(&self) -> HashSet<DupeKey>;
    /// Records `key`; adding a present key leaves the store unchanged.
    fn add(&mut self, key: &DupeKey) -> PersistResult<()>;
    /// Forgets every key.
    fn clear(&mut self) -> PersistResult<()>;
}

impl<C: DupeCache + ?Sized> DupeCache for Box<C> {
    fn load(&self) -> HashSet<DupeKey> {
        (**self).load()
    }

    fn add(&mut self, key: &DupeKey) -> PersistResult<()> {
        (**self).add(key)
    }

    fn clear(&mut self) -> PersistResult<()> {
        (**self).clear()
    }
}

/// Runs [`DupeCache::load`] on the blocking pool.
pub async fn load_blocking<C: DupeCache + 'static>(
    cache: &Arc<Mutex<C>>,
) -> PersistResult<HashSet<DupeKey>> {
    let cache = Arc::clone(cache);
    tokio::task::spawn_blocking(move || cache.blocking_lock().load())
        .await
        .map_err(|e| PersistError::Join(e.to_string()))
}

/// Runs [`DupeCache::add`] on the blocking pool.
pub async fn add_blocking<C: DupeCache + 'static>(
    cache: &Arc<Mutex<C>>,
    key: &DupeKey,
) -> PersistResult<()> {
    let cache = Arc::clone(cache);
    let key = key.clone();
    tokio::task::spawn_blocking(move || cache.blocking_lock().add(&key))
        .await
        .map_err(|e| PersistError::Join(e.to_string()))?
}

/// Process-local cache, nothing survives a restart.
#[derive(Debug, Default, Clone)]
pub struct MemoryDupeCache {
    keys: HashSet<DupeKey>,
}

impl MemoryDupeCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DupeCache for MemoryDupeCache {
    fn load(&self) -> HashSet<DupeKey> {
        self.keys.clone()
    }

    fn add(&mut self, key: &DupeKey) -> PersistResult<()> {
        self.keys.insert(key.clone());
        Ok(())
    }

    fn clear(&mut self) -> PersistResult<()> {
        self.keys.clear();
        Ok(())
    }
}
