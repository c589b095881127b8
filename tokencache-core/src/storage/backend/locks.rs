//! Per-path lock table.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::error::{StorageError, StorageResult};
use crate::storage::paths::RecordPath;

/// One mutex per record path.
///
/// Holders of different paths never contend; the map itself is sharded so
/// looking up a lock does not take a global mutex. An entry lives only while
/// some caller holds or waits for it.
#[derive(Debug, Default)]
pub struct PathLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PathLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, path: &RecordPath) -> Arc<Mutex<()>> {
        self.locks
            .entry(path.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Executes `f` while holding the lock for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned or `f` fails.
    pub fn with_lock<R, F>(&self, path: &RecordPath, f: F) -> StorageResult<R>
    where
        F: FnOnce() -> StorageResult<R>,
    {
        let lock = self.lock_for(path);
        let result = match lock.lock() {
            Ok(_guard) => f(),
            Err(err) => Err(StorageError::lock(format!("{path}: {err}"))),
        };
        drop(lock);
        self.evict_idle(path);
        result
    }

    // Entries are only cloned under the shard lock, so a count of one means
    // nobody else holds or waits for this mutex.
    fn evict_idle(&self, path: &RecordPath) {
        self.locks
            .remove_if(path.as_str(), |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Returns the number of paths currently locked or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns `true` if no path is currently locked or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
