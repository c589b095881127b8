//! In-memory backend.
//!
//! Nothing is persisted; useful for tests and for hosts that keep the cache in
//! process memory and serialize it elsewhere.

use dashmap::DashMap;

use super::locks::PathLocks;
use crate::error::StorageResult;
use crate::storage::paths::RecordPath;
use crate::storage::traits::{Mutation, StorageBackend};

/// In-memory backend backed by a sharded map.
///
/// Every mutation of a path, including deletes, happens under that path's
/// lock, so a purge never interleaves with a read-modify-write cycle.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: DashMap<RecordPath, Vec<u8>>,
    locks: PathLocks,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn matching(&self, prefix: &RecordPath) -> Vec<RecordPath> {
        let mut paths: Vec<RecordPath> = self
            .records
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        paths.sort();
        paths
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, path: &RecordPath) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.records.get(path).map(|entry| entry.value().clone()))
    }

    fn delete_file(&self, path: &RecordPath) -> StorageResult<()> {
        self.locks.with_lock(path, || {
            self.records.remove(path);
            Ok(())
        })
    }

    fn delete_content(&self, prefix: &RecordPath) -> StorageResult<()> {
        for path in self.matching(prefix) {
            self.delete_file(&path)?;
        }
        Ok(())
    }

    fn read_modify_write(
        &self,
        path: &RecordPath,
        mutator: &mut dyn FnMut(Option<Vec<u8>>) -> StorageResult<Mutation>,
    ) -> StorageResult<()> {
        self.locks.with_lock(path, || {
            let current = self.read(path)?;
            match mutator(current)? {
                Mutation::Write(bytes) => {
                    self.records.insert(path.clone(), bytes);
                }
                Mutation::Delete => {
                    self.records.remove(path);
                }
                Mutation::Keep => {}
            }
            Ok(())
        })
    }

    fn list(&self, prefix: &RecordPath) -> StorageResult<Vec<RecordPath>> {
        Ok(self.matching(prefix))
    }
}
