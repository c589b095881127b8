//! Advisory file locks for serializing record mutations across processes.
//!
//! Uses the platform's exclusive file lock (`flock` on Unix, `LockFileEx` on
//! Windows). The lock is held by an open handle, so two handles on the same
//! file exclude each other even inside one process.

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use crate::error::{StorageError, StorageResult};

/// An open lock file.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

/// Guard that holds the exclusive lock for its lifetime.
#[derive(Debug)]
pub struct FileLockGuard<'a> {
    file: &'a File,
}

impl FileLock {
    /// Opens or creates the lock file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its parent directory cannot be created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| map_lock_err(path, &err))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|err| map_lock_err(path, &err))?;
        Ok(Self { file })
    }

    /// Blocks until the exclusive lock is acquired.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses the lock.
    pub fn lock(&self) -> StorageResult<FileLockGuard<'_>> {
        self.file
            .lock()
            .map_err(|err| StorageError::lock(format!("acquire file lock: {err}")))?;
        Ok(FileLockGuard { file: &self.file })
    }

    #[cfg(test)]
    pub fn try_lock(&self) -> StorageResult<Option<FileLockGuard<'_>>> {
        match self.file.try_lock() {
            Ok(()) => Ok(Some(FileLockGuard { file: &self.file })),
            Err(std::fs::TryLockError::WouldBlock) => Ok(None),
            Err(std::fs::TryLockError::Error(err)) => {
                Err(StorageError::lock(format!("try file lock: {err}")))
            }
        }
    }
}

impl Drop for FileLockGuard<'_> {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn map_lock_err(path: &Path, err: &std::io::Error) -> StorageError {
    StorageError::lock(format!("open lock file '{}': {err}", path.display()))
}
