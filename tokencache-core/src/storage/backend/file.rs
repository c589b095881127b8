//! Filesystem backend with atomic record replacement.
//!
//! Writes follow the write-to-temp-then-rename pattern:
//!
//! 1. Write the bytes to a uniquely named temporary file next to the target
//! 2. `fsync` the temporary file
//! 3. Rename it over the target
//! 4. `fsync` the parent directory
//!
//! Readers therefore see either the old or the new record, never a partial
//! one.
//!
//! Every mutation of a record (read-modify-write, delete, purge) holds that
//! record's in-process lock and an exclusive lock on its lock file under
//! `.locks/`, so backends in other processes sharing the cache directory
//! serialize with this one. Lock files are never removed: unlinking a lock
//! file another process is waiting on would let a third process lock a fresh
//! inode alongside it.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::file_lock::FileLock;
use super::locks::PathLocks;
use crate::error::{StorageError, StorageResult};
use crate::storage::paths::{RecordPath, StoragePaths};
use crate::storage::traits::{Mutation, StorageBackend};

const LOCKS_DIR: &str = ".locks";
const LOCK_EXTENSION: &str = ".lock";

/// A concurrent purge may remove a freshly created directory before the
/// temporary file lands in it.
const CREATE_ATTEMPTS: usize = 3;

/// Filesystem backend rooted at [`StoragePaths::cache_dir`].
#[derive(Debug)]
pub struct FileBackend {
    paths: StoragePaths,
    locks: PathLocks,
}

impl FileBackend {
    /// Creates a backend, creating the cache directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(paths: StoragePaths) -> StorageResult<Self> {
        fs::create_dir_all(paths.cache_dir()).map_err(|err| {
            StorageError::io(
                format!("create cache directory '{}'", paths.cache_dir().display()),
                err,
            )
        })?;
        Ok(Self {
            paths,
            locks: PathLocks::new(),
        })
    }

    /// Returns the paths this backend writes under.
    #[must_use]
    pub const fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    fn lock_file_path(&self, path: &RecordPath) -> PathBuf {
        let mut lock: OsString = path
            .to_path_buf(&self.paths.cache_dir().join(LOCKS_DIR))
            .into_os_string();
        lock.push(LOCK_EXTENSION);
        PathBuf::from(lock)
    }

    fn with_path_lock<R, F>(&self, path: &RecordPath, f: F) -> StorageResult<R>
    where
        F: FnOnce() -> StorageResult<R>,
    {
        self.locks.with_lock(path, || {
            let lock = FileLock::open(&self.lock_file_path(path))?;
            let _guard = lock.lock()?;
            f()
        })
    }

    fn temp_path(target: &Path) -> PathBuf {
        let name = target
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        target.with_file_name(format!(
            ".{name}.{}.{}.tmp",
            std::process::id(),
            Uuid::new_v4().simple()
        ))
    }

    fn create_temp(parent: &Path, temp: &Path) -> StorageResult<File> {
        let mut attempt = 1;
        loop {
            let created = fs::create_dir_all(parent).and_then(|()| {
                OpenOptions::new().write(true).create_new(true).open(temp)
            });
            match created {
                Ok(file) => return Ok(file),
                Err(err) if err.kind() == ErrorKind::NotFound && attempt < CREATE_ATTEMPTS => {
                    attempt += 1;
                }
                Err(err) => {
                    return Err(StorageError::io(
                        format!("create temporary file '{}'", temp.display()),
                        err,
                    ))
                }
            }
        }
    }

    fn write_atomic(&self, path: &RecordPath, bytes: &[u8]) -> StorageResult<()> {
        let target = self.paths.record_path(path);
        let parent = target.parent().ok_or_else(|| {
            StorageError::invalid_argument("path", format!("'{path}' has no parent"))
        })?;

        let temp = Self::temp_path(&target);
        let mut file = Self::create_temp(parent, &temp)?;
        let written = file
            .write_all(bytes)
            .and_then(|()| file.sync_all())
            .map_err(|err| StorageError::io(format!("write '{}'", temp.display()), err));
        drop(file);
        if let Err(err) = written {
            let _ = fs::remove_file(&temp);
            return Err(err);
        }

        fs::rename(&temp, &target).map_err(|err| {
            let _ = fs::remove_file(&temp);
            StorageError::io(
                format!("rename '{}' to '{}'", temp.display(), target.display()),
                err,
            )
        })?;
        sync_directory(parent)
    }

    /// Removes a record; the caller holds its path lock.
    fn remove_record(&self, path: &RecordPath) -> StorageResult<()> {
        let target = self.paths.record_path(path);
        match fs::remove_file(&target) {
            Ok(()) => {
                if let Some(parent) = target.parent() {
                    sync_directory(parent)?;
                    self.prune_empty_parents(parent);
                }
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::io(
                format!("delete record '{}'", target.display()),
                err,
            )),
        }
    }

    /// Removes `dir` and its ancestors below the cache directory while they
    /// are empty.
    fn prune_empty_parents(&self, dir: &Path) {
        let cache_dir = self.paths.cache_dir();
        let mut current = dir.to_path_buf();
        while current != cache_dir && current.starts_with(cache_dir) {
            match fs::remove_dir(&current) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(_) => return,
            }
            if !current.pop() {
                return;
            }
        }
    }

    /// Removes every empty directory in the tree rooted at `dir`, bottom-up.
    fn prune_empty_tree(dir: &Path) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            if entry.file_type().is_ok_and(|file_type| file_type.is_dir()) {
                Self::prune_empty_tree(&entry.path());
            }
        }
        let _ = fs::remove_dir(dir);
    }

    fn collect(&self, dir: &Path, out: &mut Vec<RecordPath>) -> StorageResult<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(StorageError::io(
                    format!("list directory '{}'", dir.display()),
                    err,
                ))
            }
        };
        for entry in entries {
            let entry = entry.map_err(|err| {
                StorageError::io(format!("list directory '{}'", dir.display()), err)
            })?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let file_type = entry.file_type().map_err(|err| {
                StorageError::io(format!("stat '{}'", entry.path().display()), err)
            })?;
            let entry_path = entry.path();
            if file_type.is_dir() {
                self.collect(&entry_path, out)?;
            } else if file_type.is_file() {
                if let Some(record) = self.relative_record_path(&entry_path) {
                    out.push(record);
                }
            }
        }
        Ok(())
    }

    fn relative_record_path(&self, absolute: &Path) -> Option<RecordPath> {
        let relative = absolute.strip_prefix(self.paths.cache_dir()).ok()?;
        let joined = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/");
        RecordPath::parse(&joined).ok()
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, path: &RecordPath) -> StorageResult<Option<Vec<u8>>> {
        let target = self.paths.record_path(path);
        match fs::read(&target) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::io(
                format!("read record '{}'", target.display()),
                err,
            )),
        }
    }

    fn delete_file(&self, path: &RecordPath) -> StorageResult<()> {
        self.with_path_lock(path, || self.remove_record(path))
    }

    fn delete_content(&self, prefix: &RecordPath) -> StorageResult<()> {
        for path in self.list(prefix)? {
            self.delete_file(&path)?;
        }
        let target = self.paths.record_path(prefix);
        if target.is_dir() {
            Self::prune_empty_tree(&target);
            if let Some(parent) = target.parent() {
                self.prune_empty_parents(parent);
            }
        }
        Ok(())
    }

    fn read_modify_write(
        &self,
        path: &RecordPath,
        mutator: &mut dyn FnMut(Option<Vec<u8>>) -> StorageResult<Mutation>,
    ) -> StorageResult<()> {
        self.with_path_lock(path, || {
            let current = self.read(path)?;
            match mutator(current)? {
                Mutation::Write(bytes) => self.write_atomic(path, &bytes),
                Mutation::Delete => self.remove_record(path),
                Mutation::Keep => Ok(()),
            }
        })
    }

    fn list(&self, prefix: &RecordPath) -> StorageResult<Vec<RecordPath>> {
        let target = self.paths.record_path(prefix);
        let mut out = Vec::new();
        if target.is_file() {
            out.push(prefix.clone());
        } else {
            self.collect(&target, &mut out)?;
        }
        out.sort();
        Ok(out)
    }
}

#[cfg(unix)]
fn sync_directory(dir: &Path) -> StorageResult<()> {
    File::open(dir)
        .and_then(|handle| handle.sync_all())
        .map_err(|err| StorageError::io(format!("sync directory '{}'", dir.display()), err))
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> StorageResult<()> {
    Ok(())
}
