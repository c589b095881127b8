//! Platform interfaces for the storage engine.

use std::sync::Arc;

use super::paths::RecordPath;
use crate::error::StorageResult;

/// What a read-modify-write mutator wants done with the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Replace the record with these bytes.
    Write(Vec<u8>),
    /// Remove the record.
    Delete,
    /// Leave the record untouched.
    Keep,
}

/// Byte-level hierarchical store the storage worker persists records in.
///
/// Implementations know nothing about credential semantics. They must
/// serialize `read_modify_write`, `delete_file` and the per-record deletes of
/// `delete_content` against the same path, and must not serialize calls
/// against different paths.
pub trait StorageBackend: Send + Sync {
    /// Reads the record at `path`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails. A missing record is `Ok(None)`.
    fn read(&self, path: &RecordPath) -> StorageResult<Option<Vec<u8>>>;

    /// Deletes the record at `path`. Deleting a missing record succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_file(&self, path: &RecordPath) -> StorageResult<()>;

    /// Deletes every record at or under `prefix`, waiting for any
    /// in-flight read-modify-write on each record.
    ///
    /// # Errors
    ///
    /// Returns an error if any delete fails.
    fn delete_content(&self, prefix: &RecordPath) -> StorageResult<()>;

    /// Runs `mutator` over the current bytes at `path` and applies its
    /// [`Mutation`], holding the per-path lock for the whole cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock, read or write fails, or if the mutator
    /// fails (in which case nothing is written).
    fn read_modify_write(
        &self,
        path: &RecordPath,
        mutator: &mut dyn FnMut(Option<Vec<u8>>) -> StorageResult<Mutation>,
    ) -> StorageResult<()>;

    /// Lists every record at or under `prefix`, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns an error if enumeration fails.
    fn list(&self, prefix: &RecordPath) -> StorageResult<Vec<RecordPath>>;
}

/// Keystore that seals records before they reach the backend.
pub trait DeviceKeystore: Send + Sync {
    /// Seals plaintext, authenticating `associated_data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the keystore refuses the operation or the seal fails.
    fn seal(&self, associated_data: &[u8], plaintext: &[u8]) -> StorageResult<Vec<u8>>;

    /// Opens ciphertext produced by [`DeviceKeystore::seal`] with the same
    /// associated data.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails or the keystore cannot open.
    fn open_sealed(&self, associated_data: &[u8], ciphertext: &[u8]) -> StorageResult<Vec<u8>>;
}

/// Provider responsible for the platform-specific storage components.
pub trait StorageProvider: Send + Sync {
    /// Returns the keystore implementation.
    fn keystore(&self) -> Arc<dyn DeviceKeystore>;

    /// Returns the backend implementation.
    fn backend(&self) -> Arc<dyn StorageBackend>;
}
