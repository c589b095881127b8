//! Record envelope: JSON payload sealed by the device keystore.
//!
//! The record's relative path is the associated data, so a sealed record only
//! opens at the path it was written to.

use serde::{de::DeserializeOwned, Serialize};

use super::paths::RecordPath;
use super::traits::DeviceKeystore;
use crate::error::{StorageError, StorageResult};

/// Serializes `record` to JSON and seals it for `path`.
pub(crate) fn seal_record<T: Serialize>(
    keystore: &dyn DeviceKeystore,
    path: &RecordPath,
    record: &T,
) -> StorageResult<Vec<u8>> {
    let json =
        serde_json::to_vec(record).map_err(|err| StorageError::Serialization(err.to_string()))?;
    keystore.seal(path.as_str().as_bytes(), &json)
}

/// Opens and parses the record stored at `path`.
///
/// # Errors
///
/// Returns `Malformed` if the bytes cannot be opened or parsed.
pub(crate) fn try_open_record<T: DeserializeOwned>(
    keystore: &dyn DeviceKeystore,
    path: &RecordPath,
    bytes: &[u8],
) -> StorageResult<T> {
    let json = keystore
        .open_sealed(path.as_str().as_bytes(), bytes)
        .map_err(|err| StorageError::malformed(format!("{path}: {err}")))?;
    serde_json::from_slice(&json).map_err(|err| StorageError::malformed(format!("{path}: {err}")))
}

/// Like [`try_open_record`], but a malformed record reads as absent.
pub(crate) fn open_record<T: DeserializeOwned>(
    keystore: &dyn DeviceKeystore,
    path: &RecordPath,
    bytes: &[u8],
) -> Option<T> {
    match try_open_record(keystore, path, bytes) {
        Ok(record) => Some(record),
        Err(err) => {
            tracing::warn!(%path, error = %err, "ignoring unreadable cache record");
            None
        }
    }
}
