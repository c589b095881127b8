//! Access-token container: one physical record holding every access token of
//! a (home account, environment, realm, client) tuple, keyed by target.
//!
//! No two entries may have intersecting scope sets. Inserting a token evicts
//! every entry it overlaps with, so the content is a pure function of the
//! write history.

use serde_json::{Map, Value};

use super::envelope::{open_record, seal_record};
use super::paths::RecordPath;
use super::scopes::{find_match, intersects, normalize_scopes};
use super::traits::DeviceKeystore;
use crate::error::{StorageError, StorageResult};
use crate::types::Credential;

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct AccessTokenContainer {
    entries: Map<String, Value>,
}

impl AccessTokenContainer {
    /// Opens the container bytes; missing or unreadable bytes give an empty
    /// container.
    pub(crate) fn open(
        keystore: &dyn DeviceKeystore,
        path: &RecordPath,
        bytes: Option<&[u8]>,
    ) -> Self {
        let entries = bytes
            .and_then(|bytes| open_record::<Map<String, Value>>(keystore, path, bytes))
            .unwrap_or_default();
        Self { entries }
    }

    pub(crate) fn seal(
        &self,
        keystore: &dyn DeviceKeystore,
        path: &RecordPath,
    ) -> StorageResult<Vec<u8>> {
        seal_record(keystore, path, &self.entries)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Returns the token whose scopes cover `target`.
    ///
    /// An entry that matches but cannot be parsed reads as absent.
    pub(crate) fn find(&self, target: &str) -> StorageResult<Option<Credential>> {
        let Some(key) = find_match(self.entries.keys().map(String::as_str), target)? else {
            return Ok(None);
        };
        let Some(value) = self.entries.get(key) else {
            return Ok(None);
        };
        match serde_json::from_value::<Credential>(value.clone()) {
            Ok(credential) => Ok(Some(credential)),
            Err(err) => {
                tracing::warn!(
                    target_key = key,
                    error = %err,
                    "ignoring unreadable access token entry"
                );
                Ok(None)
            }
        }
    }

    /// Inserts `credential` under its own target, evicting every entry whose
    /// scopes intersect it.
    pub(crate) fn insert(&mut self, credential: &Credential) -> StorageResult<()> {
        let scopes = normalize_scopes(&credential.target);
        if scopes.is_empty() {
            return Err(StorageError::invalid_argument(
                "target",
                "access tokens need at least one scope",
            ));
        }
        let value = serde_json::to_value(credential)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.entries
            .retain(|key, _| !intersects(&normalize_scopes(key), &scopes));
        self.entries.insert(credential.target.clone(), value);
        Ok(())
    }

    /// Removes the entry whose scopes cover `target`; returns whether one was
    /// removed.
    pub(crate) fn remove_matching(&mut self, target: &str) -> StorageResult<bool> {
        let Some(key) = find_match(self.entries.keys().map(String::as_str), target)?
            .map(str::to_string)
        else {
            return Ok(false);
        };
        self.entries.retain(|existing, _| *existing != key);
        Ok(true)
    }
}
