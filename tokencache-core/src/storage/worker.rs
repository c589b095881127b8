//! Storage worker: maps logical records to physical paths and implements the
//! per-kind read, write and delete rules.
//!
//! Every operation is a stateless sequence of backend calls. Mutations go
//! through the backend's per-path read-modify-write so concurrent writers to
//! one record never lose each other's updates.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use super::container::AccessTokenContainer;
use super::envelope::{open_record, seal_record};
use super::paths::{
    account_path, accounts_dir, app_metadata_path, client_refresh_token_path, credential_path,
    family_refresh_token_path, is_account_path, user_data_root, user_environment_dir, RecordPath,
};
use super::traits::{DeviceKeystore, Mutation, StorageBackend, StorageProvider};
use crate::error::{StorageError, StorageResult};
use crate::types::{Account, AppMetadata, Credential, CredentialType, Merge};

/// Selects credentials for reads and deletes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialQuery {
    /// Home account id of the user.
    pub home_account_id: String,
    /// Authority host.
    pub environment: String,
    /// Tenant; used by access and ID tokens.
    pub realm: String,
    /// Client id; used by every kind except family refresh tokens.
    pub client_id: String,
    /// Family id; selects the family refresh token.
    pub family_id: String,
    /// Requested scopes; required when access tokens are selected.
    pub target: String,
    /// Credential kinds to visit.
    pub types: BTreeSet<CredentialType>,
}

impl CredentialQuery {
    /// Creates a query for one user in one environment.
    pub fn new(home_account_id: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            home_account_id: home_account_id.into(),
            environment: environment.into(),
            ..Self::default()
        }
    }

    /// Sets the realm.
    #[must_use]
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// Sets the client id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Sets the family id.
    #[must_use]
    pub fn with_family_id(mut self, family_id: impl Into<String>) -> Self {
        self.family_id = family_id.into();
        self
    }

    /// Sets the requested scopes.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Adds credential kinds to visit.
    #[must_use]
    pub fn with_types(mut self, types: impl IntoIterator<Item = CredentialType>) -> Self {
        self.types.extend(types);
        self
    }

    fn refresh_token_paths(&self) -> StorageResult<Vec<RecordPath>> {
        let mut paths = Vec::with_capacity(2);
        if !self.client_id.trim().is_empty() {
            paths.push(client_refresh_token_path(
                &self.home_account_id,
                &self.environment,
                &self.client_id,
            )?);
        }
        if !self.family_id.trim().is_empty() {
            paths.push(family_refresh_token_path(
                &self.home_account_id,
                &self.environment,
                &self.family_id,
            )?);
        }
        if paths.is_empty() {
            return Err(StorageError::invalid_argument(
                "client_id",
                "refresh tokens need a client id or a family id",
            ));
        }
        Ok(paths)
    }

    fn path_for(&self, credential_type: CredentialType) -> StorageResult<RecordPath> {
        credential_path(
            &self.home_account_id,
            &self.environment,
            &self.realm,
            &self.client_id,
            "",
            credential_type,
        )
    }
}

/// Backend-agnostic orchestrator for every record kind.
#[derive(Clone)]
pub struct StorageWorker {
    backend: Arc<dyn StorageBackend>,
    keystore: Arc<dyn DeviceKeystore>,
}

impl std::fmt::Debug for StorageWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageWorker").finish_non_exhaustive()
    }
}

impl StorageWorker {
    /// Creates a worker from explicit components.
    pub fn new(backend: Arc<dyn StorageBackend>, keystore: Arc<dyn DeviceKeystore>) -> Self {
        Self { backend, keystore }
    }

    /// Creates a worker from a platform provider.
    pub fn from_provider(provider: &dyn StorageProvider) -> Self {
        Self::new(provider.backend(), provider.keystore())
    }

    /// Returns the backend records are persisted in.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    // ── credentials ─────────────────────────────────────────────────────

    /// Reads the credentials selected by `query`.
    ///
    /// Access tokens are matched by scope superset. Refresh tokens are read
    /// from the client path and the family path when the respective id is
    /// set; both may be returned. Unreadable records are skipped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for unusable queries and I/O errors from the
    /// backend.
    pub fn read_credentials(&self, query: &CredentialQuery) -> StorageResult<Vec<Credential>> {
        let mut found = Vec::new();
        for credential_type in &query.types {
            match credential_type {
                CredentialType::AccessToken => {
                    let path = query.path_for(CredentialType::AccessToken)?;
                    let bytes = self.backend.read(&path)?;
                    let container =
                        AccessTokenContainer::open(self.keystore.as_ref(), &path, bytes.as_deref());
                    found.extend(container.find(&query.target)?);
                }
                CredentialType::RefreshToken => {
                    for path in query.refresh_token_paths()? {
                        found.extend(self.read_credential(&path, CredentialType::RefreshToken)?);
                    }
                }
                CredentialType::IdToken => {
                    let path = query.path_for(CredentialType::IdToken)?;
                    found.extend(self.read_credential(&path, CredentialType::IdToken)?);
                }
            }
        }
        tracing::debug!(
            requested = query.types.len(),
            found = found.len(),
            "read credentials"
        );
        Ok(found)
    }

    /// Writes credentials.
    ///
    /// Access tokens are merged into their container, evicting every entry
    /// whose scopes intersect the new token. Other kinds are merged field by
    /// field onto the stored record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for credentials that cannot be placed and
    /// I/O or keystore errors. Credentials before the failing one stay
    /// written.
    pub fn write_credentials(&self, credentials: &[Credential]) -> StorageResult<()> {
        for credential in credentials {
            let path = credential_path(
                &credential.home_account_id,
                &credential.environment,
                &credential.realm,
                &credential.client_id,
                &credential.family_id,
                credential.credential_type,
            )?;
            match credential.credential_type {
                CredentialType::AccessToken => self.insert_access_token(&path, credential)?,
                CredentialType::RefreshToken | CredentialType::IdToken => {
                    self.merge_record(&path, credential)?;
                }
            }
            tracing::debug!(
                %path,
                credential_type = %credential.credential_type,
                "wrote credential"
            );
        }
        Ok(())
    }

    /// Deletes the credentials selected by `query`.
    ///
    /// Removing the last access token of a container removes the container.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for unusable queries and I/O errors.
    pub fn delete_credentials(&self, query: &CredentialQuery) -> StorageResult<()> {
        for credential_type in &query.types {
            match credential_type {
                CredentialType::AccessToken => {
                    let path = query.path_for(CredentialType::AccessToken)?;
                    self.remove_access_token(&path, &query.target)?;
                }
                CredentialType::RefreshToken => {
                    for path in query.refresh_token_paths()? {
                        self.backend.delete_file(&path)?;
                    }
                }
                CredentialType::IdToken => {
                    let path = query.path_for(CredentialType::IdToken)?;
                    self.backend.delete_file(&path)?;
                }
            }
        }
        tracing::debug!(kinds = query.types.len(), "deleted credentials");
        Ok(())
    }

    fn read_credential(
        &self,
        path: &RecordPath,
        expected: CredentialType,
    ) -> StorageResult<Option<Credential>> {
        Ok(self
            .read_record::<Credential>(path)?
            .filter(|credential| {
                let matches = credential.credential_type == expected;
                if !matches {
                    tracing::warn!(
                        %path,
                        stored = %credential.credential_type,
                        %expected,
                        "ignoring credential stored under another kind's path"
                    );
                }
                matches
            }))
    }

    fn insert_access_token(&self, path: &RecordPath, credential: &Credential) -> StorageResult<()> {
        let keystore = self.keystore.as_ref();
        self.backend.read_modify_write(path, &mut |current| {
            let mut container = AccessTokenContainer::open(keystore, path, current.as_deref());
            container.insert(credential)?;
            Ok(Mutation::Write(container.seal(keystore, path)?))
        })
    }

    fn remove_access_token(&self, path: &RecordPath, target: &str) -> StorageResult<()> {
        let keystore = self.keystore.as_ref();
        self.backend.read_modify_write(path, &mut |current| {
            let Some(bytes) = current else {
                // Still validates the requested scopes.
                AccessTokenContainer::default().remove_matching(target)?;
                return Ok(Mutation::Keep);
            };
            let mut container = AccessTokenContainer::open(keystore, path, Some(&bytes));
            if !container.remove_matching(target)? {
                return Ok(Mutation::Keep);
            }
            if container.is_empty() {
                Ok(Mutation::Delete)
            } else {
                Ok(Mutation::Write(container.seal(keystore, path)?))
            }
        })
    }

    // ── accounts ────────────────────────────────────────────────────────

    /// Reads the account of one realm.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for empty identifiers and I/O errors.
    pub fn read_account(
        &self,
        home_account_id: &str,
        environment: &str,
        realm: &str,
    ) -> StorageResult<Option<Account>> {
        self.read_record(&account_path(home_account_id, environment, realm)?)
    }

    /// Reads every account realm of one user in one environment.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for empty identifiers and I/O errors.
    pub fn read_accounts(
        &self,
        home_account_id: &str,
        environment: &str,
    ) -> StorageResult<Vec<Account>> {
        self.read_records(&accounts_dir(home_account_id, environment)?)
    }

    /// Reads every account in the store.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from the backend.
    pub fn read_all_accounts(&self) -> StorageResult<Vec<Account>> {
        let mut accounts = Vec::new();
        for path in self.backend.list(&user_data_root())? {
            if is_account_path(&path) {
                accounts.extend(self.read_record::<Account>(&path)?);
            }
        }
        Ok(accounts)
    }

    /// Merges `account` onto the stored record of its realm.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for empty identifiers and I/O or keystore
    /// errors.
    pub fn write_account(&self, account: &Account) -> StorageResult<()> {
        let path = account_path(
            &account.home_account_id,
            &account.environment,
            &account.realm,
        )?;
        self.merge_record(&path, account)?;
        tracing::debug!(%path, "wrote account");
        Ok(())
    }

    /// Deletes the account record of one realm.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for empty identifiers and I/O errors.
    pub fn delete_account(
        &self,
        home_account_id: &str,
        environment: &str,
        realm: &str,
    ) -> StorageResult<()> {
        self.backend
            .delete_file(&account_path(home_account_id, environment, realm)?)
    }

    /// Deletes every account and credential of one user in one environment.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for empty identifiers and I/O errors.
    pub fn delete_accounts(&self, home_account_id: &str, environment: &str) -> StorageResult<()> {
        let prefix = user_environment_dir(home_account_id, environment)?;
        self.backend.delete_content(&prefix)?;
        tracing::debug!(%prefix, "purged user data");
        Ok(())
    }

    // ── app metadata ────────────────────────────────────────────────────

    /// Reads the metadata of a client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for empty identifiers and I/O errors.
    pub fn read_app_metadata(
        &self,
        environment: &str,
        client_id: &str,
    ) -> StorageResult<Option<AppMetadata>> {
        self.read_record(&app_metadata_path(environment, client_id)?)
    }

    /// Merges `metadata` onto the stored record of its client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for empty identifiers and I/O or keystore
    /// errors.
    pub fn write_app_metadata(&self, metadata: &AppMetadata) -> StorageResult<()> {
        let path = app_metadata_path(&metadata.environment, &metadata.client_id)?;
        self.merge_record(&path, metadata)
    }

    /// Deletes the metadata of a client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for empty identifiers and I/O errors.
    pub fn delete_app_metadata(&self, environment: &str, client_id: &str) -> StorageResult<()> {
        self.backend
            .delete_file(&app_metadata_path(environment, client_id)?)
    }

    // ── shared helpers ──────────────────────────────────────────────────

    fn read_record<T: DeserializeOwned>(&self, path: &RecordPath) -> StorageResult<Option<T>> {
        Ok(self
            .backend
            .read(path)?
            .and_then(|bytes| open_record(self.keystore.as_ref(), path, &bytes)))
    }

    fn read_records<T: DeserializeOwned>(&self, prefix: &RecordPath) -> StorageResult<Vec<T>> {
        let mut records = Vec::new();
        for path in self.backend.list(prefix)? {
            records.extend(self.read_record::<T>(&path)?);
        }
        Ok(records)
    }

    fn merge_record<T>(&self, path: &RecordPath, record: &T) -> StorageResult<()>
    where
        T: Merge + Serialize + DeserializeOwned + Clone,
    {
        let keystore = self.keystore.as_ref();
        self.backend.read_modify_write(path, &mut |current| {
            let merged = match current.and_then(|bytes| open_record::<T>(keystore, path, &bytes)) {
                Some(mut stored) => {
                    stored.merge_from(record.clone());
                    stored
                }
                None => record.clone(),
            };
            Ok(Mutation::Write(seal_record(keystore, path, &merged)?))
        })
    }
}
