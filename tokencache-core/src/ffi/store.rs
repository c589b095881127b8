//! The token cache store exported to Swift and Kotlin.

use std::path::Path;
use std::sync::Arc;

use super::error::CacheError;
use super::types::{
    CacheAccount, CacheAccountResult, CacheAccountsResult, CacheAppMetadata,
    CacheAppMetadataResult, CacheCredential, CacheCredentialQuery, CacheCredentialsResult,
    CacheLegacyQuery, CacheStatus,
};
use crate::error::{StorageError, StorageResult};
use crate::storage::{
    DeviceKeystore, FileBackend, LegacyCacheManager, LegacyFallbackPolicy, LegacyQuery,
    PlaintextKeystore, StorageConfig, StorageManager, StoragePaths, StorageWorker,
};
use crate::types::{Account, AppMetadata, Credential};

// =============================================================================
// Foreign collaborators
// =============================================================================

/// Host keystore that encrypts records at rest.
///
/// `associated_data` is the record's relative path; a ciphertext must only
/// open with the associated data it was sealed with.
#[uniffi::export(with_foreign)]
pub trait Keystore: Send + Sync {
    /// Encrypts `plaintext`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unavailable.
    fn seal(&self, associated_data: Vec<u8>, plaintext: Vec<u8>) -> Result<Vec<u8>, CacheError>;

    /// Decrypts `ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ciphertext does not authenticate.
    fn open_sealed(
        &self,
        associated_data: Vec<u8>,
        ciphertext: Vec<u8>,
    ) -> Result<Vec<u8>, CacheError>;
}

/// Host implementation of the legacy cache.
#[uniffi::export(with_foreign)]
pub trait LegacyCache: Send + Sync {
    /// Returns every legacy account.
    ///
    /// # Errors
    ///
    /// Returns an error if the legacy cache cannot be read.
    fn get_all_legacy_accounts(&self, correlation_id: String)
        -> Result<Vec<CacheAccount>, CacheError>;

    /// Returns the refresh token matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the legacy cache cannot be read.
    fn get_legacy_refresh_token(
        &self,
        correlation_id: String,
        query: CacheLegacyQuery,
    ) -> Result<Option<CacheCredential>, CacheError>;

    /// Stores a refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the legacy cache cannot be written.
    fn write_legacy_refresh_token(
        &self,
        correlation_id: String,
        credential: CacheCredential,
    ) -> Result<(), CacheError>;

    /// Removes a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the legacy cache cannot be written.
    fn remove_legacy_account(
        &self,
        correlation_id: String,
        query: CacheLegacyQuery,
    ) -> Result<(), CacheError>;
}

struct ForeignKeystore(Arc<dyn Keystore>);

impl DeviceKeystore for ForeignKeystore {
    fn seal(&self, associated_data: &[u8], plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        self.0
            .seal(associated_data.to_vec(), plaintext.to_vec())
            .map_err(CacheError::into_keystore_error)
    }

    fn open_sealed(&self, associated_data: &[u8], ciphertext: &[u8]) -> StorageResult<Vec<u8>> {
        self.0
            .open_sealed(associated_data.to_vec(), ciphertext.to_vec())
            .map_err(CacheError::into_keystore_error)
    }
}

struct ForeignLegacyCache(Arc<dyn LegacyCache>);

fn legacy_record<F, T>(record: F) -> StorageResult<T>
where
    T: TryFrom<F, Error = CacheError>,
{
    T::try_from(record).map_err(|err| StorageError::Legacy(err.to_string()))
}

impl LegacyCacheManager for ForeignLegacyCache {
    fn get_all_legacy_accounts(&self, correlation_id: &str) -> StorageResult<Vec<Account>> {
        self.0
            .get_all_legacy_accounts(correlation_id.to_string())
            .map_err(CacheError::into_legacy_error)?
            .into_iter()
            .map(legacy_record)
            .collect()
    }

    fn get_legacy_refresh_token(
        &self,
        correlation_id: &str,
        query: &LegacyQuery,
    ) -> StorageResult<Option<Credential>> {
        self.0
            .get_legacy_refresh_token(correlation_id.to_string(), query.into())
            .map_err(CacheError::into_legacy_error)?
            .map(legacy_record)
            .transpose()
    }

    fn write_legacy_refresh_token(
        &self,
        correlation_id: &str,
        credential: &Credential,
    ) -> StorageResult<()> {
        self.0
            .write_legacy_refresh_token(correlation_id.to_string(), credential.clone().into())
            .map_err(CacheError::into_legacy_error)
    }

    fn remove_legacy_account(
        &self,
        correlation_id: &str,
        query: &LegacyQuery,
    ) -> StorageResult<()> {
        self.0
            .remove_legacy_account(correlation_id.to_string(), query.into())
            .map_err(CacheError::into_legacy_error)
    }
}

// =============================================================================
// Store
// =============================================================================

/// Token cache rooted in a directory on the device.
///
/// # Example (Swift)
///
/// ```swift
/// let store = try TokenCacheStore(
///     rootPath: appSupportPath,
///     keystore: KeychainKeystore(),
///     legacyCache: nil,
///     legacyFallback: .readFallback
/// )
/// let status = store.writeAccount(correlationId: cid, account: account)
/// ```
#[derive(uniffi::Object)]
pub struct TokenCacheStore {
    manager: StorageManager,
}

impl std::fmt::Debug for TokenCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCacheStore")
            .field("manager", &self.manager)
            .finish()
    }
}

#[uniffi::export]
impl TokenCacheStore {
    /// Opens (creating if needed) a store under `root_path/tokencache`.
    ///
    /// Without a keystore, records are stored unencrypted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    #[uniffi::constructor]
    pub fn new(
        root_path: String,
        keystore: Option<Arc<dyn Keystore>>,
        legacy_cache: Option<Arc<dyn LegacyCache>>,
        legacy_fallback: LegacyFallbackPolicy,
    ) -> Result<Arc<Self>, CacheError> {
        let backend = FileBackend::new(StoragePaths::new(Path::new(&root_path)))?;
        let keystore: Arc<dyn DeviceKeystore> = match keystore {
            Some(keystore) => Arc::new(ForeignKeystore(keystore)),
            None => Arc::new(PlaintextKeystore),
        };
        let mut manager = StorageManager::new(
            StorageWorker::new(Arc::new(backend), keystore),
            StorageConfig { legacy_fallback },
        );
        if let Some(legacy) = legacy_cache {
            manager = manager.with_legacy_cache(Arc::new(ForeignLegacyCache(legacy)));
        }
        tracing::info!(root = %root_path, ?legacy_fallback, "opened token cache store");
        Ok(Arc::new(Self { manager }))
    }

    /// Reads credentials.
    #[must_use]
    pub fn read_credentials(
        &self,
        correlation_id: String,
        query: CacheCredentialQuery,
    ) -> CacheCredentialsResult {
        self.manager
            .read_credentials(&correlation_id, &query.into())
            .into()
    }

    /// Writes credentials.
    #[must_use]
    pub fn write_credentials(
        &self,
        correlation_id: String,
        credentials: Vec<CacheCredential>,
    ) -> CacheStatus {
        match credentials
            .into_iter()
            .map(Credential::try_from)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(credentials) => self
                .manager
                .write_credentials(&correlation_id, &credentials)
                .into(),
            Err(err) => invalid_input(&err),
        }
    }

    /// Deletes credentials.
    #[must_use]
    pub fn delete_credentials(
        &self,
        correlation_id: String,
        query: CacheCredentialQuery,
    ) -> CacheStatus {
        self.manager
            .delete_credentials(&correlation_id, &query.into())
            .into()
    }

    /// Reads one account.
    #[must_use]
    pub fn read_account(
        &self,
        correlation_id: String,
        home_account_id: String,
        environment: String,
        realm: String,
    ) -> CacheAccountResult {
        self.manager
            .read_account(&correlation_id, &home_account_id, &environment, &realm)
            .into()
    }

    /// Reads every account of one user in one environment.
    #[must_use]
    pub fn read_accounts(
        &self,
        correlation_id: String,
        home_account_id: String,
        environment: String,
    ) -> CacheAccountsResult {
        self.manager
            .read_accounts(&correlation_id, &home_account_id, &environment)
            .into()
    }

    /// Reads every account.
    #[must_use]
    pub fn read_all_accounts(&self, correlation_id: String) -> CacheAccountsResult {
        self.manager.read_all_accounts(&correlation_id).into()
    }

    /// Merges an account onto its stored record.
    #[must_use]
    pub fn write_account(&self, correlation_id: String, account: CacheAccount) -> CacheStatus {
        match Account::try_from(account) {
            Ok(account) => self.manager.write_account(&correlation_id, &account).into(),
            Err(err) => invalid_input(&err),
        }
    }

    /// Deletes one account record.
    #[must_use]
    pub fn delete_account(
        &self,
        correlation_id: String,
        home_account_id: String,
        environment: String,
        realm: String,
    ) -> CacheStatus {
        self.manager
            .delete_account(&correlation_id, &home_account_id, &environment, &realm)
            .into()
    }

    /// Deletes every account and credential of one user in one environment.
    #[must_use]
    pub fn delete_accounts(
        &self,
        correlation_id: String,
        home_account_id: String,
        environment: String,
    ) -> CacheStatus {
        self.manager
            .delete_accounts(&correlation_id, &home_account_id, &environment)
            .into()
    }

    /// Reads app metadata.
    #[must_use]
    pub fn read_app_metadata(
        &self,
        correlation_id: String,
        environment: String,
        client_id: String,
    ) -> CacheAppMetadataResult {
        self.manager
            .read_app_metadata(&correlation_id, &environment, &client_id)
            .into()
    }

    /// Merges app metadata onto its stored record.
    #[must_use]
    pub fn write_app_metadata(
        &self,
        correlation_id: String,
        metadata: CacheAppMetadata,
    ) -> CacheStatus {
        match AppMetadata::try_from(metadata) {
            Ok(metadata) => self
                .manager
                .write_app_metadata(&correlation_id, &metadata)
                .into(),
            Err(err) => invalid_input(&err),
        }
    }

    /// Deletes app metadata.
    #[must_use]
    pub fn delete_app_metadata(
        &self,
        correlation_id: String,
        environment: String,
        client_id: String,
    ) -> CacheStatus {
        self.manager
            .delete_app_metadata(&correlation_id, &environment, &client_id)
            .into()
    }
}

fn invalid_input(err: &CacheError) -> CacheStatus {
    tracing::error!(error = %err, "rejected record from host");
    CacheStatus {
        success: false,
        code: crate::storage::StatusCode::InvalidArgument.code(),
        platform_code: 0,
        platform_domain: crate::storage::status::INTERNAL_DOMAIN.to_string(),
        description: err.to_string(),
    }
}
