//! Common test utilities shared across integration tests.

#![allow(missing_docs)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use tokencache_core::storage::{
    DeviceKeystore, FileBackend, LegacyCacheManager, LegacyQuery, StorageBackend,
    StorageConfig, StorageManager, StoragePaths, StorageProvider, XChaChaKeystore,
};
use tokencache_core::{Account, Credential, CredentialType, StorageResult};

pub const HOME: &str = "uid.utid";
pub const ENV: &str = "login.example.com";
pub const REALM: &str = "tenant";
pub const CLIENT: &str = "client";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// File-backed provider with a random encryption key.
pub struct FileStorageProvider {
    keystore: Arc<XChaChaKeystore>,
    backend: Arc<FileBackend>,
}

impl FileStorageProvider {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            keystore: Arc::new(XChaChaKeystore::generate()),
            backend: Arc::new(
                FileBackend::new(StoragePaths::new(root)).expect("create file backend"),
            ),
        }
    }

    pub fn file_backend(&self) -> &FileBackend {
        &self.backend
    }
}

impl StorageProvider for FileStorageProvider {
    fn keystore(&self) -> Arc<dyn DeviceKeystore> {
        self.keystore.clone()
    }

    fn backend(&self) -> Arc<dyn StorageBackend> {
        self.backend.clone()
    }
}

pub fn file_manager(root: &Path, config: StorageConfig) -> (FileStorageProvider, StorageManager) {
    let provider = FileStorageProvider::new(root);
    let manager = StorageManager::from_provider(&provider, config);
    (provider, manager)
}

#[derive(Default)]
pub struct InMemoryLegacyCache {
    accounts: Mutex<Vec<Account>>,
    refresh_tokens: Mutex<Vec<Credential>>,
}

impl InMemoryLegacyCache {
    pub fn with_account(self, account: Account) -> Self {
        self.accounts.lock().expect("lock").push(account);
        self
    }

    pub fn with_refresh_token(self, credential: Credential) -> Self {
        self.refresh_tokens.lock().expect("lock").push(credential);
        self
    }

    pub fn refresh_token_secrets(&self) -> Vec<String> {
        self.refresh_tokens
            .lock()
            .expect("lock")
            .iter()
            .map(|credential| credential.secret.clone())
            .collect()
    }
}

impl LegacyCacheManager for InMemoryLegacyCache {
    fn get_all_legacy_accounts(&self, _correlation_id: &str) -> StorageResult<Vec<Account>> {
        Ok(self.accounts.lock().expect("lock").clone())
    }

    fn get_legacy_refresh_token(
        &self,
        _correlation_id: &str,
        query: &LegacyQuery,
    ) -> StorageResult<Option<Credential>> {
        Ok(self
            .refresh_tokens
            .lock()
            .expect("lock")
            .iter()
            .find(|rt| {
                rt.home_account_id == query.home_account_id
                    && rt.environment == query.environment
                    && (rt.client_id == query.client_id
                        || (!query.family_id.is_empty() && rt.family_id == query.family_id))
            })
            .cloned())
    }

    fn write_legacy_refresh_token(
        &self,
        _correlation_id: &str,
        credential: &Credential,
    ) -> StorageResult<()> {
        self.refresh_tokens
            .lock()
            .expect("lock")
            .push(credential.clone());
        Ok(())
    }

    fn remove_legacy_account(
        &self,
        _correlation_id: &str,
        query: &LegacyQuery,
    ) -> StorageResult<()> {
        self.refresh_tokens
            .lock()
            .expect("lock")
            .retain(|rt| rt.home_account_id != query.home_account_id);
        self.accounts
            .lock()
            .expect("lock")
            .retain(|account| account.home_account_id != query.home_account_id);
        Ok(())
    }
}

pub fn access_token(target: &str, secret: &str) -> Credential {
    Credential::new(CredentialType::AccessToken, HOME, ENV, CLIENT, secret)
        .with_realm(REALM)
        .with_target(target)
}
