//! Storage manager: the exception-free façade over [`StorageWorker`].
//!
//! Every call takes a correlation id, runs inside a `tracing` span carrying
//! it, and returns a structured status instead of an error. Panics raised by
//! collaborators are caught and reported as
//! [`StatusCode::Unexpected`](super::status::StatusCode::Unexpected).
//!
//! The manager is also where the legacy cache is consulted. Legacy failures
//! are logged and never change the status of the unified operation.

use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::config::StorageConfig;
use super::legacy::{LegacyCacheManager, LegacyQuery};
use super::status::{
    split, OperationStatus, ReadAccountResponse, ReadAccountsResponse, ReadAppMetadataResponse,
    ReadCredentialsResponse, StorageFailure,
};
use super::traits::StorageProvider;
use super::worker::{CredentialQuery, StorageWorker};
use crate::error::StorageResult;
use crate::types::{Account, AppMetadata, Credential, CredentialType};

/// Façade over the storage worker and the optional legacy cache.
pub struct StorageManager {
    worker: StorageWorker,
    legacy: Option<Arc<dyn LegacyCacheManager>>,
    config: StorageConfig,
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("worker", &self.worker)
            .field("legacy", &self.legacy.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl StorageManager {
    /// Creates a manager without a legacy cache.
    #[must_use]
    pub const fn new(worker: StorageWorker, config: StorageConfig) -> Self {
        Self {
            worker,
            legacy: None,
            config,
        }
    }

    /// Creates a manager from a platform provider.
    #[must_use]
    pub fn from_provider(provider: &dyn StorageProvider, config: StorageConfig) -> Self {
        Self::new(StorageWorker::from_provider(provider), config)
    }

    /// Attaches a legacy cache.
    #[must_use]
    pub fn with_legacy_cache(mut self, legacy: Arc<dyn LegacyCacheManager>) -> Self {
        self.legacy = Some(legacy);
        self
    }

    /// Returns the underlying worker.
    #[must_use]
    pub const fn worker(&self) -> &StorageWorker {
        &self.worker
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    // ── credentials ─────────────────────────────────────────────────────

    /// Reads the credentials selected by `query`.
    ///
    /// When refresh tokens are requested and none is found, the legacy cache
    /// is asked for one unless legacy fallback is disabled.
    #[must_use]
    pub fn read_credentials(
        &self,
        correlation_id: &str,
        query: &CredentialQuery,
    ) -> ReadCredentialsResponse {
        let result = self.run("read_credentials", correlation_id, |correlation_id| {
            let mut credentials = self.worker.read_credentials(query)?;
            let wants_refresh_token = query.types.contains(&CredentialType::RefreshToken);
            let has_refresh_token = credentials
                .iter()
                .any(|credential| credential.credential_type == CredentialType::RefreshToken);
            if wants_refresh_token
                && !has_refresh_token
                && self.config.legacy_fallback.reads_legacy()
            {
                credentials.extend(self.legacy_refresh_token(correlation_id, query));
            }
            Ok(credentials)
        });
        let (status, credentials) = split(result);
        ReadCredentialsResponse {
            status,
            credentials,
        }
    }

    /// Writes credentials, mirroring refresh tokens to the legacy cache under
    /// write-through.
    #[must_use]
    pub fn write_credentials(
        &self,
        correlation_id: &str,
        credentials: &[Credential],
    ) -> OperationStatus {
        self.run("write_credentials", correlation_id, |correlation_id| {
            self.worker.write_credentials(credentials)?;
            if self.config.legacy_fallback.writes_legacy() {
                for credential in credentials
                    .iter()
                    .filter(|credential| credential.credential_type == CredentialType::RefreshToken)
                {
                    self.call_legacy("write_legacy_refresh_token", |legacy| {
                        legacy.write_legacy_refresh_token(correlation_id, credential)
                    });
                }
            }
            Ok(())
        })
        .into()
    }

    /// Deletes the credentials selected by `query`.
    #[must_use]
    pub fn delete_credentials(
        &self,
        correlation_id: &str,
        query: &CredentialQuery,
    ) -> OperationStatus {
        self.run("delete_credentials", correlation_id, |_| {
            self.worker.delete_credentials(query)
        })
        .into()
    }

    // ── accounts ────────────────────────────────────────────────────────

    /// Reads the account of one realm, falling back to the legacy cache on a
    /// miss.
    #[must_use]
    pub fn read_account(
        &self,
        correlation_id: &str,
        home_account_id: &str,
        environment: &str,
        realm: &str,
    ) -> ReadAccountResponse {
        let result = self.run("read_account", correlation_id, |correlation_id| {
            if let Some(account) = self.worker.read_account(home_account_id, environment, realm)? {
                return Ok(Some(account));
            }
            if !self.config.legacy_fallback.reads_legacy() {
                return Ok(None);
            }
            let wanted = Account::new(home_account_id, environment, realm);
            Ok(self
                .legacy_accounts(correlation_id)
                .into_iter()
                .find(|account| account.same_identity(&wanted)))
        });
        let (status, account) = split(result);
        ReadAccountResponse { status, account }
    }

    /// Reads every unified account realm of one user in one environment.
    #[must_use]
    pub fn read_accounts(
        &self,
        correlation_id: &str,
        home_account_id: &str,
        environment: &str,
    ) -> ReadAccountsResponse {
        let result = self.run("read_accounts", correlation_id, |_| {
            self.worker.read_accounts(home_account_id, environment)
        });
        let (status, accounts) = split(result);
        ReadAccountsResponse { status, accounts }
    }

    /// Reads every account, adding legacy accounts that have no unified
    /// counterpart.
    #[must_use]
    pub fn read_all_accounts(&self, correlation_id: &str) -> ReadAccountsResponse {
        let result = self.run("read_all_accounts", correlation_id, |correlation_id| {
            let mut accounts = self.worker.read_all_accounts()?;
            if self.config.legacy_fallback.reads_legacy() {
                let legacy_only: Vec<Account> = self
                    .legacy_accounts(correlation_id)
                    .into_iter()
                    .filter(|legacy| !accounts.iter().any(|unified| unified.same_identity(legacy)))
                    .collect();
                tracing::debug!(count = legacy_only.len(), "adding legacy-only accounts");
                accounts.extend(legacy_only);
            }
            Ok(accounts)
        });
        let (status, accounts) = split(result);
        ReadAccountsResponse { status, accounts }
    }

    /// Merges `account` onto its stored record.
    #[must_use]
    pub fn write_account(&self, correlation_id: &str, account: &Account) -> OperationStatus {
        self.run("write_account", correlation_id, |_| {
            self.worker.write_account(account)
        })
        .into()
    }

    /// Deletes the account record of one realm.
    #[must_use]
    pub fn delete_account(
        &self,
        correlation_id: &str,
        home_account_id: &str,
        environment: &str,
        realm: &str,
    ) -> OperationStatus {
        self.run("delete_account", correlation_id, |_| {
            self.worker
                .delete_account(home_account_id, environment, realm)
        })
        .into()
    }

    /// Deletes every account and credential of one user in one environment,
    /// removing the user from the legacy cache under write-through.
    #[must_use]
    pub fn delete_accounts(
        &self,
        correlation_id: &str,
        home_account_id: &str,
        environment: &str,
    ) -> OperationStatus {
        self.run("delete_accounts", correlation_id, |correlation_id| {
            self.worker.delete_accounts(home_account_id, environment)?;
            if self.config.legacy_fallback.writes_legacy() {
                let query = LegacyQuery::new(home_account_id, environment);
                self.call_legacy("remove_legacy_account", |legacy| {
                    legacy.remove_legacy_account(correlation_id, &query)
                });
            }
            Ok(())
        })
        .into()
    }

    // ── app metadata ────────────────────────────────────────────────────

    /// Reads the metadata of a client.
    #[must_use]
    pub fn read_app_metadata(
        &self,
        correlation_id: &str,
        environment: &str,
        client_id: &str,
    ) -> ReadAppMetadataResponse {
        let result = self.run("read_app_metadata", correlation_id, |_| {
            self.worker.read_app_metadata(environment, client_id)
        });
        let (status, app_metadata) = split(result);
        ReadAppMetadataResponse {
            status,
            app_metadata,
        }
    }

    /// Merges `metadata` onto its stored record.
    #[must_use]
    pub fn write_app_metadata(
        &self,
        correlation_id: &str,
        metadata: &AppMetadata,
    ) -> OperationStatus {
        self.run("write_app_metadata", correlation_id, |_| {
            self.worker.write_app_metadata(metadata)
        })
        .into()
    }

    /// Deletes the metadata of a client.
    #[must_use]
    pub fn delete_app_metadata(
        &self,
        correlation_id: &str,
        environment: &str,
        client_id: &str,
    ) -> OperationStatus {
        self.run("delete_app_metadata", correlation_id, |_| {
            self.worker.delete_app_metadata(environment, client_id)
        })
        .into()
    }

    // ── plumbing ────────────────────────────────────────────────────────

    fn run<T, F>(
        &self,
        operation: &'static str,
        correlation_id: &str,
        f: F,
    ) -> Result<T, StorageFailure>
    where
        F: FnOnce(&str) -> StorageResult<T>,
    {
        let correlation_id = correlation_id_or_new(correlation_id);
        let span = tracing::debug_span!("storage", operation, correlation_id = %correlation_id);
        let _entered = span.enter();

        let result = match panic::catch_unwind(AssertUnwindSafe(|| f(&correlation_id))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(StorageFailure::from(&err)),
            Err(payload) => Err(StorageFailure::from_panic(&*payload)),
        };
        match &result {
            Ok(_) => tracing::debug!("storage operation succeeded"),
            Err(failure) => {
                tracing::error!(code = failure.code.code(), %failure, "storage operation failed");
            }
        }
        result
    }

    /// Invokes the legacy cache, absorbing errors and panics.
    fn call_legacy<T, F>(&self, call: &'static str, f: F) -> Option<T>
    where
        F: FnOnce(&dyn LegacyCacheManager) -> StorageResult<T>,
    {
        let legacy = self.legacy.as_deref()?;
        let failure = match panic::catch_unwind(AssertUnwindSafe(|| f(legacy))) {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(err)) => StorageFailure::from(&err),
            Err(payload) => StorageFailure::from_panic(&*payload),
        };
        tracing::warn!(call, %failure, "legacy cache call failed; continuing without it");
        None
    }

    fn legacy_accounts(&self, correlation_id: &str) -> Vec<Account> {
        self.call_legacy("get_all_legacy_accounts", |legacy| {
            legacy.get_all_legacy_accounts(correlation_id)
        })
        .unwrap_or_default()
    }

    fn legacy_refresh_token(
        &self,
        correlation_id: &str,
        query: &CredentialQuery,
    ) -> Option<Credential> {
        let legacy_query = LegacyQuery::new(&query.home_account_id, &query.environment)
            .with_client_id(&query.client_id)
            .with_family_id(&query.family_id);
        let credential = self
            .call_legacy("get_legacy_refresh_token", |legacy| {
                legacy.get_legacy_refresh_token(correlation_id, &legacy_query)
            })
            .flatten()
            .filter(|credential| credential.credential_type == CredentialType::RefreshToken);
        if credential.is_some() {
            tracing::debug!("refresh token served from the legacy cache");
        }
        credential
    }
}

fn correlation_id_or_new(correlation_id: &str) -> Cow<'_, str> {
    if correlation_id.trim().is_empty() {
        Cow::Owned(uuid::Uuid::new_v4().to_string())
    } else {
        Cow::Borrowed(correlation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backend::MemoryBackend;
    use crate::storage::config::LegacyFallbackPolicy;
    use crate::storage::keystore::XChaChaKeystore;
    use crate::storage::status::StatusCode;
    use crate::storage::tests_utils::{InMemoryLegacyCache, PanickingKeystore};

    const CID: &str = "3c4e1f0a-test";
    const HOME: &str = "uid.utid";
    const ENV: &str = "login.example.com";
    const REALM: &str = "tenant";
    const CLIENT: &str = "client";

    fn manager(policy: LegacyFallbackPolicy, legacy: &Arc<InMemoryLegacyCache>) -> StorageManager {
        let worker = StorageWorker::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(XChaChaKeystore::generate()),
        );
        StorageManager::new(
            worker,
            StorageConfig {
                legacy_fallback: policy,
            },
        )
        .with_legacy_cache(legacy.clone())
    }

    fn rt_query() -> CredentialQuery {
        CredentialQuery::new(HOME, ENV)
            .with_client_id(CLIENT)
            .with_types([CredentialType::RefreshToken])
    }

    fn legacy_rt() -> Credential {
        Credential::new(CredentialType::RefreshToken, HOME, ENV, CLIENT, "legacy-rt")
    }

    #[test]
    fn test_invalid_argument_becomes_failure_status() {
        let legacy = Arc::new(InMemoryLegacyCache::new());
        let manager = manager(LegacyFallbackPolicy::Disabled, &legacy);
        let query = CredentialQuery::new(HOME, ENV)
            .with_realm(REALM)
            .with_client_id(CLIENT)
            .with_types([CredentialType::AccessToken]);

        let response = manager.read_credentials(CID, &query);
        assert_eq!(response.status.code(), StatusCode::InvalidArgument);
        assert!(response.credentials.is_empty());
        let failure = response.status.failure().expect("failure");
        assert!(failure.description.contains("target"));
    }

    #[test]
    fn test_keystore_panic_becomes_unexpected_status() {
        let worker =
            StorageWorker::new(Arc::new(MemoryBackend::new()), Arc::new(PanickingKeystore));
        let manager = StorageManager::new(worker, StorageConfig::default());

        let status = manager.write_account(CID, &Account::new(HOME, ENV, REALM));
        assert_eq!(status.code(), StatusCode::Unexpected);
        assert!(status
            .failure()
            .expect("failure")
            .description
            .contains("keystore exploded"));
    }

    #[test]
    fn test_empty_correlation_id_is_accepted() {
        let legacy = Arc::new(InMemoryLegacyCache::new());
        let manager = manager(LegacyFallbackPolicy::Disabled, &legacy);
        assert!(manager
            .write_account("", &Account::new(HOME, ENV, REALM))
            .is_success());
        assert!(correlation_id_or_new(" ").len() >= 32);
        assert_eq!(correlation_id_or_new("abc"), "abc");
    }

    #[test]
    fn test_refresh_token_falls_back_to_legacy() {
        let legacy = Arc::new(InMemoryLegacyCache::new().with_refresh_token(legacy_rt()));
        let manager = manager(LegacyFallbackPolicy::ReadFallback, &legacy);

        let response = manager.read_credentials(CID, &rt_query());
        assert!(response.status.is_success());
        assert_eq!(response.credentials.len(), 1);
        assert_eq!(response.credentials[0].secret, "legacy-rt");
        assert_eq!(legacy.correlation_ids(), vec![CID.to_string()]);
    }

    #[test]
    fn test_unified_refresh_token_wins_over_legacy() {
        let legacy = Arc::new(InMemoryLegacyCache::new().with_refresh_token(legacy_rt()));
        let manager = manager(LegacyFallbackPolicy::ReadFallback, &legacy);
        let unified = Credential::new(CredentialType::RefreshToken, HOME, ENV, CLIENT, "unified");
        assert!(manager.write_credentials(CID, &[unified]).is_success());

        let response = manager.read_credentials(CID, &rt_query());
        assert_eq!(response.credentials.len(), 1);
        assert_eq!(response.credentials[0].secret, "unified");
        assert!(legacy.correlation_ids().is_empty());
    }

    #[test]
    fn test_disabled_policy_never_consults_legacy() {
        let legacy = Arc::new(
            InMemoryLegacyCache::new()
                .with_refresh_token(legacy_rt())
                .with_account(Account::new(HOME, ENV, REALM)),
        );
        let manager = manager(LegacyFallbackPolicy::Disabled, &legacy);

        assert!(manager.read_credentials(CID, &rt_query()).credentials.is_empty());
        assert!(manager.read_account(CID, HOME, ENV, REALM).account.is_none());
        assert!(manager.read_all_accounts(CID).accounts.is_empty());
        assert!(legacy.correlation_ids().is_empty());
    }

    #[test]
    fn test_account_falls_back_to_legacy() {
        let mut legacy_account = Account::new("UID.UTID", ENV, REALM);
        legacy_account.username = Some("legacy@example.com".to_string());
        let legacy = Arc::new(InMemoryLegacyCache::new().with_account(legacy_account));
        let manager = manager(LegacyFallbackPolicy::ReadFallback, &legacy);

        let response = manager.read_account(CID, HOME, ENV, REALM);
        assert!(response.status.is_success());
        assert_eq!(
            response.account.expect("account").username.as_deref(),
            Some("legacy@example.com")
        );
        assert!(manager.read_account(CID, HOME, ENV, "other").account.is_none());
    }

    #[test]
    fn test_read_all_accounts_prefers_unified_entries() {
        let mut stale = Account::new(HOME, ENV, REALM);
        stale.username = Some("stale".to_string());
        let legacy = Arc::new(
            InMemoryLegacyCache::new()
                .with_account(stale)
                .with_account(Account::new("legacy.only", ENV, REALM)),
        );
        let manager = manager(LegacyFallbackPolicy::ReadFallback, &legacy);
        let mut fresh = Account::new(HOME, ENV, REALM);
        fresh.username = Some("fresh".to_string());
        assert!(manager.write_account(CID, &fresh).is_success());

        let accounts = manager.read_all_accounts(CID).accounts;
        assert_eq!(accounts.len(), 2);
        assert!(accounts
            .iter()
            .any(|account| account.username.as_deref() == Some("fresh")));
        assert!(accounts
            .iter()
            .any(|account| account.home_account_id == "legacy.only"));
    }

    #[test]
    fn test_legacy_failures_do_not_fail_reads() {
        let legacy = Arc::new(InMemoryLegacyCache::new().with_refresh_token(legacy_rt()));
        legacy.set_failing(true);
        let manager = manager(LegacyFallbackPolicy::ReadAndWriteThrough, &legacy);

        let response = manager.read_credentials(CID, &rt_query());
        assert!(response.status.is_success());
        assert!(response.credentials.is_empty());
        assert!(manager.read_all_accounts(CID).status.is_success());

        let rt = Credential::new(CredentialType::RefreshToken, HOME, ENV, CLIENT, "rt");
        assert!(manager.write_credentials(CID, &[rt]).is_success());
        assert!(manager.delete_accounts(CID, HOME, ENV).is_success());
    }

    #[test]
    fn test_write_through_mirrors_refresh_tokens_and_purges() {
        let legacy = Arc::new(InMemoryLegacyCache::new());
        let manager = manager(LegacyFallbackPolicy::ReadAndWriteThrough, &legacy);
        let rt = Credential::new(CredentialType::RefreshToken, HOME, ENV, CLIENT, "rt");
        let at = Credential::new(CredentialType::AccessToken, HOME, ENV, CLIENT, "at")
            .with_realm(REALM)
            .with_target("User.Read");
        assert!(manager.write_credentials(CID, &[rt, at]).is_success());

        let mirrored = legacy.refresh_tokens();
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0].secret, "rt");

        assert!(manager.delete_accounts(CID, HOME, ENV).is_success());
        assert_eq!(legacy.removed(), vec![LegacyQuery::new(HOME, ENV)]);
        assert!(legacy.refresh_tokens().is_empty());
    }

    #[test]
    fn test_read_fallback_does_not_write_through() {
        let legacy = Arc::new(InMemoryLegacyCache::new());
        let manager = manager(LegacyFallbackPolicy::ReadFallback, &legacy);
        let rt = Credential::new(CredentialType::RefreshToken, HOME, ENV, CLIENT, "rt");
        assert!(manager.write_credentials(CID, &[rt]).is_success());
        assert!(manager.delete_accounts(CID, HOME, ENV).is_success());

        assert!(legacy.refresh_tokens().is_empty());
        assert!(legacy.removed().is_empty());
    }

    #[test]
    fn test_app_metadata_through_facade() {
        let legacy = Arc::new(InMemoryLegacyCache::new());
        let manager = manager(LegacyFallbackPolicy::Disabled, &legacy);
        let mut metadata = AppMetadata::new(ENV, CLIENT);
        metadata.family_id = Some("1".to_string());

        assert!(manager.write_app_metadata(CID, &metadata).is_success());
        assert_eq!(
            manager.read_app_metadata(CID, ENV, CLIENT).app_metadata,
            Some(metadata)
        );
        assert!(manager.delete_app_metadata(CID, ENV, CLIENT).is_success());
        assert!(manager
            .read_app_metadata(CID, ENV, CLIENT)
            .app_metadata
            .is_none());

        let response = manager.read_app_metadata(CID, ENV, "");
        assert_eq!(response.status.code(), StatusCode::InvalidArgument);
    }
}
