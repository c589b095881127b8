//! Test helpers for the storage worker and manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Mutex};

use super::legacy::{LegacyCacheManager, LegacyQuery};
use super::traits::DeviceKeystore;
use crate::error::{StorageError, StorageResult};
use crate::types::{Account, Credential};

/// Legacy cache kept in memory, recording every call's correlation id.
#[derive(Default)]
pub struct InMemoryLegacyCache {
    accounts: Mutex<Vec<Account>>,
    refresh_tokens: Mutex<Vec<Credential>>,
    removed: Mutex<Vec<LegacyQuery>>,
    correlation_ids: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl InMemoryLegacyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, account: Account) -> Self {
        self.accounts.lock().expect("lock").push(account);
        self
    }

    pub fn with_refresh_token(self, credential: Credential) -> Self {
        self.refresh_tokens.lock().expect("lock").push(credential);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn refresh_tokens(&self) -> Vec<Credential> {
        self.refresh_tokens.lock().expect("lock").clone()
    }

    pub fn removed(&self) -> Vec<LegacyQuery> {
        self.removed.lock().expect("lock").clone()
    }

    pub fn correlation_ids(&self) -> Vec<String> {
        self.correlation_ids.lock().expect("lock").clone()
    }

    fn enter(&self, correlation_id: &str) -> StorageResult<()> {
        self.correlation_ids
            .lock()
            .expect("lock")
            .push(correlation_id.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Legacy("legacy cache unavailable".to_string()));
        }
        Ok(())
    }
}

impl LegacyCacheManager for InMemoryLegacyCache {
    fn get_all_legacy_accounts(&self, correlation_id: &str) -> StorageResult<Vec<Account>> {
        self.enter(correlation_id)?;
        Ok(self.accounts.lock().expect("lock").clone())
    }

    fn get_legacy_refresh_token(
        &self,
        correlation_id: &str,
        query: &LegacyQuery,
    ) -> StorageResult<Option<Credential>> {
        self.enter(correlation_id)?;
        Ok(self
            .refresh_tokens
            .lock()
            .expect("lock")
            .iter()
            .find(|rt| {
                rt.home_account_id == query.home_account_id
                    && rt.environment == query.environment
                    && ((!query.client_id.is_empty() && rt.client_id == query.client_id)
                        || (!query.family_id.is_empty() && rt.family_id == query.family_id))
            })
            .cloned())
    }

    fn write_legacy_refresh_token(
        &self,
        correlation_id: &str,
        credential: &Credential,
    ) -> StorageResult<()> {
        self.enter(correlation_id)?;
        self.refresh_tokens
            .lock()
            .expect("lock")
            .push(credential.clone());
        Ok(())
    }

    fn remove_legacy_account(
        &self,
        correlation_id: &str,
        query: &LegacyQuery,
    ) -> StorageResult<()> {
        self.enter(correlation_id)?;
        self.refresh_tokens.lock().expect("lock").retain(|rt| {
            rt.home_account_id != query.home_account_id || rt.environment != query.environment
        });
        self.accounts.lock().expect("lock").retain(|account| {
            account.home_account_id != query.home_account_id
                || account.environment != query.environment
        });
        self.removed.lock().expect("lock").push(query.clone());
        Ok(())
    }
}

/// Keystore that panics on every call.
pub struct PanickingKeystore;

impl DeviceKeystore for PanickingKeystore {
    fn seal(&self, _associated_data: &[u8], _plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        panic!("keystore exploded");
    }

    fn open_sealed(&self, _associated_data: &[u8], _ciphertext: &[u8]) -> StorageResult<Vec<u8>> {
        panic!("keystore exploded");
    }
}

/// Identity keystore whose next `open_sealed` call can be parked.
#[derive(Default)]
pub struct GatedKeystore {
    gate: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
}

impl GatedKeystore {
    /// Parks the next `open_sealed` call. Returns a receiver signalled once
    /// the call is parked and a sender that lets it continue.
    pub fn arm(&self) -> (mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock().expect("lock") = Some((entered_tx, release_rx));
        (entered_rx, release_tx)
    }
}

impl DeviceKeystore for GatedKeystore {
    fn seal(&self, _associated_data: &[u8], plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn open_sealed(&self, _associated_data: &[u8], ciphertext: &[u8]) -> StorageResult<Vec<u8>> {
        let gate = self.gate.lock().expect("lock").take();
        if let Some((entered, release)) = gate {
            entered.send(()).expect("signal entered");
            release.recv().expect("wait release");
        }
        Ok(ciphertext.to_vec())
    }
}
