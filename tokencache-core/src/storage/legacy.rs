//! Contract for the legacy cache consulted during migration.
//!
//! The legacy format is owned by the host; this crate only calls into it on a
//! unified-cache miss or, when configured, to mirror writes.

use crate::error::StorageResult;
use crate::types::{Account, Credential};

/// Identifies a user (and optionally a client) in the legacy cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyQuery {
    /// Home account id of the user.
    pub home_account_id: String,
    /// Authority host.
    pub environment: String,
    /// Client id; empty when the query spans every client.
    pub client_id: String,
    /// Family id; empty when no family applies.
    pub family_id: String,
}

impl LegacyQuery {
    /// Creates a query for one user in one environment.
    pub fn new(home_account_id: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            home_account_id: home_account_id.into(),
            environment: environment.into(),
            ..Self::default()
        }
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
}

/// Legacy cache collaborator.
///
/// Implementations may be foreign (see the `ffi` feature). Errors should be
/// reported as [`StorageError::Legacy`](crate::error::StorageError::Legacy).
pub trait LegacyCacheManager: Send + Sync {
    /// Returns every account known to the legacy cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the legacy cache cannot be read.
    fn get_all_legacy_accounts(&self, correlation_id: &str) -> StorageResult<Vec<Account>>;

    /// Returns the refresh token matching `query`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the legacy cache cannot be read.
    fn get_legacy_refresh_token(
        &self,
        correlation_id: &str,
        query: &LegacyQuery,
    ) -> StorageResult<Option<Credential>>;

    /// Mirrors a refresh token into the legacy cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the legacy cache cannot be written.
    fn write_legacy_refresh_token(
        &self,
        correlation_id: &str,
        credential: &Credential,
    ) -> StorageResult<()>;

    /// Removes a user's records from the legacy cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the legacy cache cannot be written.
    fn remove_legacy_account(&self, correlation_id: &str, query: &LegacyQuery)
        -> StorageResult<()>;
}
