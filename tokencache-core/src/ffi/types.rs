//! FFI-safe mirrors of the engine records.
//!
//! Fields the engine keeps in `additional_fields` cross the boundary as a
//! JSON object string, so hosts can round-trip data they do not model.

use serde_json::{Map, Value};

use super::error::CacheError;
use crate::storage::{
    CredentialQuery, LegacyQuery, OperationStatus, ReadAccountResponse, ReadAccountsResponse,
    ReadAppMetadataResponse, ReadCredentialsResponse, StatusCode,
};
use crate::types::{Account, AppMetadata, Credential, CredentialType};

fn fields_to_json(fields: &Map<String, Value>) -> Option<String> {
    if fields.is_empty() {
        None
    } else {
        Some(Value::Object(fields.clone()).to_string())
    }
}

fn fields_from_json(json: Option<&str>) -> Result<Map<String, Value>, CacheError> {
    let Some(json) = json.filter(|json| !json.trim().is_empty()) else {
        return Ok(Map::new());
    };
    match serde_json::from_str(json) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(CacheError::InvalidInput {
            parameter: "additional_fields_json".to_string(),
            message: "expected a JSON object".to_string(),
        }),
        Err(err) => Err(CacheError::InvalidInput {
            parameter: "additional_fields_json".to_string(),
            message: err.to_string(),
        }),
    }
}

// =============================================================================
// Records
// =============================================================================

/// A credential as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CacheCredential {
    /// Home account id of the user.
    pub home_account_id: String,
    /// Authority host.
    pub environment: String,
    /// Tenant.
    pub realm: String,
    /// Client id.
    pub client_id: String,
    /// Family id.
    pub family_id: String,
    /// Space-delimited scopes.
    pub target: String,
    /// Kind of credential.
    pub credential_type: CredentialType,
    /// The token value.
    pub secret: String,
    /// Epoch seconds.
    pub cached_at: Option<u64>,
    /// Epoch seconds.
    pub expires_on: Option<u64>,
    /// Epoch seconds.
    pub extended_expires_on: Option<u64>,
    /// Epoch seconds.
    pub refresh_on: Option<u64>,
    /// Unmodelled fields as a JSON object.
    pub additional_fields_json: Option<String>,
}

impl From<Credential> for CacheCredential {
    fn from(credential: Credential) -> Self {
        Self {
            additional_fields_json: fields_to_json(&credential.additional_fields),
            home_account_id: credential.home_account_id,
            environment: credential.environment,
            realm: credential.realm,
            client_id: credential.client_id,
            family_id: credential.family_id,
            target: credential.target,
            credential_type: credential.credential_type,
            secret: credential.secret,
            cached_at: credential.cached_at,
            expires_on: credential.expires_on,
            extended_expires_on: credential.extended_expires_on,
            refresh_on: credential.refresh_on,
        }
    }
}

impl TryFrom<CacheCredential> for Credential {
    type Error = CacheError;

    fn try_from(credential: CacheCredential) -> Result<Self, Self::Error> {
        Ok(Self {
            additional_fields: fields_from_json(credential.additional_fields_json.as_deref())?,
            home_account_id: credential.home_account_id,
            environment: credential.environment,
            realm: credential.realm,
            client_id: credential.client_id,
            family_id: credential.family_id,
            target: credential.target,
            credential_type: credential.credential_type,
            secret: credential.secret,
            cached_at: credential.cached_at,
            expires_on: credential.expires_on,
            extended_expires_on: credential.extended_expires_on,
            refresh_on: credential.refresh_on,
        })
    }
}

/// An account as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CacheAccount {
    /// Home account id of the user.
    pub home_account_id: String,
    /// Authority host.
    pub environment: String,
    /// Tenant.
    pub realm: String,
    /// Object id in `realm`.
    pub local_account_id: Option<String>,
    /// Sign-in name.
    pub username: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Given name.
    pub given_name: Option<String>,
    /// Family name.
    pub family_name: Option<String>,
    /// Middle name.
    pub middle_name: Option<String>,
    /// Authority flavour.
    pub authority_type: Option<String>,
    /// Raw client info.
    pub client_info: Option<String>,
    /// Identifier assigned by a legacy cache.
    pub alternative_account_id: Option<String>,
    /// Epoch seconds.
    pub last_modification_time: Option<u64>,
    /// Unmodelled fields as a JSON object.
    pub additional_fields_json: Option<String>,
}

impl From<Account> for CacheAccount {
    fn from(account: Account) -> Self {
        Self {
            additional_fields_json: fields_to_json(&account.additional_fields),
            home_account_id: account.home_account_id,
            environment: account.environment,
            realm: account.realm,
            local_account_id: account.local_account_id,
            username: account.username,
            name: account.name,
            given_name: account.given_name,
            family_name: account.family_name,
            middle_name: account.middle_name,
            authority_type: account.authority_type,
            client_info: account.client_info,
            alternative_account_id: account.alternative_account_id,
            last_modification_time: account.last_modification_time,
        }
    }
}

impl TryFrom<CacheAccount> for Account {
    type Error = CacheError;

    fn try_from(account: CacheAccount) -> Result<Self, Self::Error> {
        Ok(Self {
            additional_fields: fields_from_json(account.additional_fields_json.as_deref())?,
            home_account_id: account.home_account_id,
            environment: account.environment,
            realm: account.realm,
            local_account_id: account.local_account_id,
            username: account.username,
            name: account.name,
            given_name: account.given_name,
            family_name: account.family_name,
            middle_name: account.middle_name,
            authority_type: account.authority_type,
            client_info: account.client_info,
            alternative_account_id: account.alternative_account_id,
            last_modification_time: account.last_modification_time,
        })
    }
}

/// App metadata as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CacheAppMetadata {
    /// Authority host.
    pub environment: String,
    /// Client id.
    pub client_id: String,
    /// Family the client belongs to.
    pub family_id: Option<String>,
    /// Unmodelled fields as a JSON object.
    pub additional_fields_json: Option<String>,
}

impl From<AppMetadata> for CacheAppMetadata {
    fn from(metadata: AppMetadata) -> Self {
        Self {
            additional_fields_json: fields_to_json(&metadata.additional_fields),
            environment: metadata.environment,
            client_id: metadata.client_id,
            family_id: metadata.family_id,
        }
    }
}

impl TryFrom<CacheAppMetadata> for AppMetadata {
    type Error = CacheError;

    fn try_from(metadata: CacheAppMetadata) -> Result<Self, Self::Error> {
        Ok(Self {
            additional_fields: fields_from_json(metadata.additional_fields_json.as_deref())?,
            environment: metadata.environment,
            client_id: metadata.client_id,
            family_id: metadata.family_id,
        })
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Selects credentials for reads and deletes.
#[derive(Debug, Clone, Default, PartialEq, Eq, uniffi::Record)]
pub struct CacheCredentialQuery {
    /// Home account id of the user.
    pub home_account_id: String,
    /// Authority host.
    pub environment: String,
    /// Tenant.
    pub realm: String,
    /// Client id.
    pub client_id: String,
    /// Family id.
    pub family_id: String,
    /// Requested scopes.
    pub target: String,
    /// Credential kinds to visit.
    pub types: Vec<CredentialType>,
}

impl From<CacheCredentialQuery> for CredentialQuery {
    fn from(query: CacheCredentialQuery) -> Self {
        Self::new(query.home_account_id, query.environment)
            .with_realm(query.realm)
            .with_client_id(query.client_id)
            .with_family_id(query.family_id)
            .with_target(query.target)
            .with_types(query.types)
    }
}

/// Identifies a user in the legacy cache.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CacheLegacyQuery {
    /// Home account id of the user.
    pub home_account_id: String,
    /// Authority host.
    pub environment: String,
    /// Client id, possibly empty.
    pub client_id: String,
    /// Family id, possibly empty.
    pub family_id: String,
}

impl From<&LegacyQuery> for CacheLegacyQuery {
    fn from(query: &LegacyQuery) -> Self {
        Self {
            home_account_id: query.home_account_id.clone(),
            environment: query.environment.clone(),
            client_id: query.client_id.clone(),
            family_id: query.family_id.clone(),
        }
    }
}

// =============================================================================
// Statuses
// =============================================================================

/// Outcome of a store operation.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CacheStatus {
    /// `true` if the operation completed.
    pub success: bool,
    /// Stable numeric status code; `0` on success.
    pub code: i32,
    /// Platform error number, `0` when there is none.
    pub platform_code: i64,
    /// Namespace of `platform_code`.
    pub platform_domain: String,
    /// Human-readable description; empty on success.
    pub description: String,
}

impl From<OperationStatus> for CacheStatus {
    fn from(status: OperationStatus) -> Self {
        match status {
            OperationStatus::Success => Self {
                success: true,
                code: StatusCode::Success.code(),
                platform_code: 0,
                platform_domain: String::new(),
                description: String::new(),
            },
            OperationStatus::Failure(failure) => Self {
                success: false,
                code: failure.code.code(),
                platform_code: failure.platform_code,
                platform_domain: failure.platform_domain,
                description: failure.description,
            },
        }
    }
}

/// Result of a credential read.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CacheCredentialsResult {
    /// Outcome of the read.
    pub status: CacheStatus,
    /// Credentials found.
    pub credentials: Vec<CacheCredential>,
}

impl From<ReadCredentialsResponse> for CacheCredentialsResult {
    fn from(response: ReadCredentialsResponse) -> Self {
        Self {
            status: response.status.into(),
            credentials: response.credentials.into_iter().map(Into::into).collect(),
        }
    }
}

/// Result of a single-account read.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CacheAccountResult {
    /// Outcome of the read.
    pub status: CacheStatus,
    /// The account, if found.
    pub account: Option<CacheAccount>,
}

impl From<ReadAccountResponse> for CacheAccountResult {
    fn from(response: ReadAccountResponse) -> Self {
        Self {
            status: response.status.into(),
            account: response.account.map(Into::into),
        }
    }
}

/// Result of an account enumeration.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CacheAccountsResult {
    /// Outcome of the read.
    pub status: CacheStatus,
    /// Accounts found.
    pub accounts: Vec<CacheAccount>,
}

impl From<ReadAccountsResponse> for CacheAccountsResult {
    fn from(response: ReadAccountsResponse) -> Self {
        Self {
            status: response.status.into(),
            accounts: response.accounts.into_iter().map(Into::into).collect(),
        }
    }
}

/// Result of an app-metadata read.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CacheAppMetadataResult {
    /// Outcome of the read.
    pub status: CacheStatus,
    /// The metadata, if found.
    pub app_metadata: Option<CacheAppMetadata>,
}

impl From<ReadAppMetadataResponse> for CacheAppMetadataResult {
    fn from(response: ReadAppMetadataResponse) -> Self {
        Self {
            status: response.status.into(),
            app_metadata: response.app_metadata.map(Into::into),
        }
    }
}
