//! Structured statuses returned by the storage manager.
//!
//! The manager never returns `Err` or unwinds; every outcome is expressed as
//! an [`OperationStatus`] so hosts on the other side of an FFI boundary can
//! inspect failures uniformly.

use std::fmt;

use crate::error::StorageError;
use crate::types::{Account, AppMetadata, Credential};

/// Domain for raw OS error numbers.
pub const ERRNO_DOMAIN: &str = "errno";
/// Domain for failures raised by the device keystore.
pub const KEYSTORE_DOMAIN: &str = "keystore";
/// Domain for failures raised by the legacy cache.
pub const LEGACY_DOMAIN: &str = "legacy";
/// Domain for failures raised inside this crate.
pub const INTERNAL_DOMAIN: &str = "tokencache";

/// Failure category with a stable numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    /// The operation completed.
    Success = 0,
    /// The caller passed an impossible combination of arguments.
    InvalidArgument = 1,
    /// The backend failed.
    StorageIo = 2,
    /// The keystore failed to seal a record.
    Keystore = 3,
    /// A record could not be serialized.
    Serialization = 4,
    /// A per-path lock could not be acquired.
    Lock = 5,
    /// The legacy cache failed.
    Legacy = 6,
    /// A collaborator panicked or an unexpected internal state was reached.
    Unexpected = 7,
}

impl StatusCode {
    /// Returns the stable numeric value.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::InvalidArgument => "invalid_argument",
            Self::StorageIo => "storage_io",
            Self::Keystore => "keystore",
            Self::Serialization => "serialization",
            Self::Lock => "lock",
            Self::Legacy => "legacy",
            Self::Unexpected => "unexpected",
        };
        f.write_str(name)
    }
}

/// Details of a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageFailure {
    /// Failure category.
    pub code: StatusCode,
    /// Platform-specific error number, `0` when there is none.
    pub platform_code: i64,
    /// Namespace of `platform_code`.
    pub platform_domain: String,
    /// Human-readable description.
    pub description: String,
}

impl StorageFailure {
    /// Creates a failure without a platform code.
    pub fn new(code: StatusCode, description: impl Into<String>) -> Self {
        Self {
            code,
            platform_code: 0,
            platform_domain: INTERNAL_DOMAIN.to_string(),
            description: description.into(),
        }
    }

    /// Creates the failure reported for a caught panic.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self::new(StatusCode::Unexpected, format!("panic: {message}"))
    }
}

impl fmt::Display for StorageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {} [{}:{}]",
            self.code,
            self.code.code(),
            self.description,
            self.platform_domain,
            self.platform_code
        )
    }
}

impl From<&StorageError> for StorageFailure {
    fn from(err: &StorageError) -> Self {
        let description = err.to_string();
        match err {
            StorageError::InvalidArgument { .. } => {
                Self::new(StatusCode::InvalidArgument, description)
            }
            StorageError::Io { source, .. } => match source.raw_os_error() {
                Some(errno) => Self {
                    code: StatusCode::StorageIo,
                    platform_code: i64::from(errno),
                    platform_domain: ERRNO_DOMAIN.to_string(),
                    description,
                },
                None => Self::new(StatusCode::StorageIo, description),
            },
            StorageError::Keystore(_) => Self {
                platform_domain: KEYSTORE_DOMAIN.to_string(),
                ..Self::new(StatusCode::Keystore, description)
            },
            StorageError::Serialization(_) => Self::new(StatusCode::Serialization, description),
            StorageError::Lock(_) => Self::new(StatusCode::Lock, description),
            StorageError::Legacy(_) => Self {
                platform_domain: LEGACY_DOMAIN.to_string(),
                ..Self::new(StatusCode::Legacy, description)
            },
            // Absorbed by the worker; reaching the façade is a defect.
            StorageError::Malformed { .. } => Self::new(StatusCode::Unexpected, description),
        }
    }
}

impl From<StorageError> for StorageFailure {
    fn from(err: StorageError) -> Self {
        Self::from(&err)
    }
}

/// Outcome of a façade operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    /// The operation completed.
    Success,
    /// The operation failed.
    Failure(StorageFailure),
}

impl OperationStatus {
    /// Returns `true` on success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns the status code.
    #[must_use]
    pub const fn code(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::Success,
            Self::Failure(failure) => failure.code,
        }
    }

    /// Returns the failure details, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&StorageFailure> {
        match self {
            Self::Success => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    /// Converts into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the failure details if the operation failed.
    pub fn into_result(self) -> Result<(), StorageFailure> {
        match self {
            Self::Success => Ok(()),
            Self::Failure(failure) => Err(failure),
        }
    }
}

impl From<Result<(), StorageFailure>> for OperationStatus {
    fn from(result: Result<(), StorageFailure>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(failure) => Self::Failure(failure),
        }
    }
}

/// Result of [`StorageManager::read_credentials`](super::StorageManager::read_credentials).
#[derive(Debug, Clone, PartialEq)]
pub struct ReadCredentialsResponse {
    /// Outcome of the read.
    pub status: OperationStatus,
    /// Credentials found; empty on failure.
    pub credentials: Vec<Credential>,
}

/// Result of a single-account read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadAccountResponse {
    /// Outcome of the read.
    pub status: OperationStatus,
    /// The account, if found.
    pub account: Option<Account>,
}

/// Result of an account enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadAccountsResponse {
    /// Outcome of the read.
    pub status: OperationStatus,
    /// Accounts found; empty on failure.
    pub accounts: Vec<Account>,
}

/// Result of an app-metadata read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadAppMetadataResponse {
    /// Outcome of the read.
    pub status: OperationStatus,
    /// The metadata, if found.
    pub app_metadata: Option<AppMetadata>,
}

/// Splits a façade result into a status and a value, substituting the
/// default value on failure.
pub(crate) fn split<T: Default>(result: Result<T, StorageFailure>) -> (OperationStatus, T) {
    match result {
        Ok(value) => (OperationStatus::Success, value),
        Err(failure) => (OperationStatus::Failure(failure), T::default()),
    }
}
