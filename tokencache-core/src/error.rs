//! Error types for the token cache storage engine.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the storage engine below the façade.
///
/// `Malformed` is produced while opening stored records and is absorbed by the
/// storage worker; it never reaches a façade caller.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The caller passed an impossible combination of arguments.
    #[error("invalid argument '{parameter}': {reason}")]
    InvalidArgument {
        /// Name of the offending parameter.
        parameter: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Backend I/O failed (disk full, permission denied, store unavailable).
    #[error("storage I/O error during {context}: {source}")]
    Io {
        /// Operation that failed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Errors coming from the device keystore while sealing.
    #[error("keystore error: {0}")]
    Keystore(String),

    /// Serialization of a record failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A per-path lock could not be acquired.
    #[error("storage lock error: {0}")]
    Lock(String),

    /// Errors reported by the legacy cache collaborator.
    #[error("legacy cache error: {0}")]
    Legacy(String),

    /// A stored record could not be opened or parsed.
    #[error("malformed record: {context}")]
    Malformed {
        /// Which record and why.
        context: String,
    },
}

impl StorageError {
    /// Creates an invalid argument error.
    pub fn invalid_argument<P: Into<String>, R: Into<String>>(parameter: P, reason: R) -> Self {
        Self::InvalidArgument {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Creates an I/O error with context.
    pub fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a malformed record error.
    pub fn malformed<S: Into<String>>(context: S) -> Self {
        Self::Malformed {
            context: context.into(),
        }
    }

    /// Creates a lock error.
    pub fn lock<S: Into<String>>(message: S) -> Self {
        Self::Lock(message.into())
    }
}
