//! Errors crossing the FFI boundary.
//!
//! Façade operations report failures as [`CacheStatus`](super::CacheStatus);
//! this type is only used by constructors and by foreign callbacks.

use crate::error::StorageError;

/// Error raised by store construction or by a foreign callback.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Error, thiserror::Error)]
pub enum CacheError {
    /// Invalid input parameter.
    #[error("Invalid input: {parameter} - {message}")]
    InvalidInput {
        /// Parameter name.
        parameter: String,
        /// Error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {message}")]
    Io {
        /// Error message.
        message: String,
    },

    /// The foreign keystore failed.
    #[error("Keystore error: {message}")]
    Keystore {
        /// Error message.
        message: String,
    },

    /// The foreign legacy cache failed.
    #[error("Legacy cache error: {message}")]
    Legacy {
        /// Error message.
        message: String,
    },

    /// Anything else, including unexpected callback failures.
    #[error("Unexpected error: {message}")]
    Unexpected {
        /// Error message.
        message: String,
    },
}

impl From<StorageError> for CacheError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidArgument { parameter, reason } => Self::InvalidInput {
                parameter,
                message: reason,
            },
            StorageError::Io { .. } => Self::Io {
                message: err.to_string(),
            },
            StorageError::Keystore(message) => Self::Keystore { message },
            StorageError::Legacy(message) => Self::Legacy { message },
            StorageError::Serialization(_)
            | StorageError::Lock(_)
            | StorageError::Malformed { .. } => Self::Unexpected {
                message: err.to_string(),
            },
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for CacheError {
    fn from(err: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::Unexpected { message: err.reason }
    }
}

impl CacheError {
    /// Maps a keystore callback failure into the engine's error type.
    pub(crate) fn into_keystore_error(self) -> StorageError {
        match self {
            Self::Keystore { message } => StorageError::Keystore(message),
            other => StorageError::Keystore(other.to_string()),
        }
    }

    /// Maps a legacy-cache callback failure into the engine's error type.
    pub(crate) fn into_legacy_error(self) -> StorageError {
        match self {
            Self::Legacy { message } => StorageError::Legacy(message),
            other => StorageError::Legacy(other.to_string()),
        }
    }
}
