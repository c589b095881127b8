//! Storage manager configuration.

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// How the manager uses the legacy cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "snake_case")]
pub enum LegacyFallbackPolicy {
    /// Never consult the legacy cache.
    Disabled,
    /// Consult the legacy cache on account and refresh-token read misses.
    #[default]
    ReadFallback,
    /// Read fallback, plus mirror refresh-token writes and account purges.
    ReadAndWriteThrough,
}

impl LegacyFallbackPolicy {
    /// Returns `true` if read misses consult the legacy cache.
    #[must_use]
    pub const fn reads_legacy(self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Returns `true` if writes are mirrored to the legacy cache.
    #[must_use]
    pub const fn writes_legacy(self) -> bool {
        matches!(self, Self::ReadAndWriteThrough)
    }
}

/// Storage manager configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Legacy cache usage.
    pub legacy_fallback: LegacyFallbackPolicy,
}

impl StorageConfig {
    /// Parses a configuration from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the JSON is malformed or names an unknown
    /// policy.
    pub fn from_json(json: &str) -> StorageResult<Self> {
        serde_json::from_str(json)
            .map_err(|err| StorageError::invalid_argument("config", err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_default_policy_is_read_fallback() {
        let config = StorageConfig::default();
        assert_eq!(config.legacy_fallback, LegacyFallbackPolicy::ReadFallback);
        assert!(config.legacy_fallback.reads_legacy());
        assert!(!config.legacy_fallback.writes_legacy());
    }

    #[test_case("{}", LegacyFallbackPolicy::ReadFallback ; "empty object")]
    #[test_case(r#"{"legacy_fallback":"disabled"}"#, LegacyFallbackPolicy::Disabled ; "disabled")]
    #[test_case(
        r#"{"legacy_fallback":"read_and_write_through"}"#,
        LegacyFallbackPolicy::ReadAndWriteThrough ;
        "write through"
    )]
    fn test_from_json(json: &str, expected: LegacyFallbackPolicy) {
        let config = StorageConfig::from_json(json).expect("config");
        assert_eq!(config.legacy_fallback, expected);
    }

    #[test]
    fn test_from_json_rejects_unknown_policy() {
        assert!(matches!(
            StorageConfig::from_json(r#"{"legacy_fallback":"sometimes"}"#),
            Err(StorageError::InvalidArgument { .. })
        ));
    }
}
