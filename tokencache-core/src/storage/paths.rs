//! Storage path helpers.
//!
//! Every identifier that ends up in a path is trimmed, lower-cased, hashed
//! with SHA-256 and truncated to 10 bytes, then written in the base32hex
//! alphabet. Segments therefore have a fixed length, are safe on every
//! filesystem and compare case- and whitespace-insensitively.
//!
//! Layout (relative to the cache root):
//!
//! ```text
//! UD/u_<home>/e_<env>/AT/r_<realm>/c_<client>.bin    access token container
//! UD/u_<home>/e_<env>/ID/r_<realm>/c_<client>.bin    id token
//! UD/u_<home>/e_<env>/RT/c_<client>.bin              refresh token
//! UD/u_<home>/e_<env>/FRT/f_<family>.bin             family refresh token
//! UD/u_<home>/e_<env>/Accounts/r_<realm>.bin         account
//! AppMetadata/e_<env>/c_<client>.bin                 app metadata
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use data_encoding::BASE32HEX_NOPAD;
use sha2::{Digest, Sha256};

use crate::error::{StorageError, StorageResult};
use crate::types::CredentialType;

const CACHE_DIRNAME: &str = "tokencache";
const USER_DATA_DIR: &str = "UD";
const ACCESS_TOKENS_DIR: &str = "AT";
const REFRESH_TOKENS_DIR: &str = "RT";
const FAMILY_REFRESH_TOKENS_DIR: &str = "FRT";
const ID_TOKENS_DIR: &str = "ID";
const ACCOUNTS_DIR: &str = "Accounts";
const APP_METADATA_DIR: &str = "AppMetadata";
const RECORD_EXTENSION: &str = ".bin";

/// Number of digest bytes kept per path segment (80 bits).
const HASH_PREFIX_LEN: usize = 10;

/// A `/`-separated path relative to the cache root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordPath(String);

impl RecordPath {
    fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|segment| segment.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    /// Parses a `/`-separated relative path as stored by a backend.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for empty, absolute or `..`-bearing paths.
    pub fn parse(value: &str) -> StorageResult<Self> {
        if value.is_empty() || value.starts_with('/') {
            return Err(StorageError::invalid_argument(
                "path",
                format!("'{value}' is not a relative record path"),
            ));
        }
        if value
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(StorageError::invalid_argument(
                "path",
                format!("'{value}' contains an empty or relative segment"),
            ));
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the path as a `/`-separated string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Returns true if `self` equals `prefix` or lies underneath it.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0 == prefix.0
            || (self.0.starts_with(&prefix.0) && self.0[prefix.0.len()..].starts_with('/'))
    }

    /// Resolves the path under `root` using the platform separator.
    #[must_use]
    pub fn to_path_buf(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |acc, segment| acc.join(segment))
    }
}

impl fmt::Display for RecordPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trims and lower-cases `value`, then encodes a truncated SHA-256 digest.
#[must_use]
pub fn hash_component(value: &str) -> String {
    let normalized = value.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    BASE32HEX_NOPAD.encode(&digest[..HASH_PREFIX_LEN])
}

fn tagged(tag: &str, value: &str) -> String {
    format!("{tag}_{}", hash_component(value))
}

fn record_file(tag: &str, value: &str) -> String {
    format!("{}{RECORD_EXTENSION}", tagged(tag, value))
}

fn require(parameter: &str, value: &str) -> StorageResult<()> {
    if value.trim().is_empty() {
        return Err(StorageError::invalid_argument(parameter, "must not be empty"));
    }
    Ok(())
}

/// Root of all user-scoped records.
#[must_use]
pub fn user_data_root() -> RecordPath {
    RecordPath::from_segments([USER_DATA_DIR])
}

/// Directory holding every record of one user in one environment.
///
/// # Errors
///
/// Returns `InvalidArgument` if either identifier is empty.
pub fn user_environment_dir(home_account_id: &str, environment: &str) -> StorageResult<RecordPath> {
    require("home_account_id", home_account_id)?;
    require("environment", environment)?;
    Ok(RecordPath::from_segments([
        USER_DATA_DIR.to_string(),
        tagged("u", home_account_id),
        tagged("e", environment),
    ]))
}

fn under_user(
    home_account_id: &str,
    environment: &str,
    rest: &[String],
) -> StorageResult<RecordPath> {
    let base = user_environment_dir(home_account_id, environment)?;
    Ok(RecordPath::from_segments(
        base.segments().map(str::to_string).chain(rest.iter().cloned()),
    ))
}

/// Path of the record holding a credential of `credential_type`.
///
/// A refresh token with a family id goes to the family path regardless of its
/// client id.
///
/// # Errors
///
/// Returns `InvalidArgument` when an identifier the chosen layout needs is
/// empty.
pub fn credential_path(
    home_account_id: &str,
    environment: &str,
    realm: &str,
    client_id: &str,
    family_id: &str,
    credential_type: CredentialType,
) -> StorageResult<RecordPath> {
    match credential_type {
        CredentialType::RefreshToken if !family_id.trim().is_empty() => {
            family_refresh_token_path(home_account_id, environment, family_id)
        }
        CredentialType::RefreshToken => {
            if client_id.trim().is_empty() {
                return Err(StorageError::invalid_argument(
                    "client_id",
                    "refresh tokens need a client id or a family id",
                ));
            }
            client_refresh_token_path(home_account_id, environment, client_id)
        }
        CredentialType::AccessToken => {
            realm_scoped_path(ACCESS_TOKENS_DIR, home_account_id, environment, realm, client_id)
        }
        CredentialType::IdToken => {
            realm_scoped_path(ID_TOKENS_DIR, home_account_id, environment, realm, client_id)
        }
    }
}

fn realm_scoped_path(
    dir: &str,
    home_account_id: &str,
    environment: &str,
    realm: &str,
    client_id: &str,
) -> StorageResult<RecordPath> {
    require("client_id", client_id)?;
    under_user(
        home_account_id,
        environment,
        &[
            dir.to_string(),
            tagged("r", realm),
            record_file("c", client_id),
        ],
    )
}

/// Path of a client-scoped refresh token.
///
/// # Errors
///
/// Returns `InvalidArgument` if an identifier is empty.
pub fn client_refresh_token_path(
    home_account_id: &str,
    environment: &str,
    client_id: &str,
) -> StorageResult<RecordPath> {
    require("client_id", client_id)?;
    under_user(
        home_account_id,
        environment,
        &[REFRESH_TOKENS_DIR.to_string(), record_file("c", client_id)],
    )
}

/// Path of a family refresh token shared by every client in the family.
///
/// # Errors
///
/// Returns `InvalidArgument` if an identifier is empty.
pub fn family_refresh_token_path(
    home_account_id: &str,
    environment: &str,
    family_id: &str,
) -> StorageResult<RecordPath> {
    require("family_id", family_id)?;
    under_user(
        home_account_id,
        environment,
        &[
            FAMILY_REFRESH_TOKENS_DIR.to_string(),
            record_file("f", family_id),
        ],
    )
}

/// Path of the account record for one realm.
///
/// # Errors
///
/// Returns `InvalidArgument` if the home account id or environment is empty.
pub fn account_path(
    home_account_id: &str,
    environment: &str,
    realm: &str,
) -> StorageResult<RecordPath> {
    under_user(
        home_account_id,
        environment,
        &[ACCOUNTS_DIR.to_string(), record_file("r", realm)],
    )
}

/// Directory holding every account realm of one user in one environment.
///
/// # Errors
///
/// Returns `InvalidArgument` if an identifier is empty.
pub fn accounts_dir(home_account_id: &str, environment: &str) -> StorageResult<RecordPath> {
    under_user(home_account_id, environment, &[ACCOUNTS_DIR.to_string()])
}

/// Returns true when `path` names an account record.
#[must_use]
pub fn is_account_path(path: &RecordPath) -> bool {
    let segments: Vec<&str> = path.segments().collect();
    matches!(
        segments.as_slice(),
        [USER_DATA_DIR, _, _, ACCOUNTS_DIR, file] if file.ends_with(RECORD_EXTENSION)
    )
}

/// Path of the metadata record of a client.
///
/// App metadata is client-scoped and lives outside the user data root.
///
/// # Errors
///
/// Returns `InvalidArgument` if an identifier is empty.
pub fn app_metadata_path(environment: &str, client_id: &str) -> StorageResult<RecordPath> {
    require("environment", environment)?;
    require("client_id", client_id)?;
    Ok(RecordPath::from_segments([
        APP_METADATA_DIR.to_string(),
        tagged("e", environment),
        record_file("c", client_id),
    ]))
}

/// Filesystem locations for the cache under `<root>/tokencache`.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
    cache_dir: PathBuf,
}

impl StoragePaths {
    /// Builds storage paths rooted at `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let cache_dir = root.join(CACHE_DIRNAME);
        Self { root, cache_dir }
    }

    /// Returns the storage root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory all records live under.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the absolute location of `path`.
    #[must_use]
    pub fn record_path(&self, path: &RecordPath) -> PathBuf {
        path.to_path_buf(&self.cache_dir)
    }
}
