//! Typed cache records: credentials, accounts and app metadata.
//!
//! Field names follow the unified cache schema so records written here can be
//! read by other implementations sharing the same physical format. Fields this
//! crate does not model are kept verbatim in `additional_fields`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

use crate::error::{StorageError, StorageResult};

/// Kind of a stored credential.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[strum(ascii_case_insensitive)]
pub enum CredentialType {
    /// OAuth2 access token, keyed by scope set inside a container record.
    AccessToken,
    /// OAuth2 refresh token, client- or family-scoped.
    RefreshToken,
    /// OIDC ID token.
    IdToken,
}

impl CredentialType {
    /// Every credential type, in the order reads are performed.
    pub const ALL: [Self; 3] = [Self::AccessToken, Self::RefreshToken, Self::IdToken];

    /// Parses the wire name of a credential type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for unrecognized names.
    pub fn parse(value: &str) -> StorageResult<Self> {
        value.trim().parse().map_err(|_| {
            StorageError::invalid_argument(
                "credential_type",
                format!("unrecognized credential type '{value}'"),
            )
        })
    }
}

/// Overlays a newer record onto a stored one.
///
/// Values present in the newer record win; values it leaves absent keep what
/// was stored.
pub trait Merge {
    /// Merges `newer` into `self`.
    fn merge_from(&mut self, newer: Self);
}

/// A secret-bearing token record.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Identifies the end user across tenants.
    pub home_account_id: String,
    /// Host of the issuing authority.
    pub environment: String,
    /// Tenant identifier; empty for multi-tenant and refresh-token records.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub realm: String,
    /// Client id; may be empty when `family_id` is used instead.
    #[serde(default)]
    pub client_id: String,
    /// Family of clients sharing one refresh token.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub family_id: String,
    /// Space-delimited scopes (access tokens only).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
    /// Kind of credential.
    pub credential_type: CredentialType,
    /// The token value.
    pub secret: String,
    /// When the token was cached (epoch seconds).
    #[serde(default, with = "epoch_seconds", skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<u64>,
    /// When the token expires (epoch seconds).
    #[serde(default, with = "epoch_seconds", skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<u64>,
    /// Extended expiry used during outages (epoch seconds).
    #[serde(default, with = "epoch_seconds", skip_serializing_if = "Option::is_none")]
    pub extended_expires_on: Option<u64>,
    /// Proactive refresh hint (epoch seconds).
    #[serde(default, with = "epoch_seconds", skip_serializing_if = "Option::is_none")]
    pub refresh_on: Option<u64>,
    /// Fields not modelled by this crate.
    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

impl Credential {
    /// Creates a credential with the mandatory identity fields set.
    pub fn new(
        credential_type: CredentialType,
        home_account_id: impl Into<String>,
        environment: impl Into<String>,
        client_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            home_account_id: home_account_id.into(),
            environment: environment.into(),
            realm: String::new(),
            client_id: client_id.into(),
            family_id: String::new(),
            target: String::new(),
            credential_type,
            secret: secret.into(),
            cached_at: None,
            expires_on: None,
            extended_expires_on: None,
            refresh_on: None,
            additional_fields: Map::new(),
        }
    }

    /// Sets the realm.
    #[must_use]
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// Sets the scope string.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Sets the family id.
    #[must_use]
    pub fn with_family_id(mut self, family_id: impl Into<String>) -> Self {
        self.family_id = family_id.into();
        self
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("home_account_id", &self.home_account_id)
            .field("environment", &self.environment)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("family_id", &self.family_id)
            .field("target", &self.target)
            .field("credential_type", &self.credential_type)
            .field("secret", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish_non_exhaustive()
    }
}

impl Merge for Credential {
    fn merge_from(&mut self, newer: Self) {
        self.home_account_id = newer.home_account_id;
        self.environment = newer.environment;
        self.credential_type = newer.credential_type;
        self.secret = newer.secret;
        merge_string(&mut self.realm, newer.realm);
        merge_string(&mut self.client_id, newer.client_id);
        merge_string(&mut self.family_id, newer.family_id);
        merge_string(&mut self.target, newer.target);
        merge_option(&mut self.cached_at, newer.cached_at);
        merge_option(&mut self.expires_on, newer.expires_on);
        merge_option(&mut self.extended_expires_on, newer.extended_expires_on);
        merge_option(&mut self.refresh_on, newer.refresh_on);
        merge_fields(&mut self.additional_fields, newer.additional_fields);
    }
}

/// A signed-in identity in one realm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Identifies the end user across tenants.
    pub home_account_id: String,
    /// Host of the issuing authority.
    pub environment: String,
    /// Tenant identifier.
    #[serde(default)]
    pub realm: String,
    /// Object id of the user in `realm`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_account_id: Option<String>,
    /// Sign-in name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Given name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    /// Family name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    /// Middle name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    /// Authority flavour (`MSSTS`, `ADFS`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_type: Option<String>,
    /// Raw client info returned by the token endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<String>,
    /// Identifier assigned by a legacy or external cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_account_id: Option<String>,
    /// Last write time (epoch seconds).
    #[serde(default, with = "epoch_seconds", skip_serializing_if = "Option::is_none")]
    pub last_modification_time: Option<u64>,
    /// Fields not modelled by this crate.
    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

impl Account {
    /// Creates an account with only its identity key set.
    pub fn new(
        home_account_id: impl Into<String>,
        environment: impl Into<String>,
        realm: impl Into<String>,
    ) -> Self {
        Self {
            home_account_id: home_account_id.into(),
            environment: environment.into(),
            realm: realm.into(),
            local_account_id: None,
            username: None,
            name: None,
            given_name: None,
            family_name: None,
            middle_name: None,
            authority_type: None,
            client_info: None,
            alternative_account_id: None,
            last_modification_time: None,
            additional_fields: Map::new(),
        }
    }

    /// Returns true when `other` has the same (home account, environment,
    /// realm) identity, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        eq_normalized(&self.home_account_id, &other.home_account_id)
            && eq_normalized(&self.environment, &other.environment)
            && eq_normalized(&self.realm, &other.realm)
    }
}

impl Merge for Account {
    fn merge_from(&mut self, newer: Self) {
        self.home_account_id = newer.home_account_id;
        self.environment = newer.environment;
        merge_string(&mut self.realm, newer.realm);
        merge_option(&mut self.local_account_id, newer.local_account_id);
        merge_option(&mut self.username, newer.username);
        merge_option(&mut self.name, newer.name);
        merge_option(&mut self.given_name, newer.given_name);
        merge_option(&mut self.family_name, newer.family_name);
        merge_option(&mut self.middle_name, newer.middle_name);
        merge_option(&mut self.authority_type, newer.authority_type);
        merge_option(&mut self.client_info, newer.client_info);
        merge_option(&mut self.alternative_account_id, newer.alternative_account_id);
        merge_option(&mut self.last_modification_time, newer.last_modification_time);
        merge_fields(&mut self.additional_fields, newer.additional_fields);
    }
}

/// Per-client metadata, currently the family association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppMetadata {
    /// Host of the issuing authority.
    pub environment: String,
    /// Client the metadata describes.
    pub client_id: String,
    /// Family the client belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_id: Option<String>,
    /// Fields not modelled by this crate.
    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

impl AppMetadata {
    /// Creates app metadata for a client.
    pub fn new(environment: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            client_id: client_id.into(),
            family_id: None,
            additional_fields: Map::new(),
        }
    }
}

impl Merge for AppMetadata {
    fn merge_from(&mut self, newer: Self) {
        self.environment = newer.environment;
        self.client_id = newer.client_id;
        merge_option(&mut self.family_id, newer.family_id);
        merge_fields(&mut self.additional_fields, newer.additional_fields);
    }
}

fn merge_string(stored: &mut String, newer: String) {
    if !newer.is_empty() {
        *stored = newer;
    }
}

fn merge_option<T>(stored: &mut Option<T>, newer: Option<T>) {
    if newer.is_some() {
        *stored = newer;
    }
}

fn merge_fields(stored: &mut Map<String, Value>, newer: Map<String, Value>) {
    for (key, value) in newer {
        stored.insert(key, value);
    }
}

fn eq_normalized(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Epoch-second timestamps written as strings, read from strings or numbers.
mod epoch_seconds {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    #[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(
        value: &Option<u64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(seconds) => serializer.serialize_str(&seconds.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u64>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Number(seconds)) => Ok(Some(seconds)),
            Some(Raw::Text(text)) if text.trim().is_empty() => Ok(None),
            Some(Raw::Text(text)) => text.trim().parse().map(Some).map_err(de::Error::custom),
        }
    }
}
