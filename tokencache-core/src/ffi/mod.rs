//! Swift and Kotlin bindings for the token cache.
//!
//! # Main Entry Points
//!
//! - [`TokenCacheStore`] - file-backed store with optional host keystore and
//!   legacy cache
//! - [`set_logger`](crate::logger::set_logger) - routes engine logs to the host
//!
//! Every store operation returns a [`CacheStatus`] (or a result record
//! embedding one) instead of throwing.

mod error;
mod store;
mod types;

pub use error::CacheError;
pub use store::{Keystore, LegacyCache, TokenCacheStore};
pub use types::{
    CacheAccount, CacheAccountResult, CacheAccountsResult, CacheAppMetadata,
    CacheAppMetadataResult, CacheCredential, CacheCredentialQuery, CacheCredentialsResult,
    CacheLegacyQuery, CacheStatus,
};
