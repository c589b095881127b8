//! `tokencache-core` is the storage engine of a unified OAuth2/OIDC token
//! cache.
//!
//! It maps logical records (access, refresh and ID tokens, accounts and app
//! metadata) onto hashed, hierarchical record paths, keeps access tokens in
//! scope-keyed containers with replace-on-overlap semantics, merges writes
//! onto stored records field by field and exposes everything through an
//! exception-free [`StorageManager`](storage::StorageManager).
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use tokencache_core::storage::{
//!     CredentialQuery, MemoryBackend, StorageConfig, StorageManager, StorageWorker,
//!     XChaChaKeystore,
//! };
//! use tokencache_core::{Credential, CredentialType};
//!
//! let worker = StorageWorker::new(
//!     Arc::new(MemoryBackend::new()),
//!     Arc::new(XChaChaKeystore::generate()),
//! );
//! let manager = StorageManager::new(worker, StorageConfig::default());
//!
//! let token = Credential::new(
//!     CredentialType::AccessToken,
//!     "uid.utid",
//!     "login.example.com",
//!     "client",
//!     "secret",
//! )
//! .with_realm("tenant")
//! .with_target("User.Read Mail.Read");
//! assert!(manager.write_credentials("cid", &[token]).is_success());
//!
//! let query = CredentialQuery::new("uid.utid", "login.example.com")
//!     .with_realm("tenant")
//!     .with_client_id("client")
//!     .with_target("user.read")
//!     .with_types([CredentialType::AccessToken]);
//! let response = manager.read_credentials("cid", &query);
//! assert_eq!(response.credentials.len(), 1);
//! ```

mod error;
pub use error::*;

mod types;
pub use types::*;

pub mod logger;
pub mod storage;

#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!("tokencache_core");
