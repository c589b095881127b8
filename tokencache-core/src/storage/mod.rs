//! Token cache storage engine.
//!
//! Layers, bottom-up:
//!
//! - [`paths`] normalizes identifiers and derives record paths
//! - [`StorageBackend`] implementations persist opaque bytes per path
//! - [`scopes`] matches access-token scope sets
//! - [`StorageWorker`] implements the per-kind read, write and delete rules
//! - [`StorageManager`] turns results into statuses and consults the legacy
//!   cache

pub mod backend;
pub mod config;
mod container;
mod envelope;
pub mod keystore;
pub mod legacy;
pub mod manager;
pub mod paths;
pub mod scopes;
pub mod status;
pub mod traits;
pub mod worker;

#[cfg(test)]
pub(crate) mod tests_utils;

pub use backend::{FileBackend, MemoryBackend, PathLocks};
pub use config::{LegacyFallbackPolicy, StorageConfig};
pub use keystore::{PlaintextKeystore, XChaChaKeystore};
pub use legacy::{LegacyCacheManager, LegacyQuery};
pub use manager::StorageManager;
pub use paths::{RecordPath, StoragePaths};
pub use status::{
    OperationStatus, ReadAccountResponse, ReadAccountsResponse, ReadAppMetadataResponse,
    ReadCredentialsResponse, StatusCode, StorageFailure,
};
pub use traits::{DeviceKeystore, Mutation, StorageBackend, StorageProvider};
pub use worker::{CredentialQuery, StorageWorker};
