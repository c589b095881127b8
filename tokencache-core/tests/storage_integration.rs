#![allow(missing_docs)]

mod common;

use std::fs;
use std::sync::Arc;
use std::thread;

use common::{
    access_token, file_manager, init_tracing, InMemoryLegacyCache, CLIENT, ENV, HOME, REALM,
};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use tokencache_core::storage::paths::{
    account_path, credential_path, family_refresh_token_path, hash_component,
};
use tokencache_core::storage::{
    CredentialQuery, LegacyFallbackPolicy, StatusCode, StorageBackend, StorageConfig,
};
use tokencache_core::{Account, AppMetadata, Credential, CredentialType};

const CID: &str = "integration";

fn at_query(target: &str) -> CredentialQuery {
    CredentialQuery::new(HOME, ENV)
        .with_realm(REALM)
        .with_client_id(CLIENT)
        .with_target(target)
        .with_types([CredentialType::AccessToken])
}

#[test]
fn test_access_token_lifecycle_end_to_end() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let (provider, manager) = file_manager(dir.path(), StorageConfig::default());
    let container = credential_path(HOME, ENV, REALM, CLIENT, "", CredentialType::AccessToken)
        .expect("path");

    assert!(manager
        .write_credentials(CID, &[access_token("User.Read", "first")])
        .is_success());
    let response = manager.read_credentials(CID, &at_query("User.Read"));
    assert!(response.status.is_success());
    assert_eq!(response.credentials.len(), 1);
    assert_eq!(response.credentials[0].secret, "first");

    assert!(manager
        .write_credentials(CID, &[access_token("User.Read Mail.Read", "combined")])
        .is_success());
    let response = manager.read_credentials(CID, &at_query("User.Read"));
    assert_eq!(response.credentials.len(), 1);
    assert_eq!(response.credentials[0].secret, "combined");
    assert_eq!(response.credentials[0].target, "User.Read Mail.Read");

    assert!(manager
        .delete_credentials(CID, &at_query("Mail.Read"))
        .is_success());
    assert!(manager
        .read_credentials(CID, &at_query("User.Read"))
        .credentials
        .is_empty());

    let on_disk = provider.file_backend().paths().record_path(&container);
    assert!(!on_disk.exists());
    assert!(provider
        .file_backend()
        .read(&container)
        .expect("read")
        .is_none());
}

#[test]
fn test_records_are_laid_out_under_hashed_paths() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_provider, manager) = file_manager(dir.path(), StorageConfig::default());
    assert!(manager
        .write_account(CID, &Account::new(HOME, ENV, REALM))
        .is_success());

    let expected = dir
        .path()
        .join("tokencache")
        .join("UD")
        .join(format!("u_{}", hash_component(HOME)))
        .join(format!("e_{}", hash_component(ENV)))
        .join("Accounts")
        .join(format!("r_{}.bin", hash_component(REALM)));
    assert!(expected.is_file(), "missing {}", expected.display());

    // Encrypted at rest: neither identifiers nor JSON keys appear in plain text.
    let bytes = fs::read(&expected).expect("read record");
    let text = String::from_utf8_lossy(&bytes);
    assert!(!text.contains("home_account_id"));
    assert!(!text.contains(HOME));

    // Case and whitespace variants resolve to the same record.
    let response = manager.read_account(CID, " UID.UTID ", "Login.Example.COM", "TENANT");
    assert!(response.account.is_some());
}

#[test]
fn test_merge_preserves_out_of_band_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_provider, manager) = file_manager(dir.path(), StorageConfig::default());

    let mut stored = Account::new(HOME, ENV, REALM);
    stored.local_account_id = Some("local-id".to_string());
    stored
        .additional_fields
        .insert("host_flag".to_string(), serde_json::json!(true));
    assert!(manager.write_account(CID, &stored).is_success());

    let mut update = Account::new(HOME, ENV, REALM);
    update.username = Some("user@example.com".to_string());
    assert!(manager.write_account(CID, &update).is_success());

    let account = manager
        .read_account(CID, HOME, ENV, REALM)
        .account
        .expect("account");
    assert_eq!(account.local_account_id.as_deref(), Some("local-id"));
    assert_eq!(account.username.as_deref(), Some("user@example.com"));
    assert_eq!(account.additional_fields["host_flag"], serde_json::json!(true));
}

#[test]
fn test_corrupted_file_reads_as_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (provider, manager) = file_manager(dir.path(), StorageConfig::default());
    assert!(manager
        .write_account(CID, &Account::new(HOME, ENV, REALM))
        .is_success());
    assert!(manager
        .write_account(CID, &Account::new(HOME, ENV, "other"))
        .is_success());

    let corrupted = provider
        .file_backend()
        .paths()
        .record_path(&account_path(HOME, ENV, REALM).expect("path"));
    fs::write(&corrupted, b"not a sealed record").expect("corrupt");

    let response = manager.read_account(CID, HOME, ENV, REALM);
    assert!(response.status.is_success());
    assert!(response.account.is_none());

    let accounts = manager.read_accounts(CID, HOME, ENV);
    assert!(accounts.status.is_success());
    assert_eq!(accounts.accounts.len(), 1);
    assert_eq!(accounts.accounts[0].realm, "other");
}

#[test]
fn test_family_refresh_token_precedence() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (provider, manager) = file_manager(dir.path(), StorageConfig::default());
    let frt = Credential::new(CredentialType::RefreshToken, HOME, ENV, CLIENT, "frt")
        .with_family_id("1");
    assert!(manager.write_credentials(CID, &[frt]).is_success());

    let family = family_refresh_token_path(HOME, ENV, "1").expect("path");
    assert!(provider
        .file_backend()
        .read(&family)
        .expect("read")
        .is_some());

    let client_only = CredentialQuery::new(HOME, ENV)
        .with_client_id(CLIENT)
        .with_types([CredentialType::RefreshToken]);
    assert!(manager
        .read_credentials(CID, &client_only)
        .credentials
        .is_empty());

    let by_family = client_only.clone().with_family_id("1");
    let found = manager.read_credentials(CID, &by_family).credentials;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].secret, "frt");
}

#[test]
fn test_delete_accounts_purges_user_environment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let legacy = Arc::new(
        InMemoryLegacyCache::default()
            .with_refresh_token(Credential::new(
                CredentialType::RefreshToken,
                HOME,
                ENV,
                CLIENT,
                "legacy",
            )),
    );
    let (_provider, manager) = file_manager(
        dir.path(),
        StorageConfig {
            legacy_fallback: LegacyFallbackPolicy::ReadAndWriteThrough,
        },
    );
    let manager = manager.with_legacy_cache(legacy.clone());

    assert!(manager
        .write_account(CID, &Account::new(HOME, ENV, REALM))
        .is_success());
    assert!(manager
        .write_credentials(CID, &[
            access_token("User.Read", "at"),
            Credential::new(CredentialType::IdToken, HOME, ENV, CLIENT, "id").with_realm(REALM),
        ])
        .is_success());
    assert!(manager
        .write_app_metadata(CID, &AppMetadata::new(ENV, CLIENT))
        .is_success());

    assert!(manager.delete_accounts(CID, HOME, ENV).is_success());

    assert!(manager.read_account(CID, HOME, ENV, REALM).account.is_none());
    let everything = CredentialQuery::new(HOME, ENV)
        .with_realm(REALM)
        .with_client_id(CLIENT)
        .with_target("User.Read")
        .with_types(CredentialType::ALL);
    assert!(manager
        .read_credentials(CID, &everything)
        .credentials
        .is_empty());
    assert!(legacy.refresh_token_secrets().is_empty());
    assert!(manager
        .read_app_metadata(CID, ENV, CLIENT)
        .app_metadata
        .is_some());
}

#[test]
fn test_legacy_accounts_fill_gaps() {
    let dir = tempfile::tempdir().expect("tempdir");
    let legacy = Arc::new(
        InMemoryLegacyCache::default().with_account(Account::new("legacy.user", ENV, REALM)),
    );
    let (_provider, manager) = file_manager(dir.path(), StorageConfig::default());
    let manager = manager.with_legacy_cache(legacy.clone());
    assert!(manager
        .write_account(CID, &Account::new(HOME, ENV, REALM))
        .is_success());

    let accounts = manager.read_all_accounts(CID).accounts;
    assert_eq!(accounts.len(), 2);

    let rt = Credential::new(CredentialType::RefreshToken, HOME, ENV, CLIENT, "unified");
    assert!(manager.write_credentials(CID, &[rt]).is_success());
    assert!(legacy.refresh_token_secrets().is_empty());
}

#[test]
fn test_invalid_arguments_surface_as_status() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_provider, manager) = file_manager(dir.path(), StorageConfig::default());

    let missing_ids = CredentialQuery::new(HOME, ENV).with_types([CredentialType::RefreshToken]);
    let response = manager.read_credentials(CID, &missing_ids);
    assert_eq!(response.status.code(), StatusCode::InvalidArgument);

    let no_scopes = access_token("   ", "secret");
    let status = manager.write_credentials(CID, &[no_scopes]);
    assert_eq!(status.code(), StatusCode::InvalidArgument);

    assert!(CredentialType::parse("Password").is_err());
}

#[test]
fn test_concurrent_writers_to_one_container() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_provider, manager) = file_manager(dir.path(), StorageConfig::default());
    let manager = Arc::new(manager);

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for step in 0..10 {
                    let target = format!("scope.{worker}.{step}");
                    assert!(manager
                        .write_credentials(CID, &[access_token(&target, &target)])
                        .is_success());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread join");
    }

    // Disjoint scopes: no write may have been lost.
    for worker in 0..8 {
        for step in 0..10 {
            let target = format!("scope.{worker}.{step}");
            let found = manager.read_credentials(CID, &at_query(&target)).credentials;
            assert_eq!(found.len(), 1, "lost {target}");
        }
    }
}

#[test]
fn test_random_histories_keep_at_most_one_superset() {
    let scopes = ["openid", "profile", "user.read", "mail.read", "files.read", "offline"];
    for seed in 0..5_u64 {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_provider, manager) = file_manager(dir.path(), StorageConfig::default());
        let mut rng = StdRng::seed_from_u64(seed);
        let mut model: Vec<(Vec<&str>, String)> = Vec::new();

        for step in 0..60 {
            let count = rng.gen_range(1..=3);
            let chosen: Vec<&str> = scopes.choose_multiple(&mut rng, count).copied().collect();
            let secret = format!("{seed}-{step}");
            assert!(manager
                .write_credentials(CID, &[access_token(&chosen.join(" "), &secret)])
                .is_success());
            model.retain(|(existing, _)| !existing.iter().any(|scope| chosen.contains(scope)));
            model.push((chosen, secret));
        }

        // Every single scope resolves to exactly the entry the model predicts.
        for scope in scopes {
            let expected: Vec<&String> = model
                .iter()
                .filter(|(entry, _)| entry.contains(&scope))
                .map(|(_, secret)| secret)
                .collect();
            assert!(expected.len() <= 1);
            let found = manager.read_credentials(CID, &at_query(scope)).credentials;
            let found: Vec<&String> = found.iter().map(|credential| &credential.secret).collect();
            assert_eq!(found, expected, "seed {seed}, scope {scope}");
        }
    }
}
