//! Integration tests for the vault session protocol and blob stores.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tempfile::TempDir;
use zkvault::crypto;
use zkvault::errors::VaultError;
use zkvault::session::{SecondFactor, Vault, VaultConfig, VaultProfile};
use zkvault::store::{BlobStore, FileStore, MemoryStore, SecretRecord};
use zkvault::totp::{code_at, TotpSecret};

const PASSWORD: &str = "correct-horse";

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Config without the failure-latency floor so tests stay fast.
fn test_config() -> VaultConfig {
    VaultConfig {
        issuer: "zkvault-test".to_string(),
        session_timeout: Duration::from_secs(15 * 60),
        unlock_latency_floor: Duration::ZERO,
    }
}

/// Enroll a fresh vault and compute a currently-valid code for it.
fn enrolled_vault() -> (Vault<MemoryStore>, String) {
    let mut vault = Vault::new(
        MemoryStore::new(),
        VaultProfile::new("owner-1"),
        test_config(),
    );
    let enrollment = vault.enroll().expect("enroll");

    let secret = TotpSecret::from_base32(&enrollment.secret_base32).expect("decode secret");
    let code = code_at(&secret, unix_now());
    (vault, code)
}

/// Enroll and unlock (first unlock creates the canary).
fn unlocked_vault() -> Vault<MemoryStore> {
    let (mut vault, code) = enrolled_vault();
    vault.unlock(PASSWORD, &code).expect("first unlock");
    vault
}

// ---------------------------------------------------------------------------
// Enrollment
// ---------------------------------------------------------------------------

#[test]
fn enroll_exposes_secret_once_and_updates_profile() {
    let mut vault = Vault::new(
        MemoryStore::new(),
        VaultProfile::new("owner-1"),
        test_config(),
    );

    let enrollment = vault.enroll().expect("enroll");
    assert!(enrollment.provisioning_uri.starts_with("otpauth://totp/"));
    assert!(enrollment.provisioning_uri.contains("issuer=zkvault-test"));

    // The profile now carries the enrolled factor.
    assert!(matches!(
        vault.profile().second_factor,
        SecondFactor::Totp { .. }
    ));

    // A second enrollment is refused.
    assert!(matches!(vault.enroll(), Err(VaultError::AlreadyEnrolled)));
}

#[test]
fn unlock_without_enrollment_fails() {
    let mut vault = Vault::new(
        MemoryStore::new(),
        VaultProfile::new("owner-1"),
        test_config(),
    );

    let result = vault.unlock(PASSWORD, "123456");
    assert!(matches!(result, Err(VaultError::SecondFactorNotEnrolled)));
}

// ---------------------------------------------------------------------------
// Unlock protocol
// ---------------------------------------------------------------------------

#[test]
fn first_unlock_creates_canary_and_opens_session() {
    let (mut vault, code) = enrolled_vault();
    assert!(vault.profile().canary.is_none());

    vault.unlock(PASSWORD, &code).expect("unlock");

    assert!(vault.is_unlocked());
    assert!(
        vault.profile().canary.is_some(),
        "first unlock must create the verification record"
    );
}

#[test]
fn wrong_code_fails_as_authentication_error() {
    let (mut vault, code) = enrolled_vault();

    // A well-formed code from a different secret.
    let other = TotpSecret::generate();
    let mut wrong_code = code_at(&other, unix_now());
    if wrong_code == code {
        // One-in-a-million collision; any other 6-digit value will do.
        wrong_code = if code == "000000" { "000001" } else { "000000" }.to_string();
    }

    let result = vault.unlock(PASSWORD, &wrong_code);
    assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
    assert!(!vault.is_unlocked());
}

#[test]
fn malformed_code_is_rejected_before_verification() {
    let (mut vault, _code) = enrolled_vault();

    let result = vault.unlock(PASSWORD, "12ab56");
    assert!(matches!(result, Err(VaultError::MalformedInput(_))));
}

#[test]
fn wrong_password_fails_after_canary_exists() {
    let vault = unlocked_vault();

    // Fresh handle over the same profile and store: new replay guard,
    // same canary.  The same error kind covers wrong password and
    // wrong code — callers cannot tell which factor failed.
    let profile = vault.profile().clone();
    let store = vault.into_store();
    let mut vault2 = Vault::new(store, profile, test_config());

    let secret = vault2.profile().totp_secret().expect("secret");
    let code = code_at(&secret, unix_now());

    let result = vault2.unlock("wrong-password", &code);
    assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
    assert!(!vault2.is_unlocked());
}

#[test]
fn replayed_code_is_rejected_within_its_window() {
    let (mut vault, code) = enrolled_vault();

    vault.unlock(PASSWORD, &code).expect("first unlock");
    vault.lock();

    // Same code, same vault handle: the accepted step is remembered.
    let result = vault.unlock(PASSWORD, &code);
    assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
}

#[test]
fn failed_unlock_is_padded_to_the_latency_floor() {
    let mut config = test_config();
    config.unlock_latency_floor = Duration::from_millis(50);

    let mut vault = Vault::new(MemoryStore::new(), VaultProfile::new("owner-1"), config);
    let enrollment = vault.enroll().expect("enroll");
    let secret = TotpSecret::from_base32(&enrollment.secret_base32).unwrap();

    // Stale code, guaranteed outside the window.
    let stale = code_at(&secret, unix_now() - 300);

    let started = Instant::now();
    let result = vault.unlock(PASSWORD, &stale);
    assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
    assert!(
        started.elapsed() >= Duration::from_millis(50),
        "failure must not return faster than the floor"
    );
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

#[test]
fn lock_wipes_the_session() {
    let mut vault = unlocked_vault();
    assert!(vault.is_unlocked());

    vault.lock();
    assert!(!vault.is_unlocked());

    let result = vault.encrypt_and_store("api-key", "value");
    assert!(matches!(result, Err(VaultError::VaultLocked)));
}

#[test]
fn operations_require_an_unlocked_session() {
    let (mut vault, _code) = enrolled_vault();
    let id = uuid::Uuid::new_v4();

    assert!(matches!(
        vault.encrypt_and_store("api-key", "v"),
        Err(VaultError::VaultLocked)
    ));
    assert!(matches!(
        vault.fetch_and_decrypt(&id),
        Err(VaultError::VaultLocked)
    ));
    assert!(matches!(
        vault.update_secret(&id, "v"),
        Err(VaultError::VaultLocked)
    ));
    assert!(matches!(
        vault.delete_secret(&id),
        Err(VaultError::VaultLocked)
    ));
    assert!(matches!(
        vault.list_secrets(),
        Err(VaultError::VaultLocked)
    ));
}

#[test]
fn expired_session_requires_a_fresh_unlock() {
    let mut config = test_config();
    config.session_timeout = Duration::ZERO;

    let mut vault = Vault::new(MemoryStore::new(), VaultProfile::new("owner-1"), config);
    let enrollment = vault.enroll().expect("enroll");
    let secret = TotpSecret::from_base32(&enrollment.secret_base32).unwrap();

    vault
        .unlock(PASSWORD, &code_at(&secret, unix_now()))
        .expect("unlock");

    // The zero-length idle timeout expires the session immediately.
    assert!(!vault.is_unlocked());
    assert!(matches!(
        vault.encrypt_and_store("api-key", "v"),
        Err(VaultError::VaultLocked)
    ));
}

// ---------------------------------------------------------------------------
// Secret operations
// ---------------------------------------------------------------------------

#[test]
fn encrypt_store_fetch_roundtrip() {
    let mut vault = unlocked_vault();

    let id = vault
        .encrypt_and_store("api-key", "api-key-123")
        .expect("store");

    let plaintext = vault.fetch_and_decrypt(&id).expect("fetch");
    assert_eq!(plaintext, "api-key-123");

    // The stored record holds only opaque bytes, never the plaintext.
    let record = vault.store().get(&id).expect("raw record");
    assert_eq!(record.owner_ref, "owner-1");
    assert_eq!(record.label, "api-key");
    assert_ne!(record.ciphertext, b"api-key-123");
}

#[test]
fn fetch_unknown_id_is_not_found() {
    let mut vault = unlocked_vault();
    let id = uuid::Uuid::new_v4();

    let result = vault.fetch_and_decrypt(&id);
    assert!(matches!(result, Err(VaultError::SecretNotFound(_))));
}

#[test]
fn update_reseals_with_fresh_salt_and_nonce() {
    let mut vault = unlocked_vault();

    let id = vault.encrypt_and_store("db-url", "value-1").expect("store");
    let before = vault.store().get(&id).expect("record");

    vault.update_secret(&id, "value-2").expect("update");
    let after = vault.store().get(&id).expect("record");

    assert_eq!(before.created_at, after.created_at);
    assert_ne!(before.salt, after.salt, "re-encryption must use a new salt");
    assert_ne!(before.nonce, after.nonce, "re-encryption must use a new nonce");
    assert_ne!(before.ciphertext, after.ciphertext);

    assert_eq!(vault.fetch_and_decrypt(&id).unwrap(), "value-2");
}

#[test]
fn delete_removes_the_record() {
    let mut vault = unlocked_vault();

    let id = vault.encrypt_and_store("to-delete", "bye").expect("store");
    vault.delete_secret(&id).expect("delete");

    assert!(matches!(
        vault.fetch_and_decrypt(&id),
        Err(VaultError::SecretNotFound(_))
    ));
    assert!(matches!(
        vault.delete_secret(&id),
        Err(VaultError::SecretNotFound(_))
    ));
}

#[test]
fn list_secrets_returns_sorted_metadata() {
    let mut vault = unlocked_vault();

    vault.encrypt_and_store("zebra", "z").unwrap();
    vault.encrypt_and_store("alpha", "a").unwrap();
    vault.encrypt_and_store("middle", "m").unwrap();

    let list = vault.list_secrets().expect("list");
    assert_eq!(list.len(), 3);
    assert_eq!(list[0].label, "alpha");
    assert_eq!(list[1].label, "middle");
    assert_eq!(list[2].label, "zebra");
}

#[test]
fn locked_vault_reports_locked_even_for_bad_labels() {
    let (mut vault, _code) = enrolled_vault();

    // Session liveness is checked before label validation, so a locked
    // vault answers the same way for good and bad labels.
    let result = vault.encrypt_and_store("bad label!", "v");
    assert!(matches!(result, Err(VaultError::VaultLocked)));
}

#[test]
fn foreign_owner_records_are_invisible() {
    // A store shared between two owners: one record already belongs to
    // owner-2 before owner-1's vault is built over the same store.
    let mut store = MemoryStore::new();
    let payload = crypto::seal(b"other-pw", b"their-secret").expect("seal");
    let foreign = SecretRecord::new("owner-2", "their-key", payload);
    let foreign_id = store.put(foreign).expect("put foreign record");

    let mut vault = Vault::new(store, VaultProfile::new("owner-1"), test_config());
    let enrollment = vault.enroll().expect("enroll");
    let secret = TotpSecret::from_base32(&enrollment.secret_base32).unwrap();
    vault
        .unlock(PASSWORD, &code_at(&secret, unix_now()))
        .expect("unlock");

    // owner-1 cannot list the foreign record...
    assert!(vault.list_secrets().unwrap().is_empty());

    // ...and cannot read, re-encrypt, or delete it either.  The
    // mismatch reads as not-found, never as a distinct "forbidden".
    assert!(matches!(
        vault.fetch_and_decrypt(&foreign_id),
        Err(VaultError::SecretNotFound(_))
    ));
    assert!(matches!(
        vault.update_secret(&foreign_id, "overwritten"),
        Err(VaultError::SecretNotFound(_))
    ));
    assert!(matches!(
        vault.delete_secret(&foreign_id),
        Err(VaultError::SecretNotFound(_))
    ));

    // The other owner's ciphertext survives untouched.
    let record = vault.store().get(&foreign_id).expect("still stored");
    assert_eq!(record.owner_ref, "owner-2");
    let plaintext = crypto::open(&record.payload().unwrap(), b"other-pw").unwrap();
    assert_eq!(plaintext, b"their-secret");
}

#[test]
fn invalid_label_is_rejected() {
    let mut vault = unlocked_vault();

    let result = vault.encrypt_and_store("bad label!", "v");
    assert!(matches!(result, Err(VaultError::MalformedInput(_))));

    let result = vault.encrypt_and_store("", "v");
    assert!(matches!(result, Err(VaultError::MalformedInput(_))));
}

#[test]
fn tampered_record_fails_to_decrypt() {
    let mut vault = unlocked_vault();
    let id = vault.encrypt_and_store("api-key", "secret").expect("store");

    // Corrupt one ciphertext byte behind the vault's back.
    let mut record = vault.store().get(&id).expect("record");
    record.ciphertext[0] ^= 0xFF;

    let profile = vault.profile().clone();
    let mut store = vault.into_store();
    store.put(record).expect("put tampered record");

    let mut vault2 = Vault::new(store, profile, test_config());
    let secret = vault2.profile().totp_secret().unwrap();
    vault2
        .unlock(PASSWORD, &code_at(&secret, unix_now()))
        .expect("unlock");

    let result = vault2.fetch_and_decrypt(&id);
    assert!(
        matches!(result, Err(VaultError::AuthenticationFailed)),
        "tampering must fail deterministically, never corrupt silently"
    );
}

// ---------------------------------------------------------------------------
// Persisted record shape
// ---------------------------------------------------------------------------

#[test]
fn record_serializes_with_base64_fields_and_iv_name() {
    let payload = crypto::seal(b"pw", b"value").expect("seal");
    let record = SecretRecord::new("owner-1", "api-key", payload);

    let json = serde_json::to_value(&record).expect("serialize");
    assert!(json.get("iv").is_some(), "nonce must serialize as `iv`");
    assert!(json.get("ciphertext").unwrap().is_string());
    assert!(json.get("salt").unwrap().is_string());

    let back: SecretRecord = serde_json::from_value(json).expect("deserialize");
    assert_eq!(back.nonce, record.nonce);
    assert_eq!(back.ciphertext, record.ciphertext);
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

fn blob_path() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("secrets.blob");
    (dir, path)
}

#[test]
fn file_store_persists_across_reopen() {
    let (_dir, path) = blob_path();

    let payload = crypto::seal(b"pw", b"value").expect("seal");
    let record = SecretRecord::new("owner-1", "api-key", payload);
    let id = record.id;

    let mut store = FileStore::open(&path).expect("open");
    store.put(record).expect("put");
    drop(store);

    let store2 = FileStore::open(&path).expect("reopen");
    let back = store2.get(&id).expect("get");
    assert_eq!(back.label, "api-key");
    assert_eq!(store2.list().unwrap().len(), 1);
}

#[test]
fn file_store_delete_and_not_found() {
    let (_dir, path) = blob_path();
    let mut store = FileStore::open(&path).expect("open");

    let payload = crypto::seal(b"pw", b"value").expect("seal");
    let record = SecretRecord::new("owner-1", "api-key", payload);
    let id = record.id;

    store.put(record).expect("put");
    store.delete(&id).expect("delete");

    assert!(matches!(
        store.get(&id),
        Err(VaultError::SecretNotFound(_))
    ));
    assert!(matches!(
        store.delete(&id),
        Err(VaultError::SecretNotFound(_))
    ));
}

#[test]
fn file_store_rolls_back_when_the_write_fails() {
    let (dir, path) = blob_path();
    let mut store = FileStore::open(&path).expect("open");

    let payload = crypto::seal(b"pw", b"value-1").expect("seal");
    let keeper = SecretRecord::new("owner-1", "keeper", payload);
    let keeper_id = keeper.id;
    store.put(keeper).expect("put");

    // Make further writes impossible: the blob file's directory is gone.
    std::fs::remove_dir_all(dir.path()).expect("remove dir");

    let payload = crypto::seal(b"pw", b"value-2").expect("seal");
    let latecomer = SecretRecord::new("owner-1", "latecomer", payload);
    let late_id = latecomer.id;

    let result = store.put(latecomer);
    assert!(matches!(result, Err(VaultError::StorageUnavailable(_))));
    // The failed insert must not be visible through the handle.
    assert!(matches!(
        store.get(&late_id),
        Err(VaultError::SecretNotFound(_))
    ));

    let result = store.delete(&keeper_id);
    assert!(matches!(result, Err(VaultError::StorageUnavailable(_))));
    // The failed delete must not hide the record still on disk.
    assert!(store.get(&keeper_id).is_ok());
    assert_eq!(store.list().unwrap().len(), 1);
}

#[test]
fn file_store_rejects_foreign_files() {
    let (_dir, path) = blob_path();
    std::fs::write(&path, b"definitely not a blob file").expect("write garbage");

    let result = FileStore::open(&path);
    assert!(matches!(result, Err(VaultError::StorageUnavailable(_))));
}

#[test]
fn vault_works_end_to_end_on_a_file_store() {
    let (_dir, path) = blob_path();

    let store = FileStore::open(&path).expect("open");
    let mut vault = Vault::new(store, VaultProfile::new("owner-1"), test_config());

    let enrollment = vault.enroll().expect("enroll");
    let secret = TotpSecret::from_base32(&enrollment.secret_base32).unwrap();
    vault
        .unlock(PASSWORD, &code_at(&secret, unix_now()))
        .expect("unlock");

    let id = vault
        .encrypt_and_store("api-key", "api-key-123")
        .expect("store");
    let profile = vault.profile().clone();
    drop(vault);

    // A new process: reopen the file, rebuild the vault, unlock, fetch.
    let store = FileStore::open(&path).expect("reopen");
    let mut vault2 = Vault::new(store, profile, test_config());
    vault2
        .unlock(PASSWORD, &code_at(&secret, unix_now()))
        .expect("unlock again");

    assert_eq!(vault2.fetch_and_decrypt(&id).unwrap(), "api-key-123");
}
