//! Vault session protocol.
//!
//! `Vault` is the orchestrating handle the rest of a system talks to.
//! It starts **Locked**: no key material held, no secret readable.
//! `unlock` verifies the one-time code first, then proves the password
//! correct by opening the stored canary record.  Either factor failing
//! collapses into one `AuthenticationFailed` — callers cannot tell
//! which factor was wrong, and failure responses are padded to a
//! minimum latency so timing does not tell them either.
//!
//! An unlocked session caches the passphrase (wiped on lock, expiry, or
//! drop).  It caches the passphrase rather than a derived key because
//! every record carries its own salt — there is no single key that
//! could serve them all.  The cache is the most sensitive object in the
//! process: memory-only, never logged, never persisted.

pub mod profile;

pub use profile::{SecondFactor, VaultProfile};

use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use crate::crypto;
use crate::errors::{Result, VaultError};
use crate::store::{BlobStore, SecretMetadata, SecretRecord};
use crate::totp::{self, Enrollment, ReplayGuard};

/// Fixed marker plaintext sealed into the canary record.  Decrypting it
/// successfully proves a derived key correct without exposing any real
/// secret's plaintext.
const CANARY_PLAINTEXT: &[u8] = b"zkvault:canary:v1";

/// Construction-time configuration for a `Vault`.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Issuer name embedded in provisioning URIs.
    pub issuer: String,

    /// Idle timeout: the session locks this long after the last
    /// successful operation.
    pub session_timeout: Duration,

    /// Minimum wall-clock duration of a failed unlock, padded with
    /// sleep.  Blunts timing-based enumeration of which factor failed.
    pub unlock_latency_floor: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            issuer: "zkvault".to_string(),
            session_timeout: Duration::from_secs(15 * 60),
            unlock_latency_floor: Duration::from_millis(250),
        }
    }
}

/// Transient unlocked-session state.
///
/// Holds the cached passphrase in a zeroize-on-drop wrapper; dropping
/// the session (explicit lock, expiry, vault drop) wipes it.
struct Session {
    passphrase: Zeroizing<Vec<u8>>,
    unlocked_at: DateTime<Utc>,
    deadline: Instant,
}

/// The vault handle.  Generic over the blob store so callers can plug
/// in any persistence backend.
pub struct Vault<S: BlobStore> {
    store: S,
    profile: VaultProfile,
    config: VaultConfig,
    session: Option<Session>,
    replay: ReplayGuard,
}

impl<S: BlobStore> Vault<S> {
    /// Build a locked vault around a store and a (possibly fresh)
    /// profile.
    pub fn new(store: S, profile: VaultProfile, config: VaultConfig) -> Self {
        Self {
            store,
            profile,
            config,
            session: None,
            replay: ReplayGuard::new(),
        }
    }

    // ------------------------------------------------------------------
    // Enrollment
    // ------------------------------------------------------------------

    /// Generate and enroll a one-time code secret for this vault.
    ///
    /// Returns the enrollment artifact (base32 secret + provisioning
    /// URI) — the only time the raw secret is exposed.  The caller must
    /// persist the updated profile and render the URI for the user's
    /// authenticator app, without logging either.
    pub fn enroll(&mut self) -> Result<Enrollment> {
        if matches!(self.profile.second_factor, SecondFactor::Totp { .. }) {
            return Err(VaultError::AlreadyEnrolled);
        }

        let secret = totp::TotpSecret::generate();
        let enrollment = secret.enroll(&self.config.issuer, &self.profile.owner_ref);

        self.profile.second_factor = SecondFactor::Totp {
            secret_base32: enrollment.secret_base32.clone(),
        };

        Ok(enrollment)
    }

    // ------------------------------------------------------------------
    // Unlock / lock
    // ------------------------------------------------------------------

    /// Unlock the vault with the owner's password and a current
    /// one-time code.
    ///
    /// Order of checks: the code first (cheap — no key derivation work
    /// is spent on a garbage code), then the password, proven by
    /// opening the canary record.  On first-time setup (no canary yet)
    /// the canary is created under the submitted password.
    ///
    /// Every failure path is padded to the configured latency floor.
    pub fn unlock(&mut self, password: &str, code: &str) -> Result<()> {
        let started = Instant::now();
        let result = self.try_unlock(password, code);

        if result.is_err() {
            let elapsed = started.elapsed();
            if elapsed < self.config.unlock_latency_floor {
                thread::sleep(self.config.unlock_latency_floor - elapsed);
            }
        }

        result
    }

    fn try_unlock(&mut self, password: &str, code: &str) -> Result<()> {
        // 1. Verify the one-time code within the ±1-step drift window.
        let secret = self.profile.totp_secret()?;
        let step = totp::matching_step(&secret, code, unix_now())?
            .ok_or(VaultError::AuthenticationFailed)?;

        // 2. Reject a code from a step that already unlocked the vault.
        if self.replay.is_replay(step) {
            return Err(VaultError::AuthenticationFailed);
        }

        // 3. Prove the password correct against the canary record, or
        //    create the canary on first-time setup.
        match &self.profile.canary {
            Some(payload) => {
                let mut plaintext = crypto::open(payload, password.as_bytes())?;
                let matches = plaintext == CANARY_PLAINTEXT;
                plaintext.zeroize();
                if !matches {
                    return Err(VaultError::AuthenticationFailed);
                }
            }
            None => {
                let payload = crypto::seal(password.as_bytes(), CANARY_PLAINTEXT)?;
                self.profile.canary = Some(payload);
            }
        }

        // 4. Both factors held — record the step and open the session.
        self.replay.accept(step);
        self.session = Some(Session {
            passphrase: Zeroizing::new(password.as_bytes().to_vec()),
            unlocked_at: Utc::now(),
            deadline: Instant::now() + self.config.session_timeout,
        });

        Ok(())
    }

    /// Lock the vault, wiping the cached passphrase.
    pub fn lock(&mut self) {
        self.session = None;
    }

    /// Whether a live (non-expired) session exists.  Checking does not
    /// refresh the idle timeout.
    pub fn is_unlocked(&mut self) -> bool {
        self.expire_if_due();
        self.session.is_some()
    }

    /// When the current session was opened, if any.
    pub fn unlocked_at(&mut self) -> Option<DateTime<Utc>> {
        self.expire_if_due();
        self.session.as_ref().map(|s| s.unlocked_at)
    }

    // ------------------------------------------------------------------
    // Secret operations (require an unlocked session)
    // ------------------------------------------------------------------

    /// Encrypt `plaintext` under the session passphrase and store it as
    /// a new record.  Fresh salt and nonce are generated inside `seal`.
    pub fn encrypt_and_store(&mut self, label: &str, plaintext: &str) -> Result<Uuid> {
        self.require_unlocked()?;
        Self::validate_label(label)?;

        let payload = crypto::seal(self.passphrase()?, plaintext.as_bytes())?;
        let record = SecretRecord::new(&self.profile.owner_ref, label, payload);

        let id = self.store.put(record)?;
        self.touch();
        Ok(id)
    }

    /// Fetch a record and decrypt it with the session passphrase.
    ///
    /// `SecretNotFound` and `AuthenticationFailed` (tampered record)
    /// stay distinct; storage failures propagate as
    /// `StorageUnavailable`.
    pub fn fetch_and_decrypt(&mut self, id: &Uuid) -> Result<String> {
        // Locked vaults may not even probe record existence.
        self.require_unlocked()?;

        let record = self.get_owned(id)?;
        let payload = record.payload()?;

        let plaintext_bytes = crypto::open(&payload, self.passphrase()?)?;
        self.touch();

        // Convert via from_utf8, which takes ownership.  On error,
        // zeroize the bytes inside the error before discarding.
        String::from_utf8(plaintext_bytes).map_err(|e| {
            let mut bad_bytes = e.into_bytes();
            bad_bytes.zeroize();
            VaultError::MalformedInput("secret value is not valid UTF-8".to_string())
        })
    }

    /// Re-encrypt an existing record with a fresh salt and nonce.
    ///
    /// The old ciphertext is discarded; `created_at` is preserved.
    /// This is the only way a stored record changes.
    pub fn update_secret(&mut self, id: &Uuid, plaintext: &str) -> Result<()> {
        self.require_unlocked()?;

        let mut record = self.get_owned(id)?;

        let payload = crypto::seal(self.passphrase()?, plaintext.as_bytes())?;
        record.reseal(payload);

        self.store.put(record)?;
        self.touch();
        Ok(())
    }

    /// Remove a record permanently.
    pub fn delete_secret(&mut self, id: &Uuid) -> Result<()> {
        self.require_unlocked()?;
        self.get_owned(id)?;
        self.store.delete(id)?;
        self.touch();
        Ok(())
    }

    /// List metadata for this owner's records, sorted by label.  No
    /// ciphertext is touched.
    pub fn list_secrets(&mut self) -> Result<Vec<SecretMetadata>> {
        self.require_unlocked()?;

        let mut list: Vec<SecretMetadata> = self
            .store
            .list()?
            .iter()
            .filter(|r| r.owner_ref == self.profile.owner_ref)
            .map(SecretRecord::metadata)
            .collect();

        list.sort_by(|a, b| a.label.cmp(&b.label));
        self.touch();
        Ok(list)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The enrollment state the caller must persist (owner ref, second
    /// factor, canary).  Re-read it after `enroll` and after the first
    /// unlock, which creates the canary.
    pub fn profile(&self) -> &VaultProfile {
        &self.profile
    }

    /// The vault's configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Borrow the underlying blob store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the vault, returning the store.  The session (and its
    /// cached passphrase) is dropped and wiped.
    pub fn into_store(self) -> S {
        self.store
    }

    // ------------------------------------------------------------------
    // Session plumbing
    // ------------------------------------------------------------------

    /// Drop the session if its idle deadline has passed.
    fn expire_if_due(&mut self) {
        if let Some(session) = &self.session {
            if Instant::now() >= session.deadline {
                self.session = None;
            }
        }
    }

    fn require_unlocked(&mut self) -> Result<()> {
        self.expire_if_due();
        if self.session.is_none() {
            return Err(VaultError::VaultLocked);
        }
        Ok(())
    }

    /// Fetch a record, treating other owners' records as not found.
    ///
    /// A shared store may hold records for several owners; this vault
    /// must not read, re-encrypt, or delete a foreign one.  The
    /// mismatch reports `SecretNotFound` rather than a distinct kind so
    /// foreign ids cannot be probed for existence.
    fn get_owned(&self, id: &Uuid) -> Result<SecretRecord> {
        let record = self.store.get(id)?;
        if record.owner_ref != self.profile.owner_ref {
            return Err(VaultError::SecretNotFound(*id));
        }
        Ok(record)
    }

    /// Borrow the cached passphrase, enforcing session liveness.
    fn passphrase(&mut self) -> Result<&[u8]> {
        self.require_unlocked()?;
        Ok(self
            .session
            .as_ref()
            .map(|s| s.passphrase.as_slice())
            .unwrap_or_default())
    }

    /// Refresh the idle deadline after a successful operation.
    fn touch(&mut self) {
        let deadline = Instant::now() + self.config.session_timeout;
        if let Some(session) = &mut self.session {
            session.deadline = deadline;
        }
    }

    /// Validate that a record label is safe.
    ///
    /// Allowed: ASCII letters, digits, underscores, hyphens, periods.
    /// Must be non-empty and at most 256 characters.
    fn validate_label(label: &str) -> Result<()> {
        if label.is_empty() {
            return Err(VaultError::MalformedInput("label cannot be empty".into()));
        }
        if label.len() > 256 {
            return Err(VaultError::MalformedInput(
                "label cannot exceed 256 characters".into(),
            ));
        }
        if !label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
        {
            return Err(VaultError::MalformedInput(format!(
                "label '{label}' contains invalid characters — only ASCII letters, digits, underscores, hyphens, and periods are allowed"
            )));
        }
        Ok(())
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
