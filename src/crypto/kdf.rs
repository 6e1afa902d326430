//! Password-based key derivation using PBKDF2-HMAC-SHA256.
//!
//! The iteration count is a fixed constant, high enough to make offline
//! brute-force expensive while staying tolerable for interactive unlock
//! latency.  Derivation is deterministic: the same (password, salt) pair
//! always yields the same key, so the salt is stored alongside each
//! ciphertext for later re-derivation.  A wrong password does not fail
//! here — it simply produces a different key, which surfaces downstream
//! as an authentication failure during decryption.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

/// Length of the salt in bytes (128 bits).
pub const SALT_LEN: usize = 16;

/// Length of the derived key in bytes (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 600_000;

/// Derive a 32-byte encryption key from a password and salt.
///
/// Always succeeds; this is the expensive call in the library (600 000
/// HMAC-SHA256 rounds), so callers on an event-loop runtime should
/// offload it to a blocking thread.
pub fn derive_key(password: &[u8], salt: &[u8; SALT_LEN]) -> DerivedKey {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, PBKDF2_ITERATIONS, &mut key);

    let derived = DerivedKey::new(key);
    key.zeroize();
    derived
}

/// Generate a cryptographically random 16-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// A wrapper around a 32-byte derived key that automatically zeroes
/// its memory when dropped.
///
/// The key is ephemeral: it exists only for the duration of a single
/// encrypt/decrypt call and must never be persisted or logged.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct DerivedKey {
    bytes: [u8; KEY_LEN],
}

impl DerivedKey {
    /// Create a new `DerivedKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes (e.g. to build an AES-256-GCM cipher).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}
