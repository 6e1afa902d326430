//! AES-256-GCM authenticated encryption under a password-derived key.
//!
//! Each call to `seal` generates a fresh random 16-byte salt and 12-byte
//! nonce, derives a key from (password, salt), and encrypts.  Generating
//! both values fresh on every call structurally prevents nonce reuse
//! under a given key.
//!
//! `open` re-derives the key from the stored salt and performs
//! authenticated decryption.  A wrong password, a tampered ciphertext,
//! and a mismatched nonce/salt are indistinguishable: all of them fail
//! the GCM tag check and surface as `AuthenticationFailed`, and no
//! plaintext byte is released before the tag verifies.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use serde::{Deserialize, Serialize};

use crate::crypto::kdf::{self, SALT_LEN};
use crate::errors::{Result, VaultError};
use crate::store::record::{base64_decode, base64_encode};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// The output of one `seal` call: everything needed to decrypt later
/// except the password.
///
/// All three fields are opaque without the password; they are safe to
/// hand to a blob store.  Byte fields serialize as base64 strings in
/// JSON (the nonce under the conventional name `iv`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Ciphertext with the 16-byte GCM tag appended.
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub ciphertext: Vec<u8>,

    /// The 12-byte nonce used for this encryption.
    #[serde(
        rename = "iv",
        serialize_with = "base64_encode",
        deserialize_with = "base64_decode"
    )]
    pub nonce: Vec<u8>,

    /// The 16-byte salt used to derive this payload's key.
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,
}

impl EncryptedPayload {
    /// Check the fixed-length fields before any cryptographic use.
    ///
    /// Records can arrive from an untrusted store; wrong-length nonce or
    /// salt is malformed input, not an authentication failure.
    pub fn validate(&self) -> Result<()> {
        if self.nonce.len() != NONCE_LEN {
            return Err(VaultError::MalformedInput(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                self.nonce.len()
            )));
        }
        if self.salt.len() != SALT_LEN {
            return Err(VaultError::MalformedInput(format!(
                "salt must be {SALT_LEN} bytes, got {}",
                self.salt.len()
            )));
        }
        Ok(())
    }
}

/// Encrypt `plaintext` under a key derived from `password`.
///
/// Generates a fresh salt and nonce from the OS random source on every
/// call.  No side effects beyond that — storage is the caller's job.
pub fn seal(password: &[u8], plaintext: &[u8]) -> Result<EncryptedPayload> {
    // 1. Fresh salt, fresh key.
    let salt = kdf::generate_salt();
    let key = kdf::derive_key(password, &salt);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    // 2. Fresh random 12-byte nonce.
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    // 3. Encrypt and authenticate.
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| VaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    Ok(EncryptedPayload {
        ciphertext,
        nonce: nonce.to_vec(),
        salt: salt.to_vec(),
    })
}

/// Decrypt a payload produced by `seal`.
///
/// Fails with `AuthenticationFailed` when the password is wrong, the
/// ciphertext was tampered with, or nonce/salt/ciphertext have been
/// mismatched — deliberately without distinguishing which.
pub fn open(payload: &EncryptedPayload, password: &[u8]) -> Result<Vec<u8>> {
    payload.validate()?;

    // Re-derive the key from the stored salt.
    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&payload.salt);
    let key = kdf::derive_key(password, &salt);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| VaultError::AuthenticationFailed)?;

    let nonce = Nonce::from_slice(&payload.nonce);

    // Decrypt and verify the auth tag.
    cipher
        .decrypt(nonce, payload.ciphertext.as_slice())
        .map_err(|_| VaultError::AuthenticationFailed)
}
