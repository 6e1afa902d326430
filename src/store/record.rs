//! Secret Record and metadata types held by a blob store.
//!
//! A record is ciphertext plus the non-secret material needed to decrypt
//! it later (nonce, salt) and bookkeeping metadata.  Byte fields use
//! custom serde helpers so they serialize as base64 strings in JSON
//! rather than raw byte arrays; the nonce serializes under the
//! conventional name `iv`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::EncryptedPayload;
use crate::errors::Result;

/// A single encrypted secret as the blob store sees it.
///
/// Meaningless without the owner's password: the store never holds
/// plaintext or the derived key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRecord {
    /// Stable identifier assigned at creation.
    pub id: Uuid,

    /// Opaque reference to the vault owner.
    pub owner_ref: String,

    /// Human-readable label (e.g. "stripe-api-key").
    pub label: String,

    /// Ciphertext with the 16-byte GCM tag appended (base64 in JSON).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub ciphertext: Vec<u8>,

    /// The 12-byte nonce used for this encryption (base64, as `iv`).
    #[serde(
        rename = "iv",
        serialize_with = "base64_encode",
        deserialize_with = "base64_decode"
    )]
    pub nonce: Vec<u8>,

    /// The 16-byte key-derivation salt for this record (base64).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,

    /// When this record was first created.
    pub created_at: DateTime<Utc>,

    /// When this record was last re-encrypted.
    pub updated_at: DateTime<Utc>,
}

impl SecretRecord {
    /// Build a brand-new record around an encrypted payload.
    pub fn new(owner_ref: &str, label: &str, payload: EncryptedPayload) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_ref: owner_ref.to_string(),
            label: label.to_string(),
            ciphertext: payload.ciphertext,
            nonce: payload.nonce,
            salt: payload.salt,
            created_at: now,
            updated_at: now,
        }
    }

    /// View the record's cryptographic fields as a payload for `open`.
    ///
    /// Validates the fixed-length fields so malformed stored data is
    /// rejected before any crypto runs.
    pub fn payload(&self) -> Result<EncryptedPayload> {
        let payload = EncryptedPayload {
            ciphertext: self.ciphertext.clone(),
            nonce: self.nonce.clone(),
            salt: self.salt.clone(),
        };
        payload.validate()?;
        Ok(payload)
    }

    /// Replace the cryptographic fields with a freshly sealed payload.
    ///
    /// The old ciphertext is discarded; `created_at` is preserved and
    /// `updated_at` bumped.  This is the only mutation path for a record.
    pub fn reseal(&mut self, payload: EncryptedPayload) {
        self.ciphertext = payload.ciphertext;
        self.nonce = payload.nonce;
        self.salt = payload.salt;
        self.updated_at = Utc::now();
    }

    /// Metadata-only view (no ciphertext).
    pub fn metadata(&self) -> SecretMetadata {
        SecretMetadata {
            id: self.id,
            label: self.label.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Lightweight metadata about a stored secret.
///
/// Returned by listing operations so callers can display labels and
/// timestamps without touching any ciphertext.
#[derive(Debug, Clone)]
pub struct SecretMetadata {
    pub id: Uuid,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let encoded = BASE64.encode(data);
    serializer.serialize_str(&encoded)
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}
