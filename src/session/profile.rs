//! Per-owner enrollment state.
//!
//! A `VaultProfile` is everything the caller must persist between
//! processes for unlock to work: the owner reference, the enrolled
//! one-time code secret, and the canary record.  It holds no plaintext
//! secrets other than the TOTP secret itself, which the caller is
//! responsible for storing securely (and must not log).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::EncryptedPayload;
use crate::errors::{Result, VaultError};
use crate::totp::TotpSecret;

/// The second authentication factor, as a typed capability rather than
/// an ad hoc presence check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecondFactor {
    /// No one-time code secret enrolled yet; unlock is impossible.
    Unenrolled,

    /// A TOTP secret, stored in its base32 text form.
    Totp { secret_base32: String },
}

/// Serializable enrollment state for one vault owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultProfile {
    /// Opaque reference to the vault owner; copied onto every record.
    pub owner_ref: String,

    /// The enrolled second factor.
    pub second_factor: SecondFactor,

    /// Verification record: a fixed marker plaintext sealed under the
    /// owner's password.  Its salt is the stored verification-salt used
    /// to prove a submitted password correct during unlock.  `None`
    /// until the first successful unlock creates it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary: Option<EncryptedPayload>,

    /// When this profile was created.
    pub created_at: DateTime<Utc>,
}

impl VaultProfile {
    /// Start a fresh, unenrolled profile.
    pub fn new(owner_ref: &str) -> Self {
        Self {
            owner_ref: owner_ref.to_string(),
            second_factor: SecondFactor::Unenrolled,
            canary: None,
            created_at: Utc::now(),
        }
    }

    /// Decode the enrolled TOTP secret.
    ///
    /// Fails with `SecondFactorNotEnrolled` when no secret has been
    /// enrolled, or `MalformedInput` if the stored encoding is corrupt.
    pub fn totp_secret(&self) -> Result<TotpSecret> {
        match &self.second_factor {
            SecondFactor::Totp { secret_base32 } => TotpSecret::from_base32(secret_base32),
            SecondFactor::Unenrolled => Err(VaultError::SecondFactorNotEnrolled),
        }
    }
}
