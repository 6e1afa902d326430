//! One-time code secrets and enrollment output.
//!
//! A `TotpSecret` is 20 random bytes (160 bits).  It is shared with the
//! user's authenticator app exactly once, at enrollment, as an unpadded
//! base32 string inside an `otpauth://totp/...` provisioning URI.  After
//! that it is only ever used to compute expected codes.

use base32::Alphabet;
use rand::RngCore;
use zeroize::Zeroize;

use crate::errors::{Result, VaultError};
use crate::totp::code::{DIGITS, PERIOD_SECS};

/// Length of a generated secret in bytes (160 bits, per RFC 4226's
/// recommended minimum).
pub const SECRET_LEN: usize = 20;

/// Base32 alphabet for secrets: RFC 4648, no padding on output.
const BASE32_ALPHABET: Alphabet = Alphabet::Rfc4648 { padding: false };

/// A shared one-time code secret, zeroed on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct TotpSecret {
    bytes: Vec<u8>,
}

/// Everything the caller needs to enroll an authenticator app.
///
/// This is the only place the raw secret leaves the library.  The caller
/// must persist the secret securely and must not log either field.
#[derive(Debug, Clone)]
pub struct Enrollment {
    /// The raw secret in unpadded base32.
    pub secret_base32: String,

    /// An `otpauth://totp/...` URI suitable for rendering as a QR code.
    pub provisioning_uri: String,
}

impl TotpSecret {
    /// Generate a new random 160-bit secret.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; SECRET_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Rebuild a secret from its base32 text form.
    ///
    /// Accepts both padded and unpadded input — authenticator ecosystems
    /// disagree on trailing `=`.
    pub fn from_base32(encoded: &str) -> Result<Self> {
        let trimmed = encoded.trim_end_matches('=');
        let bytes = base32::decode(BASE32_ALPHABET, trimmed)
            .ok_or_else(|| VaultError::MalformedInput("invalid base32 secret".into()))?;
        if bytes.is_empty() {
            return Err(VaultError::MalformedInput("empty one-time code secret".into()));
        }
        Ok(Self { bytes })
    }

    /// The secret in unpadded base32.
    pub fn to_base32(&self) -> String {
        base32::encode(BASE32_ALPHABET, &self.bytes)
    }

    /// Access the raw secret bytes (HMAC key for code computation).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Build the enrollment artifact for this secret.
    ///
    /// The URI follows the de-facto Key Uri Format:
    /// `otpauth://totp/<issuer>:<account>?secret=...&issuer=...`
    /// with explicit algorithm (SHA1), digits (6), and period (30).
    pub fn enroll(&self, issuer: &str, account: &str) -> Enrollment {
        let secret_base32 = self.to_base32();
        let provisioning_uri = format!(
            "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
            uri_encode(issuer),
            uri_encode(account),
            secret_base32,
            uri_encode(issuer),
            DIGITS,
            PERIOD_SECS,
        );
        Enrollment {
            secret_base32,
            provisioning_uri,
        }
    }
}

/// Percent-encode everything outside the URI unreserved set.
///
/// Issuer and account labels are caller-supplied free text; base32
/// secrets never need encoding.
fn uri_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
