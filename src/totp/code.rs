//! One-time code computation and verification.
//!
//! Standard TOTP (RFC 6238) over HMAC-SHA1: the current Unix time is
//! divided into 30-second steps, the step counter is MACed as 8
//! big-endian bytes, and the result is dynamically truncated to a
//! 6-digit decimal code.
//!
//! Verification accepts the current step plus the immediately preceding
//! and following steps (a ±1-period window) to tolerate clock drift
//! between the authenticator and this host.  That bounds the attack
//! surface to at most three valid codes at any instant.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::errors::{Result, VaultError};
use crate::totp::secret::TotpSecret;

/// Time-step length in seconds.
pub const PERIOD_SECS: u64 = 30;

/// Number of decimal digits in a code.
pub const DIGITS: u32 = 6;

/// Compute the 6-digit code for the time step containing `unix_time`.
pub fn code_at(secret: &TotpSecret, unix_time: u64) -> String {
    code_for_step(secret, unix_time / PERIOD_SECS)
}

/// Verify a submitted code against the current system time.
///
/// Returns `Ok(true)` iff the code matches the current time step or one
/// of its immediate neighbours; `Ok(false)` for a well-formed code that
/// matches nothing in the window.  Only malformed input is an error.
pub fn verify(secret: &TotpSecret, submitted: &str) -> Result<bool> {
    verify_at(secret, submitted, unix_now())
}

/// Verify a submitted code at an explicit Unix time.
pub fn verify_at(secret: &TotpSecret, submitted: &str, unix_time: u64) -> Result<bool> {
    Ok(matching_step(secret, submitted, unix_time)?.is_some())
}

/// Find the time step within the ±1 window whose code matches.
///
/// Returns the matched step number so callers can reject a code that was
/// already accepted for the same step (anti-replay).  Comparison is
/// constant-time per candidate; all three candidates are always checked
/// so a match does not change the timing profile.
pub fn matching_step(secret: &TotpSecret, submitted: &str, unix_time: u64) -> Result<Option<u64>> {
    validate_code(submitted)?;

    let step = unix_time / PERIOD_SECS;
    let mut matched: Option<u64> = None;

    // Previous, current, next — skipping the underflowing step at t < 30s.
    for candidate in [step.checked_sub(1), Some(step), step.checked_add(1)]
        .into_iter()
        .flatten()
    {
        let expected = code_for_step(secret, candidate);
        let is_match: bool = expected.as_bytes().ct_eq(submitted.as_bytes()).into();
        if is_match && matched.is_none() {
            matched = Some(candidate);
        }
    }

    Ok(matched)
}

/// Tracks the last accepted time step so a code cannot be replayed
/// within its validity window.
///
/// The session protocol records a step here only after a *complete*
/// unlock succeeds, so a user who mistyped their password may retry
/// with the same code.
#[derive(Debug, Default)]
pub struct ReplayGuard {
    last_accepted_step: Option<u64>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `step` was already accepted.
    pub fn is_replay(&self, step: u64) -> bool {
        self.last_accepted_step.is_some_and(|last| step <= last)
    }

    /// Record a successfully used step.
    pub fn accept(&mut self, step: u64) {
        if self.last_accepted_step.map_or(true, |last| step > last) {
            self.last_accepted_step = Some(step);
        }
    }
}

/// HOTP (RFC 4226) for a single counter value, truncated to 6 digits.
fn code_for_step(secret: &TotpSecret, step: u64) -> String {
    // HMAC-SHA1 keys of any length are valid; new_from_slice only fails
    // for block-size issues that cannot arise with SHA-1.
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA1 accepts any key length");
    mac.update(&step.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation: low nibble of the last byte picks a 4-byte
    // window; mask the sign bit; reduce to 6 decimal digits.
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    format!("{:06}", binary % 10u32.pow(DIGITS))
}

/// Reject anything that is not exactly six ASCII digits.
fn validate_code(code: &str) -> Result<()> {
    if code.len() != DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VaultError::MalformedInput(format!(
            "one-time code must be exactly {DIGITS} digits"
        )));
    }
    Ok(())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
