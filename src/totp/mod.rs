//! Time-based one-time codes (RFC 6238).
//!
//! This module provides:
//! - secret generation, base32 encoding, and provisioning URIs (`secret`)
//! - code computation and drift-tolerant verification (`code`)

pub mod code;
pub mod secret;

pub use code::{code_at, matching_step, verify, verify_at, ReplayGuard, DIGITS, PERIOD_SECS};
pub use secret::{Enrollment, TotpSecret, SECRET_LEN};
