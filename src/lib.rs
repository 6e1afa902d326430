//! Zero-knowledge secret vault.
//!
//! Secrets are encrypted with AES-256-GCM under a key derived from the
//! user's password (PBKDF2-HMAC-SHA256, 600 000 rounds, fresh salt per
//! encryption).  Vault access is gated behind a time-based one-time code
//! (TOTP) verified alongside the password during unlock.
//!
//! The library knows nothing about HTTP, cookies, or UI.  Persistence
//! goes through the [`store::BlobStore`] trait, which only ever sees
//! ciphertext — plaintext and derived keys never leave process memory.
//!
//! All cryptographic operations are synchronous and CPU-bound.  The
//! 600 000-round key derivation is the expensive one; callers on an
//! async runtime should run unlock/encrypt/decrypt on a blocking thread
//! (e.g. `spawn_blocking`).

pub mod crypto;
pub mod errors;
pub mod session;
pub mod store;
pub mod totp;

pub use errors::{Result, VaultError};
pub use session::{Vault, VaultConfig, VaultProfile};
pub use store::{BlobStore, SecretRecord};
