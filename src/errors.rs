use thiserror::Error;
use uuid::Uuid;

/// All errors that can occur in zkvault.
///
/// Wrong password, wrong one-time code, and tampered ciphertext all
/// collapse into `AuthenticationFailed` so callers (and attackers)
/// cannot tell which factor failed.  Storage failures stay distinct so
/// callers can retry them — authentication failures must never be
/// retried automatically.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Authentication (collapsed, oracle-free) ---
    #[error("invalid password or code")]
    AuthenticationFailed,

    // --- Input validation (rejected before any crypto runs) ---
    #[error("malformed input: {0}")]
    MalformedInput(String),

    // --- Internal crypto failures (not caller-correctable) ---
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    // --- Session state ---
    #[error("vault is locked — unlock with password and one-time code first")]
    VaultLocked,

    #[error("no one-time code secret enrolled for this vault")]
    SecondFactorNotEnrolled,

    #[error("a one-time code secret is already enrolled for this vault")]
    AlreadyEnrolled,

    // --- Storage ---
    #[error("secret {0} not found")]
    SecretNotFound(Uuid),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// Convenience type alias for zkvault results.
pub type Result<T> = std::result::Result<T, VaultError>;
