//! Vault error types.

/// Errors produced by vault operations.
///
/// Unwrap and decrypt failures are deliberately coarse: a wrong password,
/// a tampered blob and corrupted storage all look the same to the caller.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Malformed arguments (empty password, wrong-size salt, bad wire shape).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The platform could not produce a keypair (entropy failure).
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Unwrapping the private key failed authentication.
    #[error("incorrect password or corrupted key data")]
    WrongPasswordOrCorruptData,

    /// A payload could not be opened (wrong key or tampered data).
    #[error("decryption failed")]
    DecryptionFailed,

    /// The payload decrypted but does not match the expected encoding.
    #[error("decrypted payload could not be deserialized: {0}")]
    DeserializationFailed(String),

    /// The vault is locked and must be unlocked first.
    #[error("vault is locked")]
    Locked,

    /// The vault already holds an unlocked key.
    #[error("vault is already unlocked")]
    AlreadyUnlocked,

    /// Another unlock or lock is in flight.
    #[error("vault is busy with another unlock or lock")]
    Busy,

    /// The operation was interrupted before completing; nothing was kept.
    #[error("operation was cancelled")]
    Cancelled,

    /// Encryption failed inside the AEAD backend.
    #[error("cipher error: {0}")]
    CipherError(String),
}

impl VaultError {
    /// Whether the caller can recover by prompting the user to unlock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked)
    }

    /// Generic text suitable for end users. Never includes detail.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "The request was not valid.",
            Self::KeyGeneration(_) => "Encryption keys could not be created. Please try again later.",
            Self::WrongPasswordOrCorruptData => "Incorrect password.",
            Self::DecryptionFailed | Self::DeserializationFailed(_) => {
                "This record could not be decrypted."
            },
            Self::Locked => "The vault is locked. Enter your password to continue.",
            Self::AlreadyUnlocked => "The vault is already unlocked.",
            Self::Busy => "The vault is busy. Please wait a moment.",
            Self::Cancelled => "The operation was cancelled.",
            Self::CipherError(_) => "Encryption failed.",
        }
    }
}
