//! Cipher trait for swappable authenticated encryption backends.

use zeroize::Zeroizing;

use crate::{IV_LEN, KEY_LEN, error::VaultError};

/// Trait for authenticated encryption with associated data (AEAD).
///
/// Unlike a self-framing blob, the nonce travels as its own field in every
/// wire record (`iv`), so it is passed in explicitly. Each implementation
/// has a unique version tag stored alongside the ciphertext, enabling future
/// cipher migrations.
pub trait Cipher: Send + Sync {
    /// Unique identifier for this cipher (stored as `version` on the wire).
    fn version_tag(&self) -> u8;

    /// Fresh random nonce. Never reused across encryptions.
    fn generate_iv(&self) -> [u8; IV_LEN];

    /// Encrypt `plaintext` under `key` and `iv`, authenticating `aad`.
    ///
    /// Returns `ciphertext || tag`.
    fn encrypt(
        &self,
        key: &[u8; KEY_LEN],
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, VaultError>;

    /// Decrypt output of [`encrypt`](Self::encrypt).
    ///
    /// Any authentication failure is [`VaultError::DecryptionFailed`].
    fn decrypt(
        &self,
        key: &[u8; KEY_LEN],
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, VaultError>;
}
