//! XChaCha20-Poly1305 implementation of the [`Cipher`] trait.

#[allow(deprecated)] // upstream generic-array 0.x deprecation
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use {rand::RngCore, zeroize::Zeroizing};

use crate::{IV_LEN, KEY_LEN, TAG_LEN, error::VaultError, traits::Cipher};

/// Version tag for the XChaCha20-Poly1305 cipher.
pub const VERSION_TAG: u8 = 0x01;

/// XChaCha20-Poly1305 AEAD cipher.
///
/// The 192-bit nonce makes random nonces safe for any realistic number of
/// messages under one key, which is what lets every record pick its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct XChaCha20Poly1305Cipher;

impl Cipher for XChaCha20Poly1305Cipher {
    fn version_tag(&self) -> u8 {
        VERSION_TAG
    }

    fn generate_iv(&self) -> [u8; IV_LEN] {
        let mut iv = [0u8; IV_LEN];
        rand::rng().fill_bytes(&mut iv);
        iv
    }

    #[allow(deprecated)]
    fn encrypt(
        &self,
        key: &[u8; KEY_LEN],
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        let cipher = XChaCha20Poly1305::new(key.into());
        cipher
            .encrypt(XNonce::from_slice(iv), Payload {
                msg: plaintext,
                aad,
            })
            .map_err(|e| VaultError::CipherError(e.to_string()))
    }

    #[allow(deprecated)]
    fn decrypt(
        &self,
        key: &[u8; KEY_LEN],
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        if ciphertext.len() < TAG_LEN {
            return Err(VaultError::DecryptionFailed);
        }

        let cipher = XChaCha20Poly1305::new(key.into());
        cipher
            .decrypt(XNonce::from_slice(iv), Payload {
                msg: ciphertext,
                aad,
            })
            .map(Zeroizing::new)
            .map_err(|_| VaultError::DecryptionFailed)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; KEY_LEN] = [0x42; KEY_LEN];

    #[test]
    fn round_trip_with_aad() {
        let cipher = XChaCha20Poly1305Cipher;
        let iv = cipher.generate_iv();

        let encrypted = cipher.encrypt(&KEY, &iv, b"consent form", b"ctx").unwrap();
        assert_eq!(encrypted.len(), b"consent form".len() + TAG_LEN);

        let decrypted = cipher.decrypt(&KEY, &iv, &encrypted, b"ctx").unwrap();
        assert_eq!(decrypted.as_slice(), b"consent form");
    }

    #[test]
    fn wrong_key_fails() {
        let cipher = XChaCha20Poly1305Cipher;
        let iv = cipher.generate_iv();

        let encrypted = cipher.encrypt(&KEY, &iv, b"secret", b"").unwrap();
        let result = cipher.decrypt(&[0x43; KEY_LEN], &iv, &encrypted, b"");
        assert!(matches!(result, Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn wrong_iv_fails() {
        let cipher = XChaCha20Poly1305Cipher;
        let iv = cipher.generate_iv();
        let mut other = iv;
        other[0] ^= 0x01;

        let encrypted = cipher.encrypt(&KEY, &iv, b"secret", b"").unwrap();
        assert!(cipher.decrypt(&KEY, &other, &encrypted, b"").is_err());
    }

    #[test]
    fn wrong_aad_fails() {
        let cipher = XChaCha20Poly1305Cipher;
        let iv = cipher.generate_iv();

        let encrypted = cipher.encrypt(&KEY, &iv, b"secret", b"correct").unwrap();
        assert!(cipher.decrypt(&KEY, &iv, &encrypted, b"wrong").is_err());
    }

    #[test]
    fn too_short_ciphertext_fails() {
        let cipher = XChaCha20Poly1305Cipher;
        let iv = cipher.generate_iv();

        let result = cipher.decrypt(&KEY, &iv, &[0u8; TAG_LEN - 1], b"");
        assert!(matches!(result, Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn ivs_are_not_repeated() {
        let cipher = XChaCha20Poly1305Cipher;
        assert_ne!(cipher.generate_iv(), cipher.generate_iv());
    }

    #[test]
    fn empty_plaintext_round_trip() {
        let cipher = XChaCha20Poly1305Cipher;
        let iv = cipher.generate_iv();

        let encrypted = cipher.encrypt(&KEY, &iv, b"", b"").unwrap();
        let decrypted = cipher.decrypt(&KEY, &iv, &encrypted, b"").unwrap();
        assert!(decrypted.is_empty());
    }
}
