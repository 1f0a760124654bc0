//! Private key wrapping / unwrapping using the [`Cipher`] trait.
//!
//! The private key is encrypted with a KEK derived from the master password.
//! The AAD binds a fixed domain label plus the KDF parameters, so a record
//! whose stored work factor was altered fails authentication like any other
//! tampering.

use zeroize::Zeroizing;

use crate::{
    IV_LEN, KEY_LEN, SALT_LEN, WRAPPED_KEY_LEN,
    encoding::b64_array,
    error::VaultError,
    kdf::{self, KdfParams},
    keys::PrivateKey,
    traits::Cipher,
};

/// AAD domain label for key wrapping, distinct from payload encryption.
const WRAP_AAD: &[u8] = b"praxis-key-wrap";

/// The only persisted representation of a practice private key.
///
/// Opaque to the server, which stores and returns it unmodified.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedPrivateKey {
    pub version: u8,
    pub kdf: KdfParams,
    #[serde(with = "b64_array")]
    pub salt: [u8; SALT_LEN],
    #[serde(with = "b64_array")]
    pub iv: [u8; IV_LEN],
    #[serde(with = "b64_array")]
    pub ciphertext: [u8; WRAPPED_KEY_LEN],
}

fn wrap_aad(params: &KdfParams) -> Vec<u8> {
    let mut aad = Vec::with_capacity(WRAP_AAD.len() + 12);
    aad.extend_from_slice(WRAP_AAD);
    aad.extend_from_slice(&params.m_cost.to_be_bytes());
    aad.extend_from_slice(&params.t_cost.to_be_bytes());
    aad.extend_from_slice(&params.p_cost.to_be_bytes());
    aad
}

/// Wrap (encrypt) a private key under a password.
///
/// Every call draws a fresh salt and iv, so wrapping the same key twice
/// with the same password never reuses a KEK/nonce pair.
pub fn wrap_private_key<C: Cipher>(
    cipher: &C,
    key: &PrivateKey,
    password: &str,
    params: &KdfParams,
) -> Result<WrappedPrivateKey, VaultError> {
    let salt = kdf::generate_salt();
    let kek = kdf::derive_key(password, &salt, params)?;
    let iv = cipher.generate_iv();

    let exported = key.export();
    let encrypted = cipher.encrypt(&kek, &iv, exported.as_slice(), &wrap_aad(params))?;
    let ciphertext: [u8; WRAPPED_KEY_LEN] = encrypted.try_into().map_err(|v: Vec<u8>| {
        VaultError::CipherError(format!(
            "wrapped key has wrong length: {} (expected {WRAPPED_KEY_LEN})",
            v.len()
        ))
    })?;

    Ok(WrappedPrivateKey {
        version: cipher.version_tag(),
        kdf: *params,
        salt,
        iv,
        ciphertext,
    })
}

/// Unwrap (decrypt) a private key with the password it was wrapped under.
///
/// Apart from an empty password, every failure is reported as
/// [`VaultError::WrongPasswordOrCorruptData`] so callers cannot tell which
/// part of the record, or the password, was wrong.
pub fn unwrap_private_key<C: Cipher>(
    cipher: &C,
    wrapped: &WrappedPrivateKey,
    password: &str,
) -> Result<PrivateKey, VaultError> {
    if password.is_empty() {
        return Err(VaultError::InvalidInput("password must not be empty".into()));
    }
    if wrapped.version != cipher.version_tag() {
        return Err(VaultError::WrongPasswordOrCorruptData);
    }

    let kek = kdf::derive_key(password, &wrapped.salt, &wrapped.kdf)
        .map_err(|_| VaultError::WrongPasswordOrCorruptData)?;

    let plaintext = cipher
        .decrypt(&kek, &wrapped.iv, &wrapped.ciphertext, &wrap_aad(&wrapped.kdf))
        .map_err(|_| VaultError::WrongPasswordOrCorruptData)?;

    let bytes: Zeroizing<[u8; KEY_LEN]> = Zeroizing::new(
        plaintext
            .as_slice()
            .try_into()
            .map_err(|_| VaultError::WrongPasswordOrCorruptData)?,
    );
    Ok(PrivateKey::from_bytes(&bytes))
}
