//! Client-side end-to-end encryption vault.
//!
//! A practice owns one X25519 keypair. The private key is wrapped with a
//! password-derived KEK (Argon2id) and only that wrapped form leaves the
//! client. Records are hybrid-encrypted: a fresh session key encrypts the
//! data with XChaCha20-Poly1305 and is itself sealed to the practice public
//! key. The [`Vault`] holds the unwrapped private key in memory for one
//! session and is the only place it ever lives.
//!
//! Trait-based [`Cipher`] design allows swapping the symmetric backend.

pub mod encoding;
pub mod error;
pub mod hybrid;
pub mod kdf;
pub mod key_wrap;
pub mod keys;
#[cfg(feature = "metrics")]
mod telemetry;
pub mod traits;
pub mod vault;
pub mod xchacha20;

pub use {
    error::VaultError,
    hybrid::{BlobMetadata, EncryptedBlob, EncryptedPayload},
    kdf::KdfParams,
    key_wrap::WrappedPrivateKey,
    keys::{KeyPair, PrivateKey, PublicKey, PublicKeyJwk, generate_key_pair},
    traits::Cipher,
    vault::{KeySetup, Vault, VaultOptions, VaultStatus},
    xchacha20::XChaCha20Poly1305Cipher,
};

/// Size of every symmetric key (KEK, session key) and of X25519 keys.
pub const KEY_LEN: usize = 32;

/// Size of an Argon2id salt.
pub const SALT_LEN: usize = 16;

/// Size of an XChaCha20-Poly1305 nonce.
pub const IV_LEN: usize = 24;

/// Size of a Poly1305 authentication tag.
pub const TAG_LEN: usize = 16;

/// Size of a wrapped private key: the 32-byte secret plus its tag.
pub const WRAPPED_KEY_LEN: usize = KEY_LEN + TAG_LEN;

/// Size of a sealed session key: `[ephemeral pk][iv][key + tag]`.
pub const SEALED_KEY_LEN: usize = KEY_LEN + IV_LEN + KEY_LEN + TAG_LEN;
