//! Practice keypair: X25519 public key (shareable) and private key capsule.

use {
    base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD},
    rand::TryRngCore,
    x25519_dalek::{SharedSecret, StaticSecret},
    zeroize::Zeroizing,
};

use crate::{KEY_LEN, error::VaultError};

const JWK_KTY: &str = "OKP";
const JWK_CRV: &str = "X25519";

/// Public half of a practice keypair.
///
/// Safe to store and transmit in plaintext. Serializes as a JSON Web Key.
#[derive(Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(into = "PublicKeyJwk", try_from = "PublicKeyJwk")]
pub struct PublicKey(x25519_dalek::PublicKey);

/// JSON Web Key form of a [`PublicKey`] (RFC 8037 `OKP` / `X25519`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PublicKeyJwk {
    pub kty: String,
    pub crv: String,
    /// Raw key bytes, base64url without padding.
    pub x: String,
}

impl PublicKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(x25519_dalek::PublicKey::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        self.0.as_bytes()
    }

    pub fn to_jwk(&self) -> PublicKeyJwk {
        PublicKeyJwk {
            kty: JWK_KTY.into(),
            crv: JWK_CRV.into(),
            x: URL_SAFE_NO_PAD.encode(self.as_bytes()),
        }
    }

    /// Import a key fetched from the network. Untrusted until used.
    pub fn from_jwk(jwk: &PublicKeyJwk) -> Result<Self, VaultError> {
        if jwk.kty != JWK_KTY || jwk.crv != JWK_CRV {
            return Err(VaultError::InvalidInput(format!(
                "unsupported public key type {}/{}",
                jwk.kty, jwk.crv
            )));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(jwk.x.as_bytes())
            .map_err(|e| VaultError::InvalidInput(format!("public key is not base64url: {e}")))?;
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            VaultError::InvalidInput(format!(
                "public key must be {KEY_LEN} bytes, got {}",
                v.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    pub(crate) fn inner(&self) -> &x25519_dalek::PublicKey {
        &self.0
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PublicKey")
            .field(&URL_SAFE_NO_PAD.encode(self.as_bytes()))
            .finish()
    }
}

impl From<PublicKey> for PublicKeyJwk {
    fn from(key: PublicKey) -> Self {
        key.to_jwk()
    }
}

impl TryFrom<PublicKeyJwk> for PublicKey {
    type Error = VaultError;

    fn try_from(jwk: PublicKeyJwk) -> Result<Self, Self::Error> {
        Self::from_jwk(&jwk)
    }
}

/// Private half of a practice keypair.
///
/// Opaque capsule: no `Clone`, no `Serialize`, redacted `Debug`, zeroized on
/// drop. The raw bytes are reachable only inside this crate, for wrapping.
pub struct PrivateKey {
    secret: StaticSecret,
}

impl PrivateKey {
    pub(crate) fn from_bytes(bytes: &[u8; KEY_LEN]) -> Self {
        Self {
            secret: StaticSecret::from(*bytes),
        }
    }

    /// Public key matching this private key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(x25519_dalek::PublicKey::from(&self.secret))
    }

    /// Raw secret for the key wrapper. Never persisted as-is.
    pub(crate) fn export(&self) -> Zeroizing<[u8; KEY_LEN]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    pub(crate) fn diffie_hellman(&self, peer: &PublicKey) -> SharedSecret {
        self.secret.diffie_hellman(peer.inner())
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// A freshly generated practice keypair.
#[derive(Debug)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

/// Generate a new keypair from OS entropy.
///
/// An entropy failure is surfaced as [`VaultError::KeyGeneration`] and
/// never retried.
pub fn generate_key_pair() -> Result<KeyPair, VaultError> {
    let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
    rand::rngs::OsRng
        .try_fill_bytes(bytes.as_mut())
        .map_err(|e| VaultError::KeyGeneration(e.to_string()))?;

    let private_key = PrivateKey::from_bytes(&bytes);
    let public_key = private_key.public_key();
    Ok(KeyPair {
        public_key,
        private_key,
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_pairs_are_distinct() {
        let a = generate_key_pair().unwrap();
        let b = generate_key_pair().unwrap();
        assert_ne!(a.public_key, b.public_key);
    }

    #[test]
    fn public_key_matches_private_key() {
        let pair = generate_key_pair().unwrap();
        assert_eq!(pair.private_key.public_key(), pair.public_key);
    }

    #[test]
    fn keys_agree_on_shared_secret() {
        let a = generate_key_pair().unwrap();
        let b = generate_key_pair().unwrap();
        let ab = a.private_key.diffie_hellman(&b.public_key);
        let ba = b.private_key.diffie_hellman(&a.public_key);
        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn export_round_trips() {
        let pair = generate_key_pair().unwrap();
        let restored = PrivateKey::from_bytes(&pair.private_key.export());
        assert_eq!(restored.public_key(), pair.public_key);
    }

    #[test]
    fn jwk_round_trip() {
        let pair = generate_key_pair().unwrap();
        let json = serde_json::to_value(pair.public_key).unwrap();
        assert_eq!(json["kty"], "OKP");
        assert_eq!(json["crv"], "X25519");
        assert_eq!(json["x"].as_str().unwrap().len(), 43);

        let parsed: PublicKey = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, pair.public_key);
    }

    #[test]
    fn jwk_with_wrong_curve_rejected() {
        let mut jwk = generate_key_pair().unwrap().public_key.to_jwk();
        jwk.crv = "P-256".into();
        assert!(matches!(
            PublicKey::from_jwk(&jwk),
            Err(VaultError::InvalidInput(_))
        ));
    }

    #[test]
    fn jwk_with_short_key_rejected() {
        let jwk = PublicKeyJwk {
            kty: "OKP".into(),
            crv: "X25519".into(),
            x: URL_SAFE_NO_PAD.encode([7u8; 31]),
        };
        assert!(PublicKey::from_jwk(&jwk).is_err());
    }

    #[test]
    fn private_key_debug_is_redacted() {
        let pair = generate_key_pair().unwrap();
        let rendered = format!("{pair:?}");
        assert!(rendered.contains("PrivateKey([REDACTED])"));
        assert!(!rendered.contains(&format!("{:?}", pair.private_key.export().as_slice())));
    }
}
