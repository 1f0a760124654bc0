//! Hybrid payload codec: per-message session key + sealed key envelope.
//!
//! ```text
//! session_key  = random 256-bit, one per payload
//! ciphertext   = AEAD(session_key, iv, plaintext, aad = domain || sealed_key [|| content type])
//! sealed_key   = eph_pk || wrap_iv || AEAD(kek, wrap_iv, session_key, SEAL_AAD)
//! kek          = HKDF-SHA256(X25519(eph_sk, recipient_pk), info = SEAL_INFO || eph_pk || recipient_pk)
//! ```
//!
//! The sealed key is bound into the payload AAD, so every bit of every field
//! is authenticated: flipping any of them fails decryption instead of
//! yielding altered plaintext.

use {
    hkdf::Hkdf,
    rand::RngCore,
    serde::{Serialize, de::DeserializeOwned},
    sha2::Sha256,
    x25519_dalek::StaticSecret,
    zeroize::Zeroizing,
};

use crate::{
    IV_LEN, KEY_LEN, SEALED_KEY_LEN,
    encoding::{b64, b64_array},
    error::VaultError,
    keys::{PrivateKey, PublicKey},
    traits::Cipher,
};

const PAYLOAD_DOMAIN: &[u8] = b"praxis-payload";
const BLOB_DOMAIN: &[u8] = b"praxis-blob";
const SEAL_INFO: &[u8] = b"praxis-session-key-seal";
const SEAL_AAD: &[u8] = b"praxis-session-key";

/// One hybrid-encrypted structured value or byte string.
///
/// Self-contained: decryptable on its own with the recipient private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    pub version: u8,
    #[serde(with = "b64_array")]
    pub iv: [u8; IV_LEN],
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "b64_array")]
    pub encrypted_session_key: [u8; SEALED_KEY_LEN],
}

/// Non-sensitive sidecar for an encrypted blob.
///
/// Carried as small JSON next to the binary stream, never mixed into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMetadata {
    pub version: u8,
    #[serde(with = "b64_array")]
    pub iv: [u8; IV_LEN],
    #[serde(with = "b64_array")]
    pub encrypted_session_key: [u8; SEALED_KEY_LEN],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Length of the ciphertext stream in bytes.
    pub size: u64,
}

/// An encrypted binary object: metadata plus a separate ciphertext stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub metadata: BlobMetadata,
    pub ciphertext: Vec<u8>,
}

/// A one-time symmetric key, zeroized on drop.
pub type SessionKey = Zeroizing<[u8; KEY_LEN]>;

fn generate_session_key() -> SessionKey {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    rand::rng().fill_bytes(key.as_mut());
    key
}

fn seal_kek(
    shared: &[u8; KEY_LEN],
    ephemeral: &[u8; KEY_LEN],
    recipient: &[u8; KEY_LEN],
) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
    let mut info = Vec::with_capacity(SEAL_INFO.len() + 2 * KEY_LEN);
    info.extend_from_slice(SEAL_INFO);
    info.extend_from_slice(ephemeral);
    info.extend_from_slice(recipient);

    let hkdf = Hkdf::<Sha256>::new(None, shared);
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hkdf.expand(&info, okm.as_mut())
        .map_err(|e| VaultError::CipherError(format!("HKDF expand failed: {e}")))?;
    Ok(okm)
}

/// Seal a session key to `recipient` with a fresh ephemeral X25519 key.
pub(crate) fn seal_session_key<C: Cipher>(
    cipher: &C,
    session_key: &[u8; KEY_LEN],
    recipient: &PublicKey,
) -> Result<[u8; SEALED_KEY_LEN], VaultError> {
    let mut eph_bytes = Zeroizing::new([0u8; KEY_LEN]);
    rand::rng().fill_bytes(eph_bytes.as_mut());
    let ephemeral = StaticSecret::from(*eph_bytes);
    let eph_pk = x25519_dalek::PublicKey::from(&ephemeral);

    let shared = ephemeral.diffie_hellman(recipient.inner());
    if !shared.was_contributory() {
        return Err(VaultError::InvalidInput(
            "recipient public key is a low-order point".into(),
        ));
    }
    let kek = seal_kek(shared.as_bytes(), eph_pk.as_bytes(), recipient.as_bytes())?;

    let iv = cipher.generate_iv();
    let wrapped = cipher.encrypt(&kek, &iv, session_key, SEAL_AAD)?;

    let mut sealed = Vec::with_capacity(SEALED_KEY_LEN);
    sealed.extend_from_slice(eph_pk.as_bytes());
    sealed.extend_from_slice(&iv);
    sealed.extend_from_slice(&wrapped);
    sealed.try_into().map_err(|v: Vec<u8>| {
        VaultError::CipherError(format!(
            "sealed session key has wrong length: {} (expected {SEALED_KEY_LEN})",
            v.len()
        ))
    })
}

/// Recover a session key sealed to the holder of `private_key`.
pub(crate) fn open_session_key<C: Cipher>(
    cipher: &C,
    sealed: &[u8; SEALED_KEY_LEN],
    private_key: &PrivateKey,
) -> Result<SessionKey, VaultError> {
    let (eph, rest) = sealed.split_at(KEY_LEN);
    let (iv, wrapped) = rest.split_at(IV_LEN);
    let eph: [u8; KEY_LEN] = eph.try_into().map_err(|_| VaultError::DecryptionFailed)?;
    let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| VaultError::DecryptionFailed)?;

    let eph_pk = PublicKey::from_bytes(eph);
    let shared = private_key.diffie_hellman(&eph_pk);
    if !shared.was_contributory() {
        return Err(VaultError::DecryptionFailed);
    }
    let recipient = private_key.public_key();
    let kek = seal_kek(shared.as_bytes(), &eph, recipient.as_bytes())
        .map_err(|_| VaultError::DecryptionFailed)?;

    let plaintext = cipher.decrypt(&kek, &iv, wrapped, SEAL_AAD)?;
    let key: [u8; KEY_LEN] = plaintext
        .as_slice()
        .try_into()
        .map_err(|_| VaultError::DecryptionFailed)?;
    Ok(Zeroizing::new(key))
}

fn payload_aad(
    domain: &[u8],
    sealed: &[u8; SEALED_KEY_LEN],
    content_type: Option<&str>,
) -> Result<Vec<u8>, VaultError> {
    let mut aad = Vec::with_capacity(domain.len() + SEALED_KEY_LEN + 64);
    aad.extend_from_slice(domain);
    aad.extend_from_slice(sealed);
    if let Some(ct) = content_type {
        let len = u32::try_from(ct.len())
            .map_err(|_| VaultError::InvalidInput("content type is too long".into()))?;
        aad.extend_from_slice(&len.to_be_bytes());
        aad.extend_from_slice(ct.as_bytes());
    }
    Ok(aad)
}

fn check_version<C: Cipher>(cipher: &C, version: u8) -> Result<(), VaultError> {
    if version != cipher.version_tag() {
        return Err(VaultError::InvalidInput(format!(
            "unsupported payload version: {version:#04x}, expected {:#04x}",
            cipher.version_tag()
        )));
    }
    Ok(())
}

/// Parse decrypted JSON. The error detail names only the failure category
/// and position, never the plaintext.
pub(crate) fn parse_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, VaultError> {
    serde_json::from_slice(bytes).map_err(|e| {
        VaultError::DeserializationFailed(format!(
            "{:?} error at line {}, column {}",
            e.classify(),
            e.line(),
            e.column()
        ))
    })
}

/// Encrypt raw bytes for `recipient`.
pub fn encrypt_bytes<C: Cipher>(
    cipher: &C,
    plaintext: &[u8],
    recipient: &PublicKey,
) -> Result<EncryptedPayload, VaultError> {
    let session_key = generate_session_key();
    let encrypted_session_key = seal_session_key(cipher, &session_key, recipient)?;

    let iv = cipher.generate_iv();
    let aad = payload_aad(PAYLOAD_DOMAIN, &encrypted_session_key, None)?;
    let ciphertext = cipher.encrypt(&session_key, &iv, plaintext, &aad)?;

    Ok(EncryptedPayload {
        version: cipher.version_tag(),
        iv,
        ciphertext,
        encrypted_session_key,
    })
}

/// Serialize `value` to JSON and encrypt it for `recipient`.
pub fn encrypt_value<C: Cipher, T: Serialize + ?Sized>(
    cipher: &C,
    value: &T,
    recipient: &PublicKey,
) -> Result<EncryptedPayload, VaultError> {
    let plaintext = Zeroizing::new(
        serde_json::to_vec(value)
            .map_err(|e| VaultError::InvalidInput(format!("value is not serializable: {e}")))?,
    );
    encrypt_bytes(cipher, &plaintext, recipient)
}

/// Unseal the session key of `payload`. Only this step needs the private key.
pub fn open_payload_key<C: Cipher>(
    cipher: &C,
    payload: &EncryptedPayload,
    private_key: &PrivateKey,
) -> Result<SessionKey, VaultError> {
    check_version(cipher, payload.version)?;
    open_session_key(cipher, &payload.encrypted_session_key, private_key)
}

/// Decrypt `payload` with an already unsealed session key.
pub fn decrypt_with_session_key<C: Cipher>(
    cipher: &C,
    payload: &EncryptedPayload,
    session_key: &[u8; KEY_LEN],
) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let aad = payload_aad(PAYLOAD_DOMAIN, &payload.encrypted_session_key, None)?;
    cipher.decrypt(session_key, &payload.iv, &payload.ciphertext, &aad)
}

/// Decrypt a payload to raw bytes. All-or-nothing.
pub fn decrypt_bytes<C: Cipher>(
    cipher: &C,
    payload: &EncryptedPayload,
    private_key: &PrivateKey,
) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let session_key = open_payload_key(cipher, payload, private_key)?;
    decrypt_with_session_key(cipher, payload, &session_key)
}

/// Decrypt a payload and deserialize it back to `T`.
pub fn decrypt_value<C: Cipher, T: DeserializeOwned>(
    cipher: &C,
    payload: &EncryptedPayload,
    private_key: &PrivateKey,
) -> Result<T, VaultError> {
    let plaintext = decrypt_bytes(cipher, payload, private_key)?;
    parse_value(&plaintext)
}

/// Encrypt a binary object (e.g. a photo) for `recipient`.
///
/// The content type is bound into the AAD, so it cannot be swapped in the
/// metadata without failing decryption.
pub fn encrypt_blob<C: Cipher>(
    cipher: &C,
    data: &[u8],
    content_type: Option<&str>,
    recipient: &PublicKey,
) -> Result<EncryptedBlob, VaultError> {
    let session_key = generate_session_key();
    let encrypted_session_key = seal_session_key(cipher, &session_key, recipient)?;

    let iv = cipher.generate_iv();
    let aad = payload_aad(BLOB_DOMAIN, &encrypted_session_key, content_type)?;
    let ciphertext = cipher.encrypt(&session_key, &iv, data, &aad)?;

    Ok(EncryptedBlob {
        metadata: BlobMetadata {
            version: cipher.version_tag(),
            iv,
            encrypted_session_key,
            content_type: content_type.map(str::to_owned),
            size: ciphertext.len() as u64,
        },
        ciphertext,
    })
}

/// Unseal the session key of a blob.
pub fn open_blob_key<C: Cipher>(
    cipher: &C,
    metadata: &BlobMetadata,
    private_key: &PrivateKey,
) -> Result<SessionKey, VaultError> {
    check_version(cipher, metadata.version)?;
    open_session_key(cipher, &metadata.encrypted_session_key, private_key)
}

/// Decrypt a blob stream with an already unsealed session key.
pub fn decrypt_blob_with_session_key<C: Cipher>(
    cipher: &C,
    metadata: &BlobMetadata,
    ciphertext: &[u8],
    session_key: &[u8; KEY_LEN],
) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    if metadata.size != ciphertext.len() as u64 {
        return Err(VaultError::InvalidInput(format!(
            "blob stream is {} bytes but metadata says {}",
            ciphertext.len(),
            metadata.size
        )));
    }
    let aad = payload_aad(
        BLOB_DOMAIN,
        &metadata.encrypted_session_key,
        metadata.content_type.as_deref(),
    )?;
    cipher.decrypt(session_key, &metadata.iv, ciphertext, &aad)
}

/// Decrypt a blob stream using its metadata sidecar.
pub fn decrypt_blob<C: Cipher>(
    cipher: &C,
    metadata: &BlobMetadata,
    ciphertext: &[u8],
    private_key: &PrivateKey,
) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let session_key = open_blob_key(cipher, metadata, private_key)?;
    decrypt_blob_with_session_key(cipher, metadata, ciphertext, &session_key)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{TAG_LEN, keys::generate_key_pair, xchacha20::XChaCha20Poly1305Cipher},
        rstest::rstest,
        serde_json::json,
    };

    #[derive(Debug, Clone, Copy)]
    enum Field {
        Ciphertext,
        Iv,
        SessionKey,
    }

    fn flip_bit(payload: &mut EncryptedPayload, field: Field, bit: usize) {
        let bytes: &mut [u8] = match field {
            Field::Ciphertext => &mut payload.ciphertext,
            Field::Iv => &mut payload.iv,
            Field::SessionKey => &mut payload.encrypted_session_key,
        };
        bytes[bit / 8] ^= 1 << (bit % 8);
    }

    fn flip_blob_bit(blob: &mut EncryptedBlob, field: Field, bit: usize) {
        let bytes: &mut [u8] = match field {
            Field::Ciphertext => &mut blob.ciphertext,
            Field::Iv => &mut blob.metadata.iv,
            Field::SessionKey => &mut blob.metadata.encrypted_session_key,
        };
        bytes[bit / 8] ^= 1 << (bit % 8);
    }

    #[test]
    fn value_round_trip() {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();
        let patient = json!({ "name": "Jane Doe", "dob": "1990-01-01" });

        let payload = encrypt_value(&cipher, &patient, &pair.public_key).unwrap();
        let decrypted: serde_json::Value =
            decrypt_value(&cipher, &payload, &pair.private_key).unwrap();
        assert_eq!(decrypted, patient);
    }

    #[test]
    fn bytes_round_trip() {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();

        let payload = encrypt_bytes(&cipher, b"\x00\x01binary\xff", &pair.public_key).unwrap();
        let decrypted = decrypt_bytes(&cipher, &payload, &pair.private_key).unwrap();
        assert_eq!(decrypted.as_slice(), b"\x00\x01binary\xff");
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();

        let a = encrypt_value(&cipher, "Jane Doe", &pair.public_key).unwrap();
        let b = encrypt_value(&cipher, "Jane Doe", &pair.public_key).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.encrypted_session_key, b.encrypted_session_key);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_private_key_fails() {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();
        let other = generate_key_pair().unwrap();

        let payload = encrypt_value(&cipher, "secret", &pair.public_key).unwrap();
        let result: Result<String, _> = decrypt_value(&cipher, &payload, &other.private_key);
        assert!(matches!(result, Err(VaultError::DecryptionFailed)));
    }

    #[rstest]
    #[case::ciphertext_first_bit(Field::Ciphertext, 0)]
    #[case::ciphertext_tag(Field::Ciphertext, 8 * 12 + 3)]
    #[case::iv_first_bit(Field::Iv, 0)]
    #[case::iv_last_bit(Field::Iv, 8 * IV_LEN - 1)]
    #[case::ephemeral_key(Field::SessionKey, 5)]
    // Bit 255 of an X25519 u-coordinate is ignored by the curve; the HKDF
    // info and payload AAD still catch it.
    #[case::ephemeral_key_high_bit(Field::SessionKey, 8 * KEY_LEN - 1)]
    #[case::seal_iv(Field::SessionKey, 8 * KEY_LEN + 7)]
    #[case::sealed_key_tag(Field::SessionKey, 8 * SEALED_KEY_LEN - 1)]
    fn single_bit_flip_is_detected(#[case] field: Field, #[case] bit: usize) {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();

        let mut payload = encrypt_value(&cipher, "Jane Doe", &pair.public_key).unwrap();
        flip_bit(&mut payload, field, bit);

        let result: Result<String, _> = decrypt_value(&cipher, &payload, &pair.private_key);
        assert!(matches!(result, Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn every_bit_of_the_sealed_key_is_authenticated() {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();
        let payload = encrypt_value(&cipher, "Jane Doe", &pair.public_key).unwrap();

        for bit in 0..8 * SEALED_KEY_LEN {
            let mut tampered = payload.clone();
            flip_bit(&mut tampered, Field::SessionKey, bit);
            assert!(
                decrypt_bytes(&cipher, &tampered, &pair.private_key).is_err(),
                "bit {bit} flip went unnoticed"
            );
        }
    }

    #[test]
    fn type_mismatch_is_deserialization_failure() {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();

        let payload = encrypt_value(&cipher, "Jane Doe", &pair.public_key).unwrap();
        let result: Result<u32, _> = decrypt_value(&cipher, &payload, &pair.private_key);
        match result {
            Err(VaultError::DeserializationFailed(detail)) => {
                assert!(!detail.contains("Jane"), "detail leaked plaintext: {detail}");
            },
            other => panic!("expected DeserializationFailed, got {other:?}"),
        }
    }

    #[test]
    fn non_json_bytes_are_deserialization_failure() {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();

        let payload = encrypt_bytes(&cipher, b"\xff\xfe not json", &pair.public_key).unwrap();
        let result: Result<serde_json::Value, _> =
            decrypt_value(&cipher, &payload, &pair.private_key);
        assert!(matches!(result, Err(VaultError::DeserializationFailed(_))));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();

        let mut payload = encrypt_value(&cipher, "x", &pair.public_key).unwrap();
        payload.version = 9;
        assert!(matches!(
            decrypt_bytes(&cipher, &payload, &pair.private_key),
            Err(VaultError::InvalidInput(_))
        ));
    }

    #[test]
    fn payload_wire_shape() {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();

        let payload = encrypt_value(&cipher, &json!({"a": 1}), &pair.public_key).unwrap();
        let wire = serde_json::to_value(&payload).unwrap();
        let mut keys: Vec<&str> = wire.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["ciphertext", "encryptedSessionKey", "iv", "version"]);

        let parsed: EncryptedPayload = serde_json::from_value(wire).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn short_session_key_rejected_on_decode() {
        let wire = json!({
            "version": 1,
            "iv": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            "ciphertext": "",
            "encryptedSessionKey": "AAAA",
        });
        assert!(serde_json::from_value::<EncryptedPayload>(wire).is_err());
    }

    #[test]
    fn blob_round_trip_keeps_stream_separate() {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();
        let photo: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

        let blob = encrypt_blob(&cipher, &photo, Some("image/jpeg"), &pair.public_key).unwrap();
        assert_eq!(blob.metadata.size, blob.ciphertext.len() as u64);

        let sidecar = serde_json::to_string(&blob.metadata).unwrap();
        assert!(sidecar.len() < 512, "metadata should stay small");
        let metadata: BlobMetadata = serde_json::from_str(&sidecar).unwrap();

        let decrypted = decrypt_blob(&cipher, &metadata, &blob.ciphertext, &pair.private_key).unwrap();
        assert_eq!(decrypted.as_slice(), photo.as_slice());
    }

    #[test]
    fn blob_content_type_is_authenticated() {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();

        let mut blob = encrypt_blob(&cipher, b"png bytes", Some("image/png"), &pair.public_key).unwrap();
        blob.metadata.content_type = Some("text/html".into());
        let result = decrypt_blob(&cipher, &blob.metadata, &blob.ciphertext, &pair.private_key);
        assert!(matches!(result, Err(VaultError::DecryptionFailed)));
    }

    #[rstest]
    #[case::stream_first_bit(Field::Ciphertext, 0)]
    #[case::stream_tag(Field::Ciphertext, 8 * (9 + TAG_LEN) - 1)]
    #[case::iv_first_bit(Field::Iv, 0)]
    #[case::iv_last_bit(Field::Iv, 8 * IV_LEN - 1)]
    #[case::ephemeral_key(Field::SessionKey, 5)]
    #[case::ephemeral_key_high_bit(Field::SessionKey, 8 * KEY_LEN - 1)]
    #[case::seal_iv(Field::SessionKey, 8 * KEY_LEN + 7)]
    #[case::sealed_key_tag(Field::SessionKey, 8 * SEALED_KEY_LEN - 1)]
    fn blob_bit_flip_is_detected(#[case] field: Field, #[case] bit: usize) {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();

        let mut blob = encrypt_blob(&cipher, b"png bytes", Some("image/png"), &pair.public_key).unwrap();
        flip_blob_bit(&mut blob, field, bit);

        let result = decrypt_blob(&cipher, &blob.metadata, &blob.ciphertext, &pair.private_key);
        assert!(matches!(result, Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn every_bit_of_blob_stream_and_iv_is_authenticated() {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();
        let blob = encrypt_blob(&cipher, b"png bytes", Some("image/png"), &pair.public_key).unwrap();

        let fields = [
            (Field::Ciphertext, blob.ciphertext.len()),
            (Field::Iv, IV_LEN),
        ];
        for (field, len) in fields {
            for bit in 0..8 * len {
                let mut tampered = blob.clone();
                flip_blob_bit(&mut tampered, field, bit);
                let result = decrypt_blob(
                    &cipher,
                    &tampered.metadata,
                    &tampered.ciphertext,
                    &pair.private_key,
                );
                assert!(
                    matches!(result, Err(VaultError::DecryptionFailed)),
                    "{field:?} bit {bit} flip went unnoticed"
                );
            }
        }
    }

    #[test]
    fn content_type_is_length_prefixed_in_aad() {
        let sealed = [7u8; SEALED_KEY_LEN];
        let bare = payload_aad(BLOB_DOMAIN, &sealed, None).unwrap();
        let empty = payload_aad(BLOB_DOMAIN, &sealed, Some("")).unwrap();
        let png = payload_aad(BLOB_DOMAIN, &sealed, Some("image/png")).unwrap();

        assert_ne!(bare, empty);
        assert_eq!(&empty[bare.len()..], &0u32.to_be_bytes());
        assert_eq!(&png[bare.len()..bare.len() + 4], &9u32.to_be_bytes());
        assert!(png.ends_with(b"image/png"));
    }

    #[test]
    fn blob_size_mismatch_is_invalid_input() {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();

        let blob = encrypt_blob(&cipher, b"png bytes", None, &pair.public_key).unwrap();
        let truncated = &blob.ciphertext[..blob.ciphertext.len() - 1];
        let result = decrypt_blob(&cipher, &blob.metadata, truncated, &pair.private_key);
        assert!(matches!(result, Err(VaultError::InvalidInput(_))));
    }

    #[test]
    fn payload_cannot_be_opened_as_blob() {
        let cipher = XChaCha20Poly1305Cipher;
        let pair = generate_key_pair().unwrap();

        let payload = encrypt_bytes(&cipher, b"raw", &pair.public_key).unwrap();
        let metadata = BlobMetadata {
            version: payload.version,
            iv: payload.iv,
            encrypted_session_key: payload.encrypted_session_key,
            content_type: None,
            size: payload.ciphertext.len() as u64,
        };
        let result = decrypt_blob(&cipher, &metadata, &payload.ciphertext, &pair.private_key);
        assert!(matches!(result, Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn low_order_recipient_key_rejected() {
        let cipher = XChaCha20Poly1305Cipher;
        let result = encrypt_bytes(&cipher, b"x", &PublicKey::from_bytes([0u8; KEY_LEN]));
        assert!(matches!(result, Err(VaultError::InvalidInput(_))));
    }
}
