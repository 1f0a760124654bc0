//! Serde adapters for byte fields that cross the network.
//!
//! Every byte field is standard base64. Fixed-size fields are checked for
//! their exact length while decoding, so a struct that deserialized is
//! already well-shaped.

use base64::{Engine, engine::general_purpose::STANDARD};

/// Variable-length bytes as base64.
pub mod b64 {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::{Engine, STANDARD};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom)
    }
}

/// Fixed-length bytes as base64, rejecting any other decoded length.
pub mod b64_array {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::{Engine, STANDARD};

    pub fn serialize<S: Serializer, const N: usize>(bytes: &[u8; N], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        d: D,
    ) -> Result<[u8; N], D::Error> {
        let encoded = String::deserialize(d)?;
        let decoded = STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom)?;
        decoded.try_into().map_err(|v: Vec<u8>| {
            D::Error::custom(format!("expected {N} bytes, got {}", v.len()))
        })
    }
}
