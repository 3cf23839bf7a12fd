//! Strong type definitions for the KERI Kernel.
//!
//! Keys, digests, and identifiers travel as derivation-code-prefixed
//! base64url strings. The newtypes here validate that encoding once, at the
//! boundary, so the rest of the crate can treat them as well-formed.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Raw size of every value we encode: Ed25519 public keys and SHA-256 digests.
pub const RAW_SIZE: usize = 32;

/// Length of the unpadded base64url encoding of `RAW_SIZE` bytes.
pub const ENCODED_PAYLOAD_LEN: usize = (RAW_SIZE * 4 + 2) / 3;

/// Full length of an encoded key or digest: one code character plus payload.
pub const ENCODED_LEN: usize = 1 + ENCODED_PAYLOAD_LEN;

/// Derivation code: the one-character prefix naming what the payload is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DerivationCode {
    /// Raw Ed25519 verification key (`B`).
    Ed25519,
    /// SHA-256 digest (`E`).
    Sha256,
}

impl DerivationCode {
    pub const fn as_char(self) -> char {
        match self {
            Self::Ed25519 => 'B',
            Self::Sha256 => 'E',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'B' => Some(Self::Ed25519),
            'E' => Some(Self::Sha256),
            _ => None,
        }
    }
}

/// A derivation-code-prefixed, base64url-encoded 32-byte value.
///
/// Always holds a well-formed encoding: construction goes through
/// [`EncodedKey::parse`] or [`EncodedKey::encode`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EncodedKey(String);

impl EncodedKey {
    /// Encode raw bytes under the given derivation code.
    pub fn encode(code: DerivationCode, raw: &[u8; RAW_SIZE]) -> Self {
        let mut s = String::with_capacity(ENCODED_LEN);
        s.push(code.as_char());
        s.push_str(&URL_SAFE_NO_PAD.encode(raw));
        Self(s)
    }

    /// Parse and validate an encoded key or digest.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::decode(s)?;
        Ok(Self(s.to_string()))
    }

    fn decode(s: &str) -> Result<(DerivationCode, [u8; RAW_SIZE]), CoreError> {
        let mut chars = s.chars();
        let first = chars
            .next()
            .ok_or_else(|| CoreError::InvalidKeyEncoding("empty string".into()))?;
        let code = DerivationCode::from_char(first).ok_or_else(|| {
            CoreError::InvalidKeyEncoding(format!("unknown derivation code '{}'", first))
        })?;

        let bytes = URL_SAFE_NO_PAD
            .decode(chars.as_str())
            .map_err(|e| CoreError::InvalidKeyEncoding(e.to_string()))?;

        let raw: [u8; RAW_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            CoreError::InvalidKeyEncoding(format!(
                "decoded length {}, expected {}",
                bytes.len(),
                RAW_SIZE
            ))
        })?;

        Ok((code, raw))
    }

    /// Parse and require a specific derivation code.
    pub fn parse_with_code(s: &str, code: DerivationCode) -> Result<Self, CoreError> {
        let key = Self::parse(s)?;
        if key.code() != code {
            return Err(CoreError::InvalidKeyEncoding(format!(
                "expected derivation code '{}', got '{}'",
                code.as_char(),
                key.code().as_char()
            )));
        }
        Ok(key)
    }

    pub fn code(&self) -> DerivationCode {
        // Validated at construction.
        self.0
            .chars()
            .next()
            .and_then(DerivationCode::from_char)
            .unwrap_or(DerivationCode::Sha256)
    }

    /// The decoded 32-byte payload.
    pub fn raw(&self) -> [u8; RAW_SIZE] {
        Self::decode(&self.0).map(|(_, raw)| raw).unwrap_or([0u8; RAW_SIZE])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedKey({})", self.0)
    }
}

impl fmt::Display for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EncodedKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EncodedKey {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::decode(&s)?;
        Ok(Self(s))
    }
}

impl From<EncodedKey> for String {
    fn from(key: EncodedKey) -> Self {
        key.0
    }
}

/// An identifier prefix: the SAID of an identity's inception event.
///
/// Stable across rotations. Always a SHA-256 (`E`) encoding.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix(String);

impl Prefix {
    /// Parse and validate an identifier prefix.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        EncodedKey::parse_with_code(s, DerivationCode::Sha256)?;
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<EncodedKey> for Prefix {
    fn from(key: EncodedKey) -> Self {
        Self(key.0)
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prefix({})", self.0)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Prefix {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Prefix {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        EncodedKey::parse_with_code(&s, DerivationCode::Sha256)?;
        Ok(Self(s))
    }
}

impl From<Prefix> for String {
    fn from(prefix: Prefix) -> Self {
        prefix.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_lengths() {
        assert_eq!(ENCODED_PAYLOAD_LEN, 43);
        assert_eq!(ENCODED_LEN, 44);

        let key = EncodedKey::encode(DerivationCode::Ed25519, &[0x42; 32]);
        assert_eq!(key.as_str().len(), ENCODED_LEN);
        assert!(key.as_str().starts_with('B'));
    }

    #[test]
    fn test_encoded_key_roundtrip() {
        let key = EncodedKey::encode(DerivationCode::Sha256, &[0xab; 32]);
        let parsed = EncodedKey::parse(key.as_str()).unwrap();
        assert_eq!(parsed, key);
        assert_eq!(parsed.raw(), [0xab; 32]);
        assert_eq!(parsed.code(), DerivationCode::Sha256);
    }

    #[test]
    fn test_rejects_unknown_code() {
        let key = EncodedKey::encode(DerivationCode::Ed25519, &[1; 32]);
        let bad = format!("X{}", &key.as_str()[1..]);
        assert!(matches!(
            EncodedKey::parse(&bad),
            Err(CoreError::InvalidKeyEncoding(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_length() {
        // 16 bytes instead of 32
        let short = format!("B{}", URL_SAFE_NO_PAD.encode([7u8; 16]));
        assert!(matches!(
            EncodedKey::parse(&short),
            Err(CoreError::InvalidKeyEncoding(_))
        ));

        assert!(EncodedKey::parse("").is_err());
        assert!(EncodedKey::parse("B").is_err());
    }

    #[test]
    fn test_rejects_bad_base64() {
        let bad = format!("B{}", "!".repeat(43));
        assert!(EncodedKey::parse(&bad).is_err());

        // Padded standard base64 is not accepted.
        let padded = format!("B{}=", URL_SAFE_NO_PAD.encode([7u8; 32]));
        assert!(EncodedKey::parse(&padded).is_err());
    }

    #[test]
    fn test_prefix_requires_digest_code() {
        let digest = EncodedKey::encode(DerivationCode::Sha256, &[9; 32]);
        let key = EncodedKey::encode(DerivationCode::Ed25519, &[9; 32]);

        assert!(Prefix::parse(digest.as_str()).is_ok());
        assert!(Prefix::parse(key.as_str()).is_err());
    }

    #[test]
    fn test_serde_validates() {
        let key = EncodedKey::encode(DerivationCode::Ed25519, &[3; 32]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", key));

        let back: EncodedKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);

        assert!(serde_json::from_str::<EncodedKey>("\"Bshort\"").is_err());
    }
}
