//! Cryptographic primitives for the KERI Kernel.
//!
//! Wraps Ed25519 signing and SHA-256 hashing with strong types.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::CoreError;
use crate::types::{DerivationCode, EncodedKey};

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Digest(pub [u8; 32]);

impl Sha256Digest {
    /// Compute the SHA-256 digest of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Encode with the `E` derivation code.
    pub fn to_encoded(&self) -> EncodedKey {
        EncodedKey::encode(DerivationCode::Sha256, &self.0)
    }
}

impl fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Sha256Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Encode with the `B` derivation code.
    pub fn to_encoded(&self) -> EncodedKey {
        EncodedKey::encode(DerivationCode::Ed25519, &self.0)
    }

    /// Decode a `B`-coded verification key.
    pub fn from_encoded(key: &EncodedKey) -> Result<Self, CoreError> {
        if key.code() != DerivationCode::Ed25519 {
            return Err(CoreError::InvalidKeyEncoding(format!(
                "expected verification key, got derivation code '{}'",
                key.code().as_char()
            )));
        }
        Ok(Self(key.raw()))
    }

    /// Parse a `B`-coded verification key from its string form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::from_encoded(&EncodedKey::parse_with_code(s, DerivationCode::Ed25519)?)
    }

    /// The next-key commitment for this key: `E` + SHA-256 of the raw key bytes.
    pub fn digest(&self) -> EncodedKey {
        Sha256Digest::hash(&self.0).to_encoded()
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CoreError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;

        let sig = Signature::from_bytes(&signature.0);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Ed25519PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Ed25519PublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Build from an arbitrary slice; `None` unless it is exactly 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Ed25519Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// An Ed25519 key pair.
///
/// Owned by whoever generated it. Nothing in this crate persists one.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let signing_key = SigningKey::generate(&mut rng);
        Self { signing_key }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Derive from arbitrary seed material.
    ///
    /// Material shorter than a seed is hashed with SHA-256 first; longer
    /// material is truncated to the first 32 bytes.
    pub fn derive(material: &[u8]) -> Self {
        let seed: [u8; 32] = match material.get(..32).and_then(|s| s.try_into().ok()) {
            Some(seed) => seed,
            None => Sha256Digest::hash(material).0,
        };
        Self::from_seed(&seed)
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message. Ed25519 signatures are deterministic.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        let sig = self.signing_key.sign(message);
        Ed25519Signature(sig.to_bytes())
    }

    /// Get the raw seed bytes (secret key material).
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

/// Sign a payload with a private key.
pub fn sign(keypair: &Keypair, payload: &[u8]) -> Ed25519Signature {
    keypair.sign(payload)
}

/// Verify a signature against a public key.
///
/// Malformed keys or signatures verify false; this never errors.
pub fn verify(public_key: &[u8], payload: &[u8], signature: &[u8]) -> bool {
    let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Some(signature) = Ed25519Signature::from_slice(signature) else {
        return false;
    };
    Ed25519PublicKey(key_bytes).verify(payload, &signature).is_ok()
}

/// Verify against a `B`-encoded public key string.
pub fn verify_encoded(public_key: &str, payload: &[u8], signature: &[u8]) -> bool {
    match Ed25519PublicKey::parse(public_key) {
        Ok(key) => verify(key.as_bytes(), payload, signature),
        Err(_) => false,
    }
}
