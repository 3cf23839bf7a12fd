//! Error types for the KERI Kernel Core.

use thiserror::Error;

/// Core errors that can occur while encoding, building, or validating events.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad derivation code, bad base64, or wrong decoded length.
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature")]
    InvalidSignature,

    /// The presented signing key does not digest to the committed next key.
    #[error("key commitment mismatch for {prefix} at sn {sn}: key {key} is not pre-committed")]
    KeyCommitmentMismatch { prefix: String, sn: u64, key: String },

    #[error("insufficient members: need at least 2 identifiers and 2 keys, got {identifiers} identifiers and {keys} keys")]
    InsufficientMembers { identifiers: usize, keys: usize },

    #[error("invalid threshold {threshold} for {keys} keys")]
    InvalidThreshold { threshold: u64, keys: usize },

    /// Codec round-trip inconsistency. Always a defect.
    #[error("serialization failure: {0}")]
    SerializationFailure(String),

    #[error("invalid version string: {0}")]
    InvalidVersion(String),

    #[error("declared size {declared} does not match serialized size {actual}")]
    SizeMismatch { declared: usize, actual: usize },

    #[error("SAID mismatch: embedded {embedded}, computed {computed}")]
    SaidMismatch { embedded: String, computed: String },

    #[error("invalid sequence number: expected {expected}, got {got}")]
    SequenceConflict { expected: u64, got: u64 },

    #[error("prefix mismatch: expected {expected}, got {got}")]
    PrefixMismatch { expected: String, got: String },

    #[error("prior event mismatch: expected {expected}, got {got:?}")]
    PriorEventMismatch { expected: String, got: Option<String> },

    #[error("malformed event: {0}")]
    MalformedEvent(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::SerializationFailure(e.to_string())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
