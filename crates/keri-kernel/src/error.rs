//! Error types for the Kernel.

use keri_kernel_core::CoreError;
use keri_kernel_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during Kernel operations.
///
/// Every variant maps to a stable [`ErrorCode`]. The delegated transport
/// carries the code across the wire and rebuilds the same variant.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("identity already exists: {0}")]
    DuplicateIdentity(String),

    #[error("no such identity: {0}")]
    NoSuchIdentity(String),

    /// The identity exists but its signing key is not held here.
    #[error("signing key unavailable for {0}")]
    KeyUnavailable(String),

    #[error("key commitment mismatch for {prefix} at sn {sn}: key {key} is not pre-committed")]
    KeyCommitmentMismatch { prefix: String, sn: u64, key: String },

    #[error("sequence conflict: expected sn {expected}, got {got}")]
    SequenceConflict { expected: u64, got: u64 },

    #[error("insufficient members: need at least 2 identifiers and 2 keys, got {identifiers} identifiers and {keys} keys")]
    InsufficientMembers { identifiers: usize, keys: usize },

    #[error("invalid threshold {threshold} for {keys} keys")]
    InvalidThreshold { threshold: u64, keys: usize },

    /// Codec inconsistency. Always a defect.
    #[error("serialization failure: {0}")]
    SerializationFailure(String),

    /// An event that fails SAID, size, or chain validation.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// A malformed transport request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(String),

    /// The delegated driver could not be reached or answered garbage.
    #[error("transport error: {0}")]
    Transport(String),

    /// Driver process lifecycle failure.
    #[error("driver error: {0}")]
    Driver(String),
}

/// Stable, wire-safe error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidKeyEncoding,
    DuplicateIdentity,
    NoSuchIdentity,
    KeyUnavailable,
    KeyCommitmentMismatch,
    SequenceConflict,
    InsufficientMembers,
    InvalidThreshold,
    SerializationFailure,
    InvalidEvent,
    InvalidRequest,
    Storage,
    Transport,
    Driver,
}

impl ErrorCode {
    /// HTTP status used at the transport boundary.
    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidKeyEncoding
            | Self::InsufficientMembers
            | Self::InvalidThreshold
            | Self::InvalidEvent
            | Self::InvalidRequest => 400,
            Self::NoSuchIdentity => 404,
            Self::DuplicateIdentity | Self::SequenceConflict | Self::KeyUnavailable => 409,
            Self::KeyCommitmentMismatch => 422,
            Self::SerializationFailure | Self::Storage => 500,
            Self::Transport | Self::Driver => 502,
        }
    }
}

impl KernelError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidKeyEncoding(_) => ErrorCode::InvalidKeyEncoding,
            Self::DuplicateIdentity(_) => ErrorCode::DuplicateIdentity,
            Self::NoSuchIdentity(_) => ErrorCode::NoSuchIdentity,
            Self::KeyUnavailable(_) => ErrorCode::KeyUnavailable,
            Self::KeyCommitmentMismatch { .. } => ErrorCode::KeyCommitmentMismatch,
            Self::SequenceConflict { .. } => ErrorCode::SequenceConflict,
            Self::InsufficientMembers { .. } => ErrorCode::InsufficientMembers,
            Self::InvalidThreshold { .. } => ErrorCode::InvalidThreshold,
            Self::SerializationFailure(_) => ErrorCode::SerializationFailure,
            Self::InvalidEvent(_) => ErrorCode::InvalidEvent,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::Store(_) => ErrorCode::Storage,
            Self::Transport(_) => ErrorCode::Transport,
            Self::Driver(_) => ErrorCode::Driver,
        }
    }
}

impl From<CoreError> for KernelError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidKeyEncoding(msg) => Self::InvalidKeyEncoding(msg),
            CoreError::KeyCommitmentMismatch { prefix, sn, key } => {
                Self::KeyCommitmentMismatch { prefix, sn, key }
            }
            CoreError::InsufficientMembers { identifiers, keys } => {
                Self::InsufficientMembers { identifiers, keys }
            }
            CoreError::InvalidThreshold { threshold, keys } => {
                Self::InvalidThreshold { threshold, keys }
            }
            CoreError::SerializationFailure(msg) => Self::SerializationFailure(msg),
            CoreError::SequenceConflict { expected, got } => {
                Self::SequenceConflict { expected, got }
            }
            other => Self::InvalidEvent(other.to_string()),
        }
    }
}

impl From<StoreError> for KernelError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SequenceConflict { expected, got, .. } => {
                Self::SequenceConflict { expected, got }
            }
            StoreError::AlreadyExists(id) => Self::DuplicateIdentity(id),
            StoreError::NotFound(id) => Self::NoSuchIdentity(id),
            StoreError::Core(core) => core.into(),
            other => Self::Store(other.to_string()),
        }
    }
}

/// Result type for Kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;
