//! Wire types of the driver's loopback HTTP interface.
//!
//! Keys travel `B`-encoded, identifiers as prefixes, payloads and
//! signatures as standard base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use keri_kernel_core::{IdentityState, KeyEvent};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ErrorCode, KernelError};

/// Value of [`StatusResponse::status`] once the driver serves requests.
pub const STATUS_ACTIVE: &str = "active";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub driver: String,
    pub version: String,
    /// Seconds since the router was built.
    pub uptime: u64,
}

// ==================== Inception / Rotation ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InceptionRequest {
    pub public_key: String,
    pub next_public_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InceptionResponse {
    pub identifier: String,
    pub event: KeyEvent,
    pub public_key: String,
    pub next_key_digest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationRequest {
    pub identifier: String,
    pub new_public_key: String,
    pub new_next_public_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationResponse {
    pub identifier: String,
    pub event: KeyEvent,
    pub sequence_number: u64,
}

// ==================== Signing ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    pub identifier: String,
    /// Base64 payload.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponse {
    /// Base64 signature.
    pub signature: String,
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub data: String,
    pub signature: String,
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub public_key: String,
}

// ==================== Log queries ====================

/// Query string of `GET /kel` and `GET /state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierQuery {
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KelResponse {
    pub identifier: String,
    pub kel: Vec<KeyEvent>,
    pub sequence_number: u64,
    pub event_count: u64,
}

pub type StateResponse = IdentityState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRotateRequest {
    pub identifier: String,
}

// ==================== Group events ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigResponse {
    /// Base64 of the canonical event bytes.
    pub raw_bytes_b64: String,
    pub said: String,
    pub pre: String,
    pub event_type: String,
    pub size: usize,
    pub members: Vec<String>,
}

// ==================== Errors ====================

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    /// Structured fields of the error, enough to rebuild it.
    #[serde(default)]
    pub details: Value,
}

impl ErrorBody {
    pub fn from_error(error: &KernelError) -> Self {
        let details = match error {
            KernelError::KeyCommitmentMismatch { prefix, sn, key } => {
                json!({ "prefix": prefix, "sn": sn, "key": key })
            }
            KernelError::SequenceConflict { expected, got } => {
                json!({ "expected": expected, "got": got })
            }
            KernelError::InsufficientMembers { identifiers, keys } => {
                json!({ "identifiers": identifiers, "keys": keys })
            }
            KernelError::InvalidThreshold { threshold, keys } => {
                json!({ "threshold": threshold, "keys": keys })
            }
            KernelError::InvalidKeyEncoding(s)
            | KernelError::DuplicateIdentity(s)
            | KernelError::NoSuchIdentity(s)
            | KernelError::KeyUnavailable(s)
            | KernelError::SerializationFailure(s)
            | KernelError::InvalidEvent(s)
            | KernelError::InvalidRequest(s)
            | KernelError::Store(s)
            | KernelError::Transport(s)
            | KernelError::Driver(s) => json!({ "subject": s }),
        };
        Self {
            code: error.code(),
            message: error.to_string(),
            details,
        }
    }

    /// Rebuild the typed error. Missing details fall back to the message.
    pub fn into_error(self) -> KernelError {
        let d = &self.details;
        let num = |field: &str| d.get(field).and_then(Value::as_u64).unwrap_or(0);
        let text = |field: &str| {
            d.get(field)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default()
        };
        let subject = d
            .get("subject")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.message.clone());

        match self.code {
            ErrorCode::InvalidKeyEncoding => KernelError::InvalidKeyEncoding(subject),
            ErrorCode::DuplicateIdentity => KernelError::DuplicateIdentity(subject),
            ErrorCode::NoSuchIdentity => KernelError::NoSuchIdentity(subject),
            ErrorCode::KeyUnavailable => KernelError::KeyUnavailable(subject),
            ErrorCode::KeyCommitmentMismatch => KernelError::KeyCommitmentMismatch {
                prefix: text("prefix"),
                sn: num("sn"),
                key: text("key"),
            },
            ErrorCode::SequenceConflict => KernelError::SequenceConflict {
                expected: num("expected"),
                got: num("got"),
            },
            ErrorCode::InsufficientMembers => KernelError::InsufficientMembers {
                identifiers: num("identifiers") as usize,
                keys: num("keys") as usize,
            },
            ErrorCode::InvalidThreshold => KernelError::InvalidThreshold {
                threshold: num("threshold"),
                keys: num("keys") as usize,
            },
            ErrorCode::SerializationFailure => KernelError::SerializationFailure(subject),
            ErrorCode::InvalidEvent => KernelError::InvalidEvent(subject),
            ErrorCode::InvalidRequest => KernelError::InvalidRequest(subject),
            ErrorCode::Storage => KernelError::Store(subject),
            ErrorCode::Transport => KernelError::Transport(subject),
            ErrorCode::Driver => KernelError::Driver(subject),
        }
    }
}

// ==================== Base64 ====================

pub fn encode_b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a base64 request field.
pub fn decode_b64(field: &str, value: &str) -> Result<Vec<u8>, KernelError> {
    STANDARD
        .decode(value)
        .map_err(|e| KernelError::InvalidRequest(format!("{} is not valid base64: {}", field, e)))
}
