//! Canonical JSON encoding with a size-locked version string.
//!
//! Events serialize as compact JSON (no whitespace) with fields in struct
//! declaration order. The first field is always the version string
//! `KERI10JSON<6 hex digits>_`, whose hex digits declare the byte length of
//! the whole serialization. The version string has a fixed width, so writing
//! the real size in never changes the size.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Protocol identifier.
pub const PROTOCOL: &str = "KERI";

/// Serialization kind.
pub const KIND: &str = "JSON";

pub const MAJOR: u8 = 1;
pub const MINOR: u8 = 0;

/// Number of hex digits holding the size.
pub const SIZE_DIGITS: usize = 6;

/// Largest size expressible in the version string.
pub const MAX_SIZE: usize = 0xff_ffff;

/// Width of the complete version string, e.g. `KERI10JSON00012b_`.
pub const VERSION_LEN: usize = 4 + 2 + 4 + SIZE_DIGITS + 1;

/// A parsed version string. Only `KERI 1.0 JSON` is recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    /// Declared byte length of the serialized event.
    pub size: usize,
}

impl Version {
    /// A version string declaring `size` bytes.
    pub fn new(size: usize) -> Result<Self> {
        if size > MAX_SIZE {
            return Err(CoreError::SerializationFailure(format!(
                "event size {} exceeds version string capacity",
                size
            )));
        }
        Ok(Self { size })
    }

    /// The pass-one placeholder. Same width as any real version string.
    pub const fn placeholder() -> Self {
        Self { size: 0 }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:x}{:x}{}{:06x}_",
            PROTOCOL, MAJOR, MINOR, KIND, self.size
        )
    }
}

impl TryFrom<String> for Version {
    type Error = CoreError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        parse_version(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

/// Parse a version string.
///
/// Rejects other protocols, versions, or kinds, uppercase hex, and anything
/// not exactly `VERSION_LEN` characters long.
pub fn parse_version(s: &str) -> Result<Version> {
    let invalid = || CoreError::InvalidVersion(s.to_string());

    if s.len() != VERSION_LEN || !s.is_ascii() {
        return Err(invalid());
    }

    let expected_head = format!("{}{:x}{:x}{}", PROTOCOL, MAJOR, MINOR, KIND);
    let (head, rest) = s.split_at(expected_head.len());
    if head != expected_head {
        return Err(invalid());
    }

    let (digits, terminator) = rest.split_at(SIZE_DIGITS);
    if terminator != "_" {
        return Err(invalid());
    }
    if !digits
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return Err(invalid());
    }

    let size = usize::from_str_radix(digits, 16).map_err(|_| invalid())?;
    Ok(Version { size })
}

/// Serialize a value to canonical bytes: compact JSON in declaration order.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Check that the declared size in `version` matches the actual byte length.
pub fn check_size(version: &Version, bytes: &[u8]) -> Result<()> {
    if version.size != bytes.len() {
        return Err(CoreError::SizeMismatch {
            declared: version.size,
            actual: bytes.len(),
        });
    }
    Ok(())
}
