//! Self-addressing identifiers (SAIDs).
//!
//! A SAID is the SHA-256 digest of an event's own canonical serialization,
//! taken with the real version string in place and every self-addressing
//! field filled with a fixed-width placeholder. Encoding runs in two passes:
//!
//! 1. Serialize with placeholder version and self fields to learn the size.
//! 2. Write the size into the version string, serialize again, and hash.
//!
//! The digest then replaces the placeholders. Placeholder, digest, and
//! version string all have fixed widths, so the byte length never moves.

use serde::Serialize;

use crate::canonical::{canonical_bytes, check_size, Version};
use crate::crypto::Sha256Digest;
use crate::error::{CoreError, Result};
use crate::types::{EncodedKey, ENCODED_LEN};

/// Encoded width of a SAID.
pub const SAID_LENGTH: usize = ENCODED_LEN;

/// Filler written into self-addressing fields before hashing.
pub const PLACEHOLDER_CHAR: char = '#';

/// The placeholder string: `#` repeated to the encoded width of a SAID.
pub fn placeholder() -> String {
    PLACEHOLDER_CHAR.to_string().repeat(SAID_LENGTH)
}

/// A serializable document carrying its own digest.
pub trait SelfAddressing: Serialize {
    fn version(&self) -> &Version;

    fn set_version(&mut self, version: Version);

    /// The embedded SAID (the `d` field).
    fn said(&self) -> &str;

    /// Write `value` into every self-addressing field.
    fn set_self_fields(&mut self, value: &str);
}

/// SHA-256 over `bytes`, encoded with the `E` derivation code.
pub fn compute_said(bytes: &[u8]) -> EncodedKey {
    Sha256Digest::hash(bytes).to_encoded()
}

/// Finalize `doc`: fix its version size, compute its SAID, and fill the
/// self fields. Returns the final canonical bytes.
pub fn saidify<T: SelfAddressing>(doc: &mut T) -> Result<Vec<u8>> {
    let placeholder = placeholder();

    doc.set_self_fields(&placeholder);
    doc.set_version(Version::placeholder());
    let sizing = canonical_bytes(doc)?;

    doc.set_version(Version::new(sizing.len())?);
    let hashed = canonical_bytes(doc)?;
    if hashed.len() != sizing.len() {
        return Err(CoreError::SerializationFailure(format!(
            "version string changed event length from {} to {}",
            sizing.len(),
            hashed.len()
        )));
    }

    let said = compute_said(&hashed);
    if said.as_str().len() != placeholder.len() {
        return Err(CoreError::SerializationFailure(format!(
            "digest width {} does not match placeholder width {}",
            said.as_str().len(),
            placeholder.len()
        )));
    }

    doc.set_self_fields(said.as_str());
    let bytes = canonical_bytes(doc)?;
    check_size(doc.version(), &bytes)
        .map_err(|e| CoreError::SerializationFailure(e.to_string()))?;

    Ok(bytes)
}

/// Recompute the SAID of a finalized document.
///
/// Fails with `SizeMismatch` if the declared size does not match the
/// placeholder serialization.
pub fn recompute_said<T: SelfAddressing + Clone>(doc: &T) -> Result<EncodedKey> {
    let mut scratch = doc.clone();
    scratch.set_self_fields(&placeholder());
    let bytes = canonical_bytes(&scratch)?;
    check_size(scratch.version(), &bytes)?;
    Ok(compute_said(&bytes))
}

/// Check that the embedded SAID matches the document's content.
pub fn verify_said<T: SelfAddressing + Clone>(doc: &T) -> Result<()> {
    let computed = recompute_said(doc)?;
    if computed.as_str() != doc.said() {
        return Err(CoreError::SaidMismatch {
            embedded: doc.said().to_string(),
            computed: computed.to_string(),
        });
    }
    Ok(())
}
