//! Event validation: SAID, size lock, and structural rules.
//!
//! Chain rules that need prior state (sequence, prior digest, commitment)
//! live in [`crate::state::KeyState::apply`].

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

use crate::canonical::check_size;
use crate::error::{CoreError, Result};
use crate::event::{ControlEvent, EventKind, GroupBody, KeyEvent};
use crate::said::verify_said;
use crate::types::{DerivationCode, Prefix};

/// Check that a threshold is satisfiable by `count` entries.
///
/// A threshold must be in `[1, count]`, except that an empty list takes a
/// zero threshold.
pub fn check_threshold(threshold: u64, count: usize) -> Result<()> {
    let ok = if count == 0 {
        threshold == 0
    } else {
        threshold >= 1 && threshold <= count as u64
    };
    if !ok {
        return Err(CoreError::InvalidThreshold {
            threshold,
            keys: count,
        });
    }
    Ok(())
}

/// Reject a list that names the same key or identifier twice.
///
/// Thresholds count entries, so every entry must be distinct.
pub fn check_distinct<T: Eq + Hash + fmt::Display>(what: &str, items: &[T]) -> Result<()> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item) {
            return Err(CoreError::MalformedEvent(format!(
                "duplicate {} {}",
                what, item
            )));
        }
    }
    Ok(())
}

/// Validate a single key event in isolation.
///
/// This performs:
/// - Derivation code checks on keys, digests, and identifiers
/// - Duplicate key and digest checks
/// - Threshold checks
/// - Inception and rotation shape rules
/// - Size lock and SAID verification
pub fn validate_event(event: &KeyEvent) -> Result<()> {
    validate_structure(event)?;
    verify_said(event)
}

/// Validate structure without recomputing the SAID.
pub fn validate_structure(event: &KeyEvent) -> Result<()> {
    if event.keys.is_empty() {
        return Err(CoreError::MalformedEvent("event has no signing keys".into()));
    }
    for key in &event.keys {
        if key.code() != DerivationCode::Ed25519 {
            return Err(CoreError::InvalidKeyEncoding(format!(
                "signing key {} is not an Ed25519 verification key",
                key
            )));
        }
    }
    for digest in &event.next_digests {
        if digest.code() != DerivationCode::Sha256 {
            return Err(CoreError::InvalidKeyEncoding(format!(
                "next key digest {} is not a SHA-256 digest",
                digest
            )));
        }
    }

    check_distinct("signing key", &event.keys)?;
    check_distinct("next key digest", &event.next_digests)?;

    check_threshold(event.signing_threshold, event.keys.len())?;
    check_threshold(event.next_threshold, event.next_digests.len())?;
    if event.backer_threshold > event.backers.len() as u64 {
        return Err(CoreError::InvalidThreshold {
            threshold: event.backer_threshold,
            keys: event.backers.len(),
        });
    }

    Prefix::parse(&event.prefix)?;

    match event.kind {
        EventKind::Inception => {
            if event.sn != 0 {
                return Err(CoreError::SequenceConflict {
                    expected: 0,
                    got: event.sn,
                });
            }
            if event.prefix != event.said {
                return Err(CoreError::PrefixMismatch {
                    expected: event.said.clone(),
                    got: event.prefix.clone(),
                });
            }
            if event.prior.is_some() {
                return Err(CoreError::MalformedEvent(
                    "inception must not carry a prior event digest".into(),
                ));
            }
        }
        EventKind::Rotation => {
            if event.sn == 0 {
                return Err(CoreError::SequenceConflict {
                    expected: 1,
                    got: 0,
                });
            }
            if event.prior.is_none() {
                return Err(CoreError::MalformedEvent(
                    "rotation must carry the prior event digest".into(),
                ));
            }
        }
    }

    Ok(())
}

/// Validate arbitrary serialized bytes as a control event.
///
/// The bytes must be in canonical form: re-serializing the parsed event
/// must reproduce them exactly. Then the declared size and the SAID are
/// checked.
pub fn validate_event_bytes(bytes: &[u8]) -> Result<ControlEvent> {
    let event = ControlEvent::from_bytes(bytes)?;

    check_size(event.version(), bytes)?;

    if event.to_bytes()? != bytes {
        return Err(CoreError::MalformedEvent(
            "event bytes are not in canonical form".into(),
        ));
    }

    match &event {
        ControlEvent::Inception(e) | ControlEvent::Rotation(e) => validate_event(e)?,
        ControlEvent::Group(g) => match &g.body {
            GroupBody::Inception(e) => validate_event(e)?,
            GroupBody::Proposal(p) => {
                check_distinct("member", &p.members)?;
                check_distinct("member key", &p.keys)?;
                verify_said(p)?
            }
        },
    }

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{incept, rotate, InceptionBuilder};
    use crate::crypto::Keypair;
    use crate::said::saidify;
    use crate::state::KeyState;

    fn make_keypairs() -> (Keypair, Keypair, Keypair) {
        (
            Keypair::from_seed(&[0x42; 32]),
            Keypair::from_seed(&[0x43; 32]),
            Keypair::from_seed(&[0x44; 32]),
        )
    }

    #[test]
    fn test_threshold_rules() {
        assert!(check_threshold(1, 1).is_ok());
        assert!(check_threshold(2, 3).is_ok());
        assert!(check_threshold(0, 0).is_ok());
        assert!(check_threshold(0, 1).is_err());
        assert!(check_threshold(2, 1).is_err());
        assert!(check_threshold(1, 0).is_err());
    }

    #[test]
    fn test_valid_inception() {
        let (a, b, _) = make_keypairs();
        let event = incept(&a.public_key(), &b.public_key()).unwrap();
        validate_event(&event).unwrap();
    }

    #[test]
    fn test_valid_rotation() {
        let (a, b, c) = make_keypairs();
        let icp = incept(&a.public_key(), &b.public_key()).unwrap();
        let state = KeyState::incept(&icp).unwrap();
        let rot = rotate(&state, &b.public_key(), &c.public_key()).unwrap();
        validate_event(&rot).unwrap();
    }

    #[test]
    fn test_inception_prefix_must_equal_said() {
        let (a, b, c) = make_keypairs();
        let mut event = incept(&a.public_key(), &b.public_key()).unwrap();
        event.prefix = c.public_key().digest().to_string();
        assert!(matches!(
            validate_event(&event),
            Err(CoreError::PrefixMismatch { .. })
        ));
    }

    #[test]
    fn test_inception_nonzero_sn_rejected() {
        let (a, b, _) = make_keypairs();
        let mut event = incept(&a.public_key(), &b.public_key()).unwrap();
        event.sn = 1;
        saidify(&mut event).unwrap();
        assert!(matches!(
            validate_event(&event),
            Err(CoreError::SequenceConflict { expected: 0, got: 1 })
        ));
    }

    #[test]
    fn test_digest_as_signing_key_rejected() {
        let (a, b, _) = make_keypairs();
        let mut event = incept(&a.public_key(), &b.public_key()).unwrap();
        event.keys = vec![a.public_key().digest()];
        assert!(matches!(
            validate_structure(&event),
            Err(CoreError::InvalidKeyEncoding(_))
        ));
    }

    #[test]
    fn test_tampered_key_changes_said() {
        let (a, b, c) = make_keypairs();
        let mut event = incept(&a.public_key(), &b.public_key()).unwrap();
        event.keys = vec![c.public_key().to_encoded()];
        assert!(matches!(
            validate_event(&event),
            Err(CoreError::SaidMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_event_bytes() {
        let (a, b, _) = make_keypairs();
        let event = InceptionBuilder::new()
            .signing_key(&a.public_key())
            .next_key(&b.public_key())
            .anchor(serde_json::json!({"note": "hello"}))
            .build()
            .unwrap();
        let bytes = event.to_bytes().unwrap();

        let parsed = validate_event_bytes(&bytes).unwrap();
        assert_eq!(parsed, ControlEvent::Inception(event));
    }

    #[test]
    fn test_validate_event_bytes_flipped_char() {
        let (a, b, _) = make_keypairs();
        let event = InceptionBuilder::new()
            .signing_key(&a.public_key())
            .next_key(&b.public_key())
            .config("EO")
            .build()
            .unwrap();
        let json = event.to_json().unwrap();
        let tampered = json.replacen("\"EO\"", "\"DO\"", 1);
        assert_eq!(tampered.len(), json.len());

        assert!(matches!(
            validate_event_bytes(tampered.as_bytes()),
            Err(CoreError::SaidMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_event_bytes_rejects_whitespace() {
        let (a, b, _) = make_keypairs();
        let event = incept(&a.public_key(), &b.public_key()).unwrap();
        let pretty = serde_json::to_vec_pretty(&event).unwrap();
        assert!(validate_event_bytes(&pretty).is_err());
    }

    #[test]
    fn test_validate_event_bytes_size_lock() {
        let (a, b, _) = make_keypairs();
        let event = incept(&a.public_key(), &b.public_key()).unwrap();
        let mut bytes = event.to_bytes().unwrap();
        bytes.push(b' ');
        assert!(matches!(
            validate_event_bytes(&bytes),
            Err(CoreError::SizeMismatch { .. })
        ));
    }
}
