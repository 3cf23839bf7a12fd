//! Event construction.
//!
//! Builders produce finalized events: thresholds checked, SAID computed,
//! version size locked. They never sign and never append.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::canonical::Version;
use crate::crypto::Ed25519PublicKey;
use crate::error::{CoreError, Result};
use crate::event::{EventKind, GroupBody, GroupEvent, GroupEventType, GroupProposal, KeyEvent};
use crate::said::saidify;
use crate::state::KeyState;
use crate::types::{DerivationCode, EncodedKey, Prefix};
use crate::validation::{check_distinct, check_threshold};

/// Builder for inception events.
#[derive(Debug, Clone)]
pub struct InceptionBuilder {
    keys: Vec<EncodedKey>,
    next_digests: Vec<EncodedKey>,
    signing_threshold: Option<u64>,
    next_threshold: Option<u64>,
    backers: Vec<String>,
    backer_threshold: u64,
    config: Vec<String>,
    anchors: Vec<serde_json::Value>,
}

impl InceptionBuilder {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            next_digests: Vec::new(),
            signing_threshold: None,
            next_threshold: None,
            backers: Vec::new(),
            backer_threshold: 0,
            config: Vec::new(),
            anchors: Vec::new(),
        }
    }

    /// Add a current signing key.
    pub fn signing_key(mut self, key: &Ed25519PublicKey) -> Self {
        self.keys.push(key.to_encoded());
        self
    }

    /// Commit to a next signing key. Only its digest enters the event.
    pub fn next_key(mut self, key: &Ed25519PublicKey) -> Self {
        self.next_digests.push(key.digest());
        self
    }

    /// Commit to a next key by digest.
    pub fn next_digest(mut self, digest: EncodedKey) -> Self {
        self.next_digests.push(digest);
        self
    }

    /// Defaults to 1.
    pub fn signing_threshold(mut self, threshold: u64) -> Self {
        self.signing_threshold = Some(threshold);
        self
    }

    /// Defaults to 1, or 0 with no next keys.
    pub fn next_threshold(mut self, threshold: u64) -> Self {
        self.next_threshold = Some(threshold);
        self
    }

    pub fn backer(mut self, backer: impl Into<String>) -> Self {
        self.backers.push(backer.into());
        self
    }

    pub fn backer_threshold(mut self, threshold: u64) -> Self {
        self.backer_threshold = threshold;
        self
    }

    pub fn config(mut self, trait_code: impl Into<String>) -> Self {
        self.config.push(trait_code.into());
        self
    }

    pub fn anchor(mut self, anchor: serde_json::Value) -> Self {
        self.anchors.push(anchor);
        self
    }

    /// Build the finalized inception event.
    pub fn build(self) -> Result<KeyEvent> {
        if self.keys.is_empty() {
            return Err(CoreError::MalformedEvent(
                "inception requires at least one signing key".into(),
            ));
        }
        let kt = self.signing_threshold.unwrap_or(1);
        let nt = self
            .next_threshold
            .unwrap_or(if self.next_digests.is_empty() { 0 } else { 1 });
        check_distinct("signing key", &self.keys)?;
        check_distinct("next key digest", &self.next_digests)?;
        check_threshold(kt, self.keys.len())?;
        check_threshold(nt, self.next_digests.len())?;
        check_backers(self.backer_threshold, &self.backers)?;
        check_digest_codes(&self.next_digests)?;

        let mut event = KeyEvent {
            version: Version::placeholder(),
            kind: EventKind::Inception,
            said: String::new(),
            prefix: String::new(),
            sn: 0,
            prior: None,
            signing_threshold: kt,
            keys: self.keys,
            next_threshold: nt,
            next_digests: self.next_digests,
            backer_threshold: self.backer_threshold,
            backers: self.backers,
            config: self.config,
            anchors: self.anchors,
        };
        saidify(&mut event)?;
        Ok(event)
    }
}

impl Default for InceptionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for rotation events against a known key state.
#[derive(Debug, Clone)]
pub struct RotationBuilder<'a> {
    state: &'a KeyState,
    keys: Vec<EncodedKey>,
    next_digests: Vec<EncodedKey>,
    signing_threshold: Option<u64>,
    next_threshold: Option<u64>,
    anchors: Vec<serde_json::Value>,
}

impl<'a> RotationBuilder<'a> {
    pub fn new(state: &'a KeyState) -> Self {
        Self {
            state,
            keys: Vec::new(),
            next_digests: Vec::new(),
            signing_threshold: None,
            next_threshold: None,
            anchors: Vec::new(),
        }
    }

    /// Add a new signing key. Must digest to one of the committed next keys.
    pub fn signing_key(mut self, key: &Ed25519PublicKey) -> Self {
        self.keys.push(key.to_encoded());
        self
    }

    pub fn next_key(mut self, key: &Ed25519PublicKey) -> Self {
        self.next_digests.push(key.digest());
        self
    }

    pub fn next_digest(mut self, digest: EncodedKey) -> Self {
        self.next_digests.push(digest);
        self
    }

    pub fn signing_threshold(mut self, threshold: u64) -> Self {
        self.signing_threshold = Some(threshold);
        self
    }

    pub fn next_threshold(mut self, threshold: u64) -> Self {
        self.next_threshold = Some(threshold);
        self
    }

    pub fn anchor(mut self, anchor: serde_json::Value) -> Self {
        self.anchors.push(anchor);
        self
    }

    /// Build the finalized rotation event.
    ///
    /// Fails with `KeyCommitmentMismatch` if any new key was not committed
    /// by the prior event.
    pub fn build(self) -> Result<KeyEvent> {
        let sn = self.state.sn + 1;
        if self.keys.is_empty() {
            return Err(CoreError::MalformedEvent(
                "rotation requires at least one signing key".into(),
            ));
        }
        check_distinct("signing key", &self.keys)?;
        check_distinct("next key digest", &self.next_digests)?;
        self.state.check_commitment(&self.keys, sn)?;

        let kt = self.signing_threshold.unwrap_or(1);
        let nt = self
            .next_threshold
            .unwrap_or(if self.next_digests.is_empty() { 0 } else { 1 });
        check_threshold(kt, self.keys.len())?;
        check_threshold(nt, self.next_digests.len())?;
        check_digest_codes(&self.next_digests)?;

        let mut event = KeyEvent {
            version: Version::placeholder(),
            kind: EventKind::Rotation,
            said: String::new(),
            prefix: self.state.prefix.to_string(),
            sn,
            prior: Some(self.state.last_said.clone()),
            signing_threshold: kt,
            keys: self.keys,
            next_threshold: nt,
            next_digests: self.next_digests,
            backer_threshold: self.state.backer_threshold,
            backers: self.state.backers.clone(),
            config: Vec::new(),
            anchors: self.anchors,
        };
        saidify(&mut event)?;
        Ok(event)
    }
}

/// Single-key inception with default thresholds.
pub fn incept(signing: &Ed25519PublicKey, next: &Ed25519PublicKey) -> Result<KeyEvent> {
    InceptionBuilder::new()
        .signing_key(signing)
        .next_key(next)
        .build()
}

/// Single-key rotation with default thresholds.
pub fn rotate(
    state: &KeyState,
    new_signing: &Ed25519PublicKey,
    new_next: &Ed25519PublicKey,
) -> Result<KeyEvent> {
    RotationBuilder::new(state)
        .signing_key(new_signing)
        .next_key(new_next)
        .build()
}

/// Request to format a group (multi-signature) event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEventRequest {
    /// Member identifier prefixes.
    pub members: Vec<String>,
    pub threshold: u64,
    /// Current member signing keys (`B` encoded).
    pub keys: Vec<EncodedKey>,
    /// Optional next-key digests for a group inception.
    #[serde(default)]
    pub next_digests: Vec<EncodedKey>,
    pub event_type: GroupEventType,
}

/// Format an unsigned group event.
pub fn build_group_event(request: &GroupEventRequest) -> Result<GroupEvent> {
    let identifiers = request.members.iter().collect::<HashSet<_>>().len();
    let keys = request.keys.iter().collect::<HashSet<_>>().len();
    if identifiers < 2 || keys < 2 {
        return Err(CoreError::InsufficientMembers { identifiers, keys });
    }
    check_distinct("member", &request.members)?;
    check_distinct("member key", &request.keys)?;
    check_distinct("next key digest", &request.next_digests)?;
    check_threshold(request.threshold, request.keys.len())?;

    for member in &request.members {
        Prefix::parse(member)?;
    }
    for key in &request.keys {
        if key.code() != DerivationCode::Ed25519 {
            return Err(CoreError::InvalidKeyEncoding(format!(
                "member key {} is not an Ed25519 verification key",
                key
            )));
        }
    }

    let body = match &request.event_type {
        GroupEventType::Inception => {
            check_digest_codes(&request.next_digests)?;
            let nt = if request.next_digests.is_empty() {
                0
            } else {
                request.threshold.min(request.next_digests.len() as u64)
            };
            let mut event = KeyEvent {
                version: Version::placeholder(),
                kind: EventKind::Inception,
                said: String::new(),
                prefix: String::new(),
                sn: 0,
                prior: None,
                signing_threshold: request.threshold,
                keys: request.keys.clone(),
                next_threshold: nt,
                next_digests: request.next_digests.clone(),
                backer_threshold: 0,
                backers: Vec::new(),
                config: Vec::new(),
                anchors: Vec::new(),
            };
            saidify(&mut event)?;
            GroupBody::Inception(event)
        }
        GroupEventType::Custom(kind) => {
            let mut proposal = GroupProposal {
                version: Version::placeholder(),
                kind: kind.clone(),
                said: String::new(),
                prefix: String::new(),
                members: request.members.clone(),
                threshold: request.threshold,
                keys: request.keys.clone(),
            };
            saidify(&mut proposal)?;
            GroupBody::Proposal(proposal)
        }
    };

    Ok(GroupEvent {
        members: request.members.clone(),
        body,
    })
}

fn check_backers(threshold: u64, backers: &[String]) -> Result<()> {
    if threshold > backers.len() as u64 {
        return Err(CoreError::InvalidThreshold {
            threshold,
            keys: backers.len(),
        });
    }
    Ok(())
}

fn check_digest_codes(digests: &[EncodedKey]) -> Result<()> {
    match digests.iter().find(|d| d.code() != DerivationCode::Sha256) {
        Some(d) => Err(CoreError::InvalidKeyEncoding(format!(
            "next key digest {} is not a SHA-256 digest",
            d
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::said::{recompute_said, verify_said, SAID_LENGTH};
    use crate::validation::validate_event;

    fn kp(seed: u8) -> Keypair {
        Keypair::from_seed(&[seed; 32])
    }

    fn member(seed: u8) -> (String, EncodedKey) {
        let icp = incept(&kp(seed).public_key(), &kp(seed + 100).public_key()).unwrap();
        (icp.prefix, kp(seed).public_key().to_encoded())
    }

    #[test]
    fn test_inception_defaults() {
        let event = incept(&kp(1).public_key(), &kp(2).public_key()).unwrap();
        assert_eq!(event.kind, EventKind::Inception);
        assert_eq!(event.sn, 0);
        assert_eq!(event.signing_threshold, 1);
        assert_eq!(event.next_threshold, 1);
        assert_eq!(event.backer_threshold, 0);
        assert_eq!(event.said, event.prefix);
        assert_eq!(event.said.len(), SAID_LENGTH);
        assert_eq!(event.keys, vec![kp(1).public_key().to_encoded()]);
        assert_eq!(event.next_digests, vec![kp(2).public_key().digest()]);
        assert!(event.prior.is_none());
    }

    #[test]
    fn test_inception_said_recomputes() {
        let event = incept(&kp(1).public_key(), &kp(2).public_key()).unwrap();
        assert_eq!(recompute_said(&event).unwrap().as_str(), event.said);
        let bytes = event.to_bytes().unwrap();
        assert_eq!(event.version.size, bytes.len());
        assert_eq!(KeyEvent::from_bytes(&bytes).unwrap(), event);
    }

    #[test]
    fn test_inception_deterministic() {
        let a = incept(&kp(1).public_key(), &kp(2).public_key()).unwrap();
        let b = incept(&kp(1).public_key(), &kp(2).public_key()).unwrap();
        assert_eq!(a, b);

        let c = incept(&kp(1).public_key(), &kp(3).public_key()).unwrap();
        assert_ne!(a.said, c.said);
    }

    #[test]
    fn test_inception_threshold_checks() {
        let err = InceptionBuilder::new()
            .signing_key(&kp(1).public_key())
            .next_key(&kp(2).public_key())
            .signing_threshold(2)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidThreshold { threshold: 2, keys: 1 }));

        let err = InceptionBuilder::new()
            .signing_key(&kp(1).public_key())
            .signing_threshold(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidThreshold { threshold: 0, .. }));

        assert!(InceptionBuilder::new().build().is_err());
    }

    #[test]
    fn test_multi_key_inception() {
        let event = InceptionBuilder::new()
            .signing_key(&kp(1).public_key())
            .signing_key(&kp(2).public_key())
            .signing_key(&kp(3).public_key())
            .next_key(&kp(4).public_key())
            .next_key(&kp(5).public_key())
            .signing_threshold(2)
            .next_threshold(2)
            .build()
            .unwrap();
        assert_eq!(event.keys.len(), 3);
        validate_event(&event).unwrap();
    }

    #[test]
    fn test_non_transferable_inception() {
        let event = InceptionBuilder::new()
            .signing_key(&kp(1).public_key())
            .build()
            .unwrap();
        assert_eq!(event.next_threshold, 0);
        assert!(event.next_digests.is_empty());
        let state = KeyState::incept(&event).unwrap();
        assert!(!state.is_transferable());
        assert!(matches!(
            rotate(&state, &kp(2).public_key(), &kp(3).public_key()),
            Err(CoreError::KeyCommitmentMismatch { .. })
        ));
    }

    #[test]
    fn test_rotation_chain_links() {
        let icp = incept(&kp(1).public_key(), &kp(2).public_key()).unwrap();
        let mut state = KeyState::incept(&icp).unwrap();
        let rot = rotate(&state, &kp(2).public_key(), &kp(3).public_key()).unwrap();

        assert_eq!(rot.kind, EventKind::Rotation);
        assert_eq!(rot.sn, 1);
        assert_eq!(rot.prefix, icp.said);
        assert_eq!(rot.prior.as_deref(), Some(icp.said.as_str()));
        assert_ne!(rot.said, icp.said);
        // The new key is the one the inception committed to.
        assert_eq!(
            Ed25519PublicKey::from_encoded(&rot.keys[0]).unwrap().digest(),
            icp.next_digests[0]
        );

        state.apply(&rot).unwrap();
        let rot2 = rotate(&state, &kp(3).public_key(), &kp(4).public_key()).unwrap();
        assert_eq!(rot2.sn, 2);
        assert_eq!(rot2.prior.as_deref(), Some(rot.said.as_str()));
    }

    #[test]
    fn test_rotation_uncommitted_key() {
        let icp = incept(&kp(1).public_key(), &kp(2).public_key()).unwrap();
        let state = KeyState::incept(&icp).unwrap();
        let err = rotate(&state, &kp(9).public_key(), &kp(3).public_key()).unwrap_err();
        match err {
            CoreError::KeyCommitmentMismatch { prefix, sn, key } => {
                assert_eq!(prefix, icp.prefix);
                assert_eq!(sn, 1);
                assert_eq!(key, kp(9).public_key().to_encoded().to_string());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rotation_must_meet_prior_next_threshold() {
        let icp = InceptionBuilder::new()
            .signing_key(&kp(1).public_key())
            .next_key(&kp(2).public_key())
            .next_key(&kp(3).public_key())
            .next_threshold(2)
            .build()
            .unwrap();
        let state = KeyState::incept(&icp).unwrap();

        assert!(matches!(
            rotate(&state, &kp(2).public_key(), &kp(4).public_key()),
            Err(CoreError::InvalidThreshold { threshold: 2, keys: 1 })
        ));

        let rot = RotationBuilder::new(&state)
            .signing_key(&kp(2).public_key())
            .signing_key(&kp(3).public_key())
            .next_key(&kp(4).public_key())
            .build()
            .unwrap();
        assert_eq!(rot.keys.len(), 2);
    }

    fn two_of_two() -> KeyState {
        let icp = InceptionBuilder::new()
            .signing_key(&kp(1).public_key())
            .signing_key(&kp(2).public_key())
            .signing_threshold(2)
            .next_key(&kp(3).public_key())
            .next_key(&kp(4).public_key())
            .next_threshold(2)
            .build()
            .unwrap();
        KeyState::incept(&icp).unwrap()
    }

    #[test]
    fn test_rotation_rejects_repeated_committed_key() {
        let state = two_of_two();

        // Holding only one of the two committed keys is not enough.
        let err = RotationBuilder::new(&state)
            .signing_key(&kp(3).public_key())
            .signing_key(&kp(3).public_key())
            .signing_threshold(2)
            .next_key(&kp(5).public_key())
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::MalformedEvent(_)));

        let k3 = kp(3).public_key().to_encoded();
        assert!(matches!(
            state.check_commitment(&[k3.clone(), k3], 1),
            Err(CoreError::InvalidThreshold { threshold: 2, keys: 1 })
        ));

        let rot = RotationBuilder::new(&state)
            .signing_key(&kp(3).public_key())
            .signing_key(&kp(4).public_key())
            .signing_threshold(2)
            .next_key(&kp(5).public_key())
            .build()
            .unwrap();
        assert_eq!(rot.keys.len(), 2);
    }

    #[test]
    fn test_inception_rejects_repeated_keys() {
        assert!(matches!(
            InceptionBuilder::new()
                .signing_key(&kp(1).public_key())
                .signing_key(&kp(1).public_key())
                .signing_threshold(2)
                .next_key(&kp(2).public_key())
                .build(),
            Err(CoreError::MalformedEvent(_))
        ));
        assert!(matches!(
            InceptionBuilder::new()
                .signing_key(&kp(1).public_key())
                .next_key(&kp(2).public_key())
                .next_key(&kp(2).public_key())
                .next_threshold(2)
                .build(),
            Err(CoreError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_group_counts_distinct_members() {
        let (m1, k1) = member(1);
        let (m2, k2) = member(2);
        let (_, k3) = member(3);

        let request = GroupEventRequest {
            members: vec![m1.clone(), m1.clone()],
            threshold: 2,
            keys: vec![k1.clone(), k1.clone()],
            next_digests: vec![],
            event_type: "rot".into(),
        };
        assert!(matches!(
            build_group_event(&request),
            Err(CoreError::InsufficientMembers { identifiers: 1, keys: 1 })
        ));

        let request = GroupEventRequest {
            members: vec![m1.clone(), m2.clone(), m1],
            threshold: 2,
            keys: vec![k1.clone(), k2.clone(), k3],
            next_digests: vec![],
            event_type: GroupEventType::Inception,
        };
        assert!(matches!(
            build_group_event(&request),
            Err(CoreError::MalformedEvent(_))
        ));

        let request = GroupEventRequest {
            members: vec![member(4).0, m2],
            threshold: 2,
            keys: vec![k1.clone(), k2, k1],
            next_digests: vec![],
            event_type: "rot".into(),
        };
        assert!(matches!(
            build_group_event(&request),
            Err(CoreError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_group_requires_two_members() {
        let (m1, k1) = member(1);
        let (_, k2) = member(2);
        let request = GroupEventRequest {
            members: vec![m1],
            threshold: 1,
            keys: vec![k1, k2],
            next_digests: vec![],
            event_type: GroupEventType::Inception,
        };
        assert!(matches!(
            build_group_event(&request),
            Err(CoreError::InsufficientMembers {
                identifiers: 1,
                keys: 2
            })
        ));
    }

    #[test]
    fn test_group_threshold_bounds() {
        let (m1, k1) = member(1);
        let (m2, k2) = member(2);
        let mut request = GroupEventRequest {
            members: vec![m1, m2],
            threshold: 0,
            keys: vec![k1, k2],
            next_digests: vec![],
            event_type: GroupEventType::Inception,
        };
        assert!(matches!(
            build_group_event(&request),
            Err(CoreError::InvalidThreshold { threshold: 0, keys: 2 })
        ));

        request.threshold = 3;
        assert!(matches!(
            build_group_event(&request),
            Err(CoreError::InvalidThreshold { threshold: 3, keys: 2 })
        ));
    }

    #[test]
    fn test_group_inception() {
        let (m1, k1) = member(1);
        let (m2, k2) = member(2);
        let (m3, k3) = member(3);
        let request = GroupEventRequest {
            members: vec![m1.clone(), m2.clone(), m3.clone()],
            threshold: 2,
            keys: vec![k1, k2, k3],
            next_digests: vec![],
            event_type: GroupEventType::Inception,
        };
        let group = build_group_event(&request).unwrap();

        assert_eq!(group.event_type(), "icp");
        assert_eq!(group.said(), group.prefix());
        for m in [&m1, &m2, &m3] {
            assert_ne!(group.prefix(), m.as_str());
        }
        match &group.body {
            GroupBody::Inception(e) => {
                assert_eq!(e.signing_threshold, 2);
                assert_eq!(e.keys.len(), 3);
                assert_eq!(e.next_threshold, 0);
                validate_event(e).unwrap();
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_group_proposal() {
        let (m1, k1) = member(1);
        let (m2, k2) = member(2);
        let request = GroupEventRequest {
            members: vec![m1.clone(), m2.clone()],
            threshold: 2,
            keys: vec![k1, k2],
            next_digests: vec![],
            event_type: GroupEventType::Custom("rot".into()),
        };
        let group = build_group_event(&request).unwrap();
        assert_eq!(group.event_type(), "rot");
        match &group.body {
            GroupBody::Proposal(p) => {
                assert_eq!(p.members, vec![m1, m2]);
                verify_said(p).unwrap();
            }
            other => panic!("unexpected body: {other:?}"),
        }
        let bytes = group.to_bytes().unwrap();
        assert!(bytes.starts_with(b"{\"v\":\"KERI10JSON"));
        assert_eq!(group.version().size, bytes.len());
    }

    #[test]
    fn test_group_rejects_digest_as_member_key() {
        let (m1, k1) = member(1);
        let (m2, _) = member(2);
        let request = GroupEventRequest {
            members: vec![m1, m2],
            threshold: 1,
            keys: vec![k1, kp(2).public_key().digest()],
            next_digests: vec![],
            event_type: GroupEventType::Inception,
        };
        assert!(matches!(
            build_group_event(&request),
            Err(CoreError::InvalidKeyEncoding(_))
        ));
    }
}
