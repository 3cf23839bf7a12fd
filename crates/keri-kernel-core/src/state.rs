//! Key state: the control authority an event log establishes.
//!
//! [`KeyState`] is the full replayed state used to validate the next event.
//! [`IdentityState`] is the compact materialized view a store keeps per
//! identifier.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::crypto::Ed25519PublicKey;
use crate::error::{CoreError, Result};
use crate::event::{EventKind, KeyEvent};
use crate::types::{EncodedKey, Prefix};
use crate::validation::validate_event;

/// Control authority after the latest accepted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyState {
    pub prefix: Prefix,

    /// Sequence number of the latest event.
    pub sn: u64,

    /// SAID of the latest event.
    pub last_said: String,

    pub keys: Vec<EncodedKey>,
    pub signing_threshold: u64,

    /// Committed digests of the next signing keys.
    pub next_digests: Vec<EncodedKey>,
    pub next_threshold: u64,

    pub backers: Vec<String>,
    pub backer_threshold: u64,
}

impl KeyState {
    /// Establish state from an inception event.
    pub fn incept(event: &KeyEvent) -> Result<Self> {
        if event.kind != EventKind::Inception {
            return Err(CoreError::MalformedEvent(format!(
                "expected inception, got {}",
                event.kind
            )));
        }
        validate_event(event)?;

        Ok(Self {
            prefix: event.identifier()?,
            sn: 0,
            last_said: event.said.clone(),
            keys: event.keys.clone(),
            signing_threshold: event.signing_threshold,
            next_digests: event.next_digests.clone(),
            next_threshold: event.next_threshold,
            backers: event.backers.clone(),
            backer_threshold: event.backer_threshold,
        })
    }

    /// Check that `event` may follow this state, without applying it.
    pub fn check(&self, event: &KeyEvent) -> Result<()> {
        if event.kind != EventKind::Rotation {
            return Err(CoreError::MalformedEvent(format!(
                "cannot apply {} to an incepted identity",
                event.kind
            )));
        }
        validate_event(event)?;

        if event.prefix != self.prefix.as_str() {
            return Err(CoreError::PrefixMismatch {
                expected: self.prefix.to_string(),
                got: event.prefix.clone(),
            });
        }

        let expected = self.sn + 1;
        if event.sn != expected {
            return Err(CoreError::SequenceConflict {
                expected,
                got: event.sn,
            });
        }

        if event.prior.as_deref() != Some(self.last_said.as_str()) {
            return Err(CoreError::PriorEventMismatch {
                expected: self.last_said.clone(),
                got: event.prior.clone(),
            });
        }

        self.check_commitment(&event.keys, event.sn)
    }

    /// Check that every key in `keys` was pre-committed and that enough
    /// distinct committed keys are presented to satisfy the next threshold.
    pub fn check_commitment(&self, keys: &[EncodedKey], sn: u64) -> Result<()> {
        let mut presented = HashSet::with_capacity(keys.len());
        for key in keys {
            let digest = Ed25519PublicKey::from_encoded(key)?.digest();
            if !self.next_digests.contains(&digest) {
                return Err(CoreError::KeyCommitmentMismatch {
                    prefix: self.prefix.to_string(),
                    sn,
                    key: key.to_string(),
                });
            }
            presented.insert(digest);
        }

        if (presented.len() as u64) < self.next_threshold {
            return Err(CoreError::InvalidThreshold {
                threshold: self.next_threshold,
                keys: presented.len(),
            });
        }

        Ok(())
    }

    /// Validate `event` against this state and advance.
    pub fn apply(&mut self, event: &KeyEvent) -> Result<()> {
        self.check(event)?;

        self.sn = event.sn;
        self.last_said = event.said.clone();
        self.keys = event.keys.clone();
        self.signing_threshold = event.signing_threshold;
        self.next_digests = event.next_digests.clone();
        self.next_threshold = event.next_threshold;
        self.backers = event.backers.clone();
        self.backer_threshold = event.backer_threshold;
        Ok(())
    }

    /// Replay a whole log from sequence 0.
    pub fn replay<'a, I>(events: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a KeyEvent>,
    {
        let mut iter = events.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| CoreError::MalformedEvent("empty event log".into()))?;
        let mut state = Self::incept(first)?;
        for event in iter {
            state.apply(event)?;
        }
        Ok(state)
    }

    /// Whether the identity can still rotate.
    pub fn is_transferable(&self) -> bool {
        !self.next_digests.is_empty()
    }
}

/// Materialized per-identifier view over the log.
///
/// Always reconstructible by replaying the log from sequence 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityState {
    pub identifier: Prefix,

    pub current_public_key: EncodedKey,

    /// `None` once the identity has been made non-transferable.
    pub next_key_digest: Option<EncodedKey>,

    /// Unix milliseconds at inception.
    pub created_at: i64,

    /// Number of events in the log.
    pub event_count: u64,
}

impl IdentityState {
    /// The view right after inception.
    pub fn from_inception(event: &KeyEvent, now: i64) -> Result<Self> {
        if event.kind != EventKind::Inception {
            return Err(CoreError::MalformedEvent(format!(
                "expected inception, got {}",
                event.kind
            )));
        }
        Ok(Self {
            identifier: event.identifier()?,
            current_public_key: first_key(event)?,
            next_key_digest: event.next_digest().cloned(),
            created_at: now,
            event_count: 1,
        })
    }

    /// Fold one more event into the view.
    pub fn advance(&mut self, event: &KeyEvent) -> Result<()> {
        if event.sn != self.event_count {
            return Err(CoreError::SequenceConflict {
                expected: self.event_count,
                got: event.sn,
            });
        }
        self.current_public_key = first_key(event)?;
        self.next_key_digest = event.next_digest().cloned();
        self.event_count += 1;
        Ok(())
    }

    /// Sequence number of the latest event.
    pub fn sn(&self) -> u64 {
        self.event_count.saturating_sub(1)
    }
}

fn first_key(event: &KeyEvent) -> Result<EncodedKey> {
    event
        .current_key()
        .cloned()
        .ok_or_else(|| CoreError::MalformedEvent("event has no signing keys".into()))
}
