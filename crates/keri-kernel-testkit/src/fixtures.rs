//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use keri_kernel_core::{
    incept, rotate, EventRecord, GroupEventRequest, GroupEventType, KeyEvent, KeyState, Keypair,
    Prefix,
};
use keri_kernel_store::{KelStore, MemoryStore};

/// A deterministic identity with its whole key history.
///
/// Key `i` is derived from `"<label>/<i>"`, so two fixtures with the same
/// label produce the same events.
pub struct TestIdentity {
    pub label: String,
    pub state: KeyState,
    pub events: Vec<KeyEvent>,
}

impl TestIdentity {
    /// Incept with keys 0 (signing) and 1 (next).
    pub fn new(label: &str) -> Self {
        let event = incept(&key(label, 0).public_key(), &key(label, 1).public_key())
            .expect("fixture inception");
        let state = KeyState::incept(&event).expect("fixture state");
        Self {
            label: label.to_string(),
            state,
            events: vec![event],
        }
    }

    /// Incept and rotate `n` times.
    pub fn with_rotations(label: &str, n: u64) -> Self {
        let mut identity = Self::new(label);
        for _ in 0..n {
            identity.rotate();
        }
        identity
    }

    pub fn identifier(&self) -> Prefix {
        self.state.prefix.clone()
    }

    pub fn inception(&self) -> &KeyEvent {
        &self.events[0]
    }

    /// The keypair currently authorized to sign.
    pub fn current_keypair(&self) -> Keypair {
        key(&self.label, self.state.sn)
    }

    /// The keypair committed for the next rotation.
    pub fn next_keypair(&self) -> Keypair {
        key(&self.label, self.state.sn + 1)
    }

    /// Rotate to the committed key and commit to the one after it.
    pub fn rotate(&mut self) -> KeyEvent {
        let sn = self.state.sn;
        let event = rotate(
            &self.state,
            &key(&self.label, sn + 1).public_key(),
            &key(&self.label, sn + 2).public_key(),
        )
        .expect("fixture rotation");
        self.state.apply(&event).expect("fixture apply");
        self.events.push(event.clone());
        event
    }

    /// A rotation that presents a key nobody committed to.
    pub fn rogue_rotation_keys(&self) -> (Keypair, Keypair) {
        (
            key(&format!("{}/rogue", self.label), 0),
            key(&format!("{}/rogue", self.label), 1),
        )
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.events
            .iter()
            .enumerate()
            .map(|(i, e)| EventRecord::from_event(e, 1_000 + i as i64).expect("fixture record"))
            .collect()
    }

    /// Append the whole log to a store.
    pub async fn append_to<S: KelStore + ?Sized>(&self, store: &S) {
        let identifier = self.identifier();
        for record in self.records() {
            store
                .append(&identifier, &record)
                .await
                .expect("fixture append");
        }
    }

    /// A memory store holding this identity's log.
    pub async fn store(&self) -> MemoryStore {
        let store = MemoryStore::new();
        self.append_to(&store).await;
        store
    }
}

/// Derive the `index`-th key of a labelled key chain.
pub fn key(label: &str, index: u64) -> Keypair {
    Keypair::derive(format!("{}/{}", label, index).as_bytes())
}

/// Create multiple identities for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<TestIdentity> {
    (0..count)
        .map(|i| TestIdentity::new(&format!("party-{}", i)))
        .collect()
}

/// A group request over the parties' identifiers and current keys.
pub fn group_request(
    parties: &[TestIdentity],
    threshold: u64,
    event_type: impl Into<GroupEventType>,
) -> GroupEventRequest {
    GroupEventRequest {
        members: parties.iter().map(|p| p.identifier().to_string()).collect(),
        threshold,
        keys: parties
            .iter()
            .map(|p| p.current_keypair().public_key().to_encoded())
            .collect(),
        next_digests: Vec::new(),
        event_type: event_type.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keri_kernel_core::build_group_event;
    use keri_kernel_store::StoreExt;

    #[test]
    fn test_fixture_is_deterministic() {
        let a = TestIdentity::with_rotations("alice", 2);
        let b = TestIdentity::with_rotations("alice", 2);
        assert_eq!(a.events, b.events);
        assert_ne!(a.identifier(), TestIdentity::new("bob").identifier());
    }

    #[test]
    fn test_fixture_chain() {
        let alice = TestIdentity::with_rotations("alice", 3);
        assert_eq!(alice.events.len(), 4);
        for pair in alice.events.windows(2) {
            assert_eq!(pair[1].prior.as_deref(), Some(pair[0].said.as_str()));
            assert_eq!(pair[1].sn, pair[0].sn + 1);
        }
        assert_eq!(
            alice.current_keypair().public_key().to_encoded(),
            alice.state.keys[0]
        );
    }

    #[tokio::test]
    async fn test_fixture_store_replays() {
        let alice = TestIdentity::with_rotations("alice", 2);
        let store = alice.store().await;
        let replayed = store.load_key_state(&alice.identifier()).await.unwrap();
        assert_eq!(replayed, Some(alice.state.clone()));
    }

    #[test]
    fn test_multi_party() {
        let parties = multi_party_fixtures(3);
        let group = build_group_event(&group_request(&parties, 2, "rot")).unwrap();
        assert_eq!(group.members.len(), 3);
        assert!(parties
            .iter()
            .all(|p| p.identifier().as_str() != group.prefix()));
    }
}
