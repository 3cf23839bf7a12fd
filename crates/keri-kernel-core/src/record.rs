//! Event records: the unit a KEL store persists.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::event::{EventKind, KeyEvent};
use crate::types::{EncodedKey, Prefix};

/// One stored event. Immutable; ordered by `sn` within an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub identifier: Prefix,
    pub sn: u64,
    pub kind: EventKind,
    pub said: String,

    /// The canonical event JSON, byte-exact as signed and hashed.
    pub event_json: String,

    pub current_public_key: EncodedKey,
    pub next_key_digest: Option<EncodedKey>,

    /// Unix milliseconds when the record was created locally.
    pub timestamp: i64,
}

impl EventRecord {
    /// Build a record from a finalized event.
    pub fn from_event(event: &KeyEvent, timestamp: i64) -> Result<Self> {
        let current_public_key = event
            .current_key()
            .cloned()
            .ok_or_else(|| CoreError::MalformedEvent("event has no signing keys".into()))?;

        Ok(Self {
            identifier: event.identifier()?,
            sn: event.sn,
            kind: event.kind,
            said: event.said.clone(),
            event_json: event.to_json()?,
            current_public_key,
            next_key_digest: event.next_digest().cloned(),
            timestamp,
        })
    }

    /// Decode the stored event.
    pub fn event(&self) -> Result<KeyEvent> {
        KeyEvent::from_bytes(self.event_json.as_bytes())
    }
}
