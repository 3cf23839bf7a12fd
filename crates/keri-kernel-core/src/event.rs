//! Key events: the entries of a Key Event Log.
//!
//! An event is immutable once its SAID is computed. Changes to an identity's
//! control authority are new events, never edits.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::{canonical_bytes, Version};
use crate::error::{CoreError, Result};
use crate::said::SelfAddressing;
use crate::types::{EncodedKey, Prefix};

/// The type tag of a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Inception: establishes the identifier (sn 0).
    #[serde(rename = "icp")]
    Inception,
    /// Rotation: replaces the signing keys with the pre-committed ones.
    #[serde(rename = "rot")]
    Rotation,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inception => "icp",
            Self::Rotation => "rot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "icp" => Some(Self::Inception),
            "rot" => Some(Self::Rotation),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inception or rotation event in wire form.
///
/// Field order here is the serialization order and is part of the SAID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyEvent {
    #[serde(rename = "v")]
    pub version: Version,

    #[serde(rename = "t")]
    pub kind: EventKind,

    /// SAID of this event.
    #[serde(rename = "d")]
    pub said: String,

    /// Identifier prefix. Equal to `said` for inception.
    #[serde(rename = "i")]
    pub prefix: String,

    #[serde(rename = "s", with = "decimal")]
    pub sn: u64,

    /// SAID of the prior event. Rotation only.
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<String>,

    #[serde(rename = "kt", with = "decimal")]
    pub signing_threshold: u64,

    #[serde(rename = "k")]
    pub keys: Vec<EncodedKey>,

    #[serde(rename = "nt", with = "decimal")]
    pub next_threshold: u64,

    /// Digests of the next signing keys.
    #[serde(rename = "n")]
    pub next_digests: Vec<EncodedKey>,

    #[serde(rename = "bt", with = "decimal")]
    pub backer_threshold: u64,

    #[serde(rename = "b")]
    pub backers: Vec<String>,

    #[serde(rename = "c")]
    pub config: Vec<String>,

    #[serde(rename = "a")]
    pub anchors: Vec<serde_json::Value>,
}

impl KeyEvent {
    pub fn is_inception(&self) -> bool {
        self.kind == EventKind::Inception
    }

    /// The identifier prefix, validated.
    pub fn identifier(&self) -> Result<Prefix> {
        Prefix::parse(&self.prefix)
    }

    /// The first signing key. Single-signer identities have exactly one.
    pub fn current_key(&self) -> Option<&EncodedKey> {
        self.keys.first()
    }

    /// The first next-key digest, if the identity is still rotatable.
    pub fn next_digest(&self) -> Option<&EncodedKey> {
        self.next_digests.first()
    }

    /// Canonical serialization of the event as it stands.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        canonical_bytes(self)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse an event from its serialized form. Does not verify the SAID.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CoreError::MalformedEvent(e.to_string()))
    }
}

impl SelfAddressing for KeyEvent {
    fn version(&self) -> &Version {
        &self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn said(&self) -> &str {
        &self.said
    }

    fn set_self_fields(&mut self, value: &str) {
        self.said = value.to_string();
        if self.is_inception() {
            self.prefix = value.to_string();
        }
    }
}

/// A SAID-addressed proposal circulated among group members.
///
/// Used for group event types other than inception. The proposal is its own
/// prefix: `i` is derived the same way as `d`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupProposal {
    #[serde(rename = "v")]
    pub version: Version,

    /// Proposed event type, e.g. `rot`.
    #[serde(rename = "t")]
    pub kind: String,

    #[serde(rename = "d")]
    pub said: String,

    #[serde(rename = "i")]
    pub prefix: String,

    /// Member identifiers.
    #[serde(rename = "m")]
    pub members: Vec<String>,

    #[serde(rename = "kt", with = "decimal")]
    pub threshold: u64,

    #[serde(rename = "k")]
    pub keys: Vec<EncodedKey>,
}

impl SelfAddressing for GroupProposal {
    fn version(&self) -> &Version {
        &self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn said(&self) -> &str {
        &self.said
    }

    fn set_self_fields(&mut self, value: &str) {
        self.said = value.to_string();
        self.prefix = value.to_string();
    }
}

/// Which group event to format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GroupEventType {
    /// A multi-key `icp` event establishing the group identifier.
    Inception,
    /// Any other type: formatted as a group proposal.
    Custom(String),
}

impl GroupEventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inception => "inception",
            Self::Custom(s) => s,
        }
    }
}

impl From<String> for GroupEventType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "inception" | "icp" => Self::Inception,
            _ => Self::Custom(s),
        }
    }
}

impl From<&str> for GroupEventType {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<GroupEventType> for String {
    fn from(t: GroupEventType) -> Self {
        t.as_str().to_string()
    }
}

/// The body of a formatted group event.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupBody {
    Inception(KeyEvent),
    Proposal(GroupProposal),
}

/// An unsigned group event and the members it was formatted for.
///
/// Signature collection happens elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupEvent {
    pub members: Vec<String>,
    pub body: GroupBody,
}

impl GroupEvent {
    pub fn said(&self) -> &str {
        match &self.body {
            GroupBody::Inception(e) => &e.said,
            GroupBody::Proposal(p) => &p.said,
        }
    }

    /// The group prefix.
    pub fn prefix(&self) -> &str {
        match &self.body {
            GroupBody::Inception(e) => &e.prefix,
            GroupBody::Proposal(p) => &p.prefix,
        }
    }

    /// Wire type tag of the body.
    pub fn event_type(&self) -> &str {
        match &self.body {
            GroupBody::Inception(e) => e.kind.as_str(),
            GroupBody::Proposal(p) => &p.kind,
        }
    }

    pub fn version(&self) -> &Version {
        match &self.body {
            GroupBody::Inception(e) => &e.version,
            GroupBody::Proposal(p) => &p.version,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match &self.body {
            GroupBody::Inception(e) => canonical_bytes(e),
            GroupBody::Proposal(p) => canonical_bytes(p),
        }
    }
}

/// Any control event the kernel formats.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    Inception(KeyEvent),
    Rotation(KeyEvent),
    Group(GroupEvent),
}

impl ControlEvent {
    /// Parse serialized bytes. A multi-key `icp` parses as `Inception`; a
    /// document with an `m` field parses as a group proposal.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let document: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| CoreError::MalformedEvent(e.to_string()))?;
        let obj = document
            .as_object()
            .ok_or_else(|| CoreError::MalformedEvent("event is not a JSON object".into()))?;

        if obj.contains_key("m") {
            let proposal: GroupProposal = serde_json::from_slice(bytes)
                .map_err(|e| CoreError::MalformedEvent(e.to_string()))?;
            return Ok(Self::Group(GroupEvent {
                members: proposal.members.clone(),
                body: GroupBody::Proposal(proposal),
            }));
        }

        let event = KeyEvent::from_bytes(bytes)?;
        Ok(match event.kind {
            EventKind::Inception => Self::Inception(event),
            EventKind::Rotation => Self::Rotation(event),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Inception(e) | Self::Rotation(e) => e.to_bytes(),
            Self::Group(g) => g.to_bytes(),
        }
    }

    pub fn said(&self) -> &str {
        match self {
            Self::Inception(e) | Self::Rotation(e) => &e.said,
            Self::Group(g) => g.said(),
        }
    }

    pub fn prefix(&self) -> &str {
        match self {
            Self::Inception(e) | Self::Rotation(e) => &e.prefix,
            Self::Group(g) => g.prefix(),
        }
    }

    pub fn version(&self) -> &Version {
        match self {
            Self::Inception(e) | Self::Rotation(e) => &e.version,
            Self::Group(g) => g.version(),
        }
    }

    pub fn as_key_event(&self) -> Option<&KeyEvent> {
        match self {
            Self::Inception(e) | Self::Rotation(e) => Some(e),
            Self::Group(GroupEvent {
                body: GroupBody::Inception(e),
                ..
            }) => Some(e),
            Self::Group(_) => None,
        }
    }
}

impl From<KeyEvent> for ControlEvent {
    fn from(event: KeyEvent) -> Self {
        match event.kind {
            EventKind::Inception => Self::Inception(event),
            EventKind::Rotation => Self::Rotation(event),
        }
    }
}

/// Decimal-string encoding for sequence numbers and thresholds.
///
/// Only the canonical form is accepted: no sign, no leading zeros, no
/// whitespace.
pub(crate) mod decimal {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        let value: u64 = s
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid decimal string {:?}", s)))?;
        if value.to_string() != s {
            return Err(D::Error::custom(format!("non-canonical decimal {:?}", s)));
        }
        Ok(value)
    }
}
