//! # KERI Kernel Core
//!
//! Pure primitives for the KERI Kernel: key events, self-addressing
//! identifiers, and canonicalization.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`KeyEvent`] - An inception or rotation event in wire form
//! - [`Prefix`] - An identifier: the SAID of its inception event
//! - [`KeyState`] - Control authority replayed from a Key Event Log
//! - [`EncodedKey`] - Derivation-code prefixed base64url key or digest
//!
//! ## Canonicalization
//!
//! Events are compact JSON with a size-locked version string. See
//! [`canonical`] and [`said`].

pub mod builder;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod event;
pub mod record;
pub mod said;
pub mod state;
pub mod types;
pub mod validation;

pub use builder::{
    build_group_event, incept, rotate, GroupEventRequest, InceptionBuilder, RotationBuilder,
};
pub use canonical::{canonical_bytes, parse_version, Version};
pub use crypto::{sign, verify, Ed25519PublicKey, Ed25519Signature, Keypair, Sha256Digest};
pub use error::CoreError;
pub use event::{
    ControlEvent, EventKind, GroupBody, GroupEvent, GroupEventType, GroupProposal, KeyEvent,
};
pub use record::EventRecord;
pub use said::{compute_said, saidify, verify_said, SelfAddressing, SAID_LENGTH};
pub use state::{IdentityState, KeyState};
pub use types::{DerivationCode, EncodedKey, Prefix};
pub use validation::{validate_event, validate_event_bytes};
