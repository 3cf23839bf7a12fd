//! The capability interface shared by the local and delegated kernels.

use async_trait::async_trait;
use keri_kernel_core::{
    Ed25519PublicKey, Ed25519Signature, GroupEvent, GroupEventRequest, IdentityState, KeyEvent,
    Prefix,
};

use crate::error::Result;

/// Result of a successful inception.
#[derive(Debug, Clone, PartialEq)]
pub struct Inception {
    pub identifier: Prefix,
    pub event: KeyEvent,
}

/// Result of a successful rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Rotation {
    pub event: KeyEvent,
    /// Sequence number of the new event.
    pub sn: u64,
}

/// Identity control operations.
///
/// [`crate::Kernel`] implements this in process;
/// [`crate::driver::DriverClient`] implements it against a driver over
/// loopback HTTP. Both report failures with the same [`crate::KernelError`]
/// kinds.
#[async_trait]
pub trait Controller: Send + Sync {
    /// Create an identity from caller-supplied keys.
    ///
    /// # Errors
    /// `DuplicateIdentity` if the resulting identifier already has a log.
    async fn incept(
        &self,
        signing: &Ed25519PublicKey,
        next: &Ed25519PublicKey,
    ) -> Result<Inception>;

    /// Rotate to the pre-committed key.
    ///
    /// # Errors
    /// - `NoSuchIdentity` if the identifier has no log.
    /// - `KeyCommitmentMismatch` if `new_signing` does not digest to the
    ///   committed next digest. Nothing is appended.
    async fn rotate(
        &self,
        identifier: &Prefix,
        new_signing: &Ed25519PublicKey,
        new_next: &Ed25519PublicKey,
    ) -> Result<Rotation>;

    /// Sign a payload with the identity's current key.
    async fn sign(&self, identifier: &Prefix, payload: &[u8]) -> Result<Ed25519Signature>;

    /// Verify a signature against a `B`-encoded public key.
    ///
    /// Malformed input yields `Ok(false)`. Errors are transport failures only.
    async fn verify(&self, payload: &[u8], signature: &[u8], public_key: &str) -> Result<bool>;

    /// Format an unsigned group event.
    async fn multisig(&self, request: &GroupEventRequest) -> Result<GroupEvent>;

    /// The full Key Event Log of an identity.
    async fn kel(&self, identifier: &Prefix) -> Result<Vec<KeyEvent>>;

    async fn state(&self, identifier: &Prefix) -> Result<IdentityState>;

    /// Generate keys, incept, and keep the keys in custody.
    async fn create_identity(&self) -> Result<IdentityState>;

    /// Rotate a custodied identity to its held next key.
    async fn rotate_identity(&self, identifier: &Prefix) -> Result<IdentityState>;
}
