//! Key custody.
//!
//! The core never persists private keys. A [`Keychain`] holds the current
//! and pre-committed next key of identities the kernel created itself.

use std::collections::HashMap;

use async_trait::async_trait;
use keri_kernel_core::{Keypair, Prefix};
use tokio::sync::RwLock;

use crate::error::{KernelError, Result};

/// Custody of signing keys, indexed by identifier.
#[async_trait]
pub trait Keychain: Send + Sync {
    /// Take custody of an identity's current and next keys.
    async fn store(&self, identifier: &Prefix, current: Keypair, next: Keypair) -> Result<()>;

    async fn current(&self, identifier: &Prefix) -> Result<Option<Keypair>>;

    async fn next(&self, identifier: &Prefix) -> Result<Option<Keypair>>;

    /// Promote the held next key to current and hold `new_next` as next.
    ///
    /// Call only after the rotation event is appended.
    async fn commit_rotation(&self, identifier: &Prefix, new_next: Keypair) -> Result<()>;
}

#[derive(Clone)]
struct Slot {
    current: Keypair,
    next: Keypair,
}

/// In-memory keychain. Keys are lost when it is dropped.
#[derive(Default)]
pub struct SoftwareKeychain {
    slots: RwLock<HashMap<Prefix, Slot>>,
}

impl SoftwareKeychain {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Keychain for SoftwareKeychain {
    async fn store(&self, identifier: &Prefix, current: Keypair, next: Keypair) -> Result<()> {
        let mut slots = self.slots.write().await;
        if slots.contains_key(identifier) {
            return Err(KernelError::DuplicateIdentity(identifier.to_string()));
        }
        slots.insert(identifier.clone(), Slot { current, next });
        Ok(())
    }

    async fn current(&self, identifier: &Prefix) -> Result<Option<Keypair>> {
        Ok(self
            .slots
            .read()
            .await
            .get(identifier)
            .map(|s| s.current.clone()))
    }

    async fn next(&self, identifier: &Prefix) -> Result<Option<Keypair>> {
        Ok(self
            .slots
            .read()
            .await
            .get(identifier)
            .map(|s| s.next.clone()))
    }

    async fn commit_rotation(&self, identifier: &Prefix, new_next: Keypair) -> Result<()> {
        let mut slots = self.slots.write().await;
        let slot = slots
            .get_mut(identifier)
            .ok_or_else(|| KernelError::KeyUnavailable(identifier.to_string()))?;
        slot.current = std::mem::replace(&mut slot.next, new_next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keri_kernel_core::incept;

    fn id_for(kp: &Keypair, next: &Keypair) -> Prefix {
        incept(&kp.public_key(), &next.public_key())
            .unwrap()
            .identifier()
            .unwrap()
    }

    #[tokio::test]
    async fn test_store_and_fetch() {
        let keychain = SoftwareKeychain::new();
        let (current, next) = (Keypair::from_seed(&[1; 32]), Keypair::from_seed(&[2; 32]));
        let id = id_for(&current, &next);

        keychain.store(&id, current.clone(), next.clone()).await.unwrap();

        let held = keychain.current(&id).await.unwrap().unwrap();
        assert_eq!(held.public_key(), current.public_key());
        let held = keychain.next(&id).await.unwrap().unwrap();
        assert_eq!(held.public_key(), next.public_key());
    }

    #[tokio::test]
    async fn test_commit_rotation_promotes_next() {
        let keychain = SoftwareKeychain::new();
        let (current, next) = (Keypair::from_seed(&[1; 32]), Keypair::from_seed(&[2; 32]));
        let id = id_for(&current, &next);
        keychain.store(&id, current, next.clone()).await.unwrap();

        let newer = Keypair::from_seed(&[3; 32]);
        keychain.commit_rotation(&id, newer.clone()).await.unwrap();

        let held = keychain.current(&id).await.unwrap().unwrap();
        assert_eq!(held.public_key(), next.public_key());
        let held = keychain.next(&id).await.unwrap().unwrap();
        assert_eq!(held.public_key(), newer.public_key());
    }

    #[tokio::test]
    async fn test_unknown_identity() {
        let keychain = SoftwareKeychain::new();
        let id = id_for(&Keypair::from_seed(&[9; 32]), &Keypair::from_seed(&[8; 32]));
        assert!(keychain.current(&id).await.unwrap().is_none());
        assert!(matches!(
            keychain.commit_rotation(&id, Keypair::generate()).await,
            Err(KernelError::KeyUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_store_twice_rejected() {
        let keychain = SoftwareKeychain::new();
        let (current, next) = (Keypair::from_seed(&[1; 32]), Keypair::from_seed(&[2; 32]));
        let id = id_for(&current, &next);
        keychain.store(&id, current.clone(), next.clone()).await.unwrap();
        assert!(matches!(
            keychain.store(&id, current, next).await,
            Err(KernelError::DuplicateIdentity(_))
        ));
    }
}
