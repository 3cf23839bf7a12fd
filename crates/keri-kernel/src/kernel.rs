//! The Kernel: the local identity controller.
//!
//! The Kernel brings together event building, key custody, and the Key
//! Event Log store behind the [`Controller`] interface.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use keri_kernel_core::crypto::verify_encoded;
use keri_kernel_core::{
    build_group_event, incept, rotate, CoreError, Ed25519PublicKey, Ed25519Signature,
    EventRecord, GroupEvent, GroupEventRequest, IdentityState, KeyEvent, KeyState, Keypair,
    Prefix,
};
use keri_kernel_store::{KelStore, StoreExt};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::config::KernelConfig;
use crate::controller::{Controller, Inception, Rotation};
use crate::error::{KernelError, Result};
use crate::keychain::{Keychain, SoftwareKeychain};

/// The main Kernel struct.
///
/// Provides:
/// - Inception and rotation of identities, from caller keys or custodied keys
/// - Signing under an identity's current key
/// - Verification and group event formatting
/// - Ingest of externally built events after full chain validation
///
/// Writes are serialized per identifier. Different identifiers never
/// contend.
pub struct Kernel<S: KelStore> {
    /// The storage backend.
    store: Arc<S>,
    /// Key custody for identities created here.
    keychain: Arc<dyn Keychain>,
    /// Configuration.
    config: KernelConfig,
    /// Writer locks of identifiers with a write in flight.
    writers: Writers,
}

impl<S: KelStore> Kernel<S> {
    /// Create a kernel with an in-memory keychain.
    pub fn new(store: S, config: KernelConfig) -> Self {
        Self::with_keychain(store, Arc::new(SoftwareKeychain::new()), config)
    }

    pub fn with_keychain(store: S, keychain: Arc<dyn Keychain>, config: KernelConfig) -> Self {
        Self {
            store: Arc::new(store),
            keychain,
            config,
            writers: Writers::default(),
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// The most recently created identity, if any.
    pub async fn active_identity(&self) -> Result<Option<IdentityState>> {
        Ok(self.store.list_identities().await?.pop())
    }

    /// All identities, oldest first.
    pub async fn identities(&self) -> Result<Vec<IdentityState>> {
        Ok(self.store.list_identities().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ingest
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an externally built event.
    ///
    /// An inception must be self-consistent and new. A rotation must follow
    /// the replayed key state: next sequence number, prior SAID, and
    /// pre-committed keys. Returns the event's sequence number.
    pub async fn ingest(&self, event: &KeyEvent) -> Result<u64> {
        let identifier = event.identifier()?;
        let _writer = self.lock_writer(&identifier).await;

        if event.is_inception() {
            KeyState::incept(event)?;
            self.ensure_new(&identifier).await?;
        } else {
            let state = self.key_state(&identifier).await?;
            state.check(event).map_err(loud)?;
        }

        self.append_event(&identifier, event).await?;
        Ok(event.sn)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Take the writer lock for an identifier.
    ///
    /// The entry is created on demand and removed by the last guard to drop,
    /// so the map only holds identifiers with a write in flight.
    async fn lock_writer(&self, identifier: &Prefix) -> WriterGuard<'_> {
        let lock = {
            let mut writers = lock_writers(&self.writers);
            Arc::clone(writers.entry(identifier.clone()).or_default())
        };
        let guard = Arc::clone(&lock).lock_owned().await;
        WriterGuard {
            writers: &self.writers,
            identifier: identifier.clone(),
            lock,
            guard: Some(guard),
        }
    }

    async fn ensure_new(&self, identifier: &Prefix) -> Result<()> {
        if self.store.has_identity(identifier).await? {
            return Err(KernelError::DuplicateIdentity(identifier.to_string()));
        }
        Ok(())
    }

    async fn key_state(&self, identifier: &Prefix) -> Result<KeyState> {
        self.store
            .load_key_state(identifier)
            .await?
            .ok_or_else(|| KernelError::NoSuchIdentity(identifier.to_string()))
    }

    async fn append_event(&self, identifier: &Prefix, event: &KeyEvent) -> Result<()> {
        let record = EventRecord::from_event(event, now_millis())?;
        self.store.append(identifier, &record).await.map_err(|e| {
            let e = KernelError::from(e);
            if let KernelError::SequenceConflict { expected, got } = &e {
                warn!(identifier = %identifier, expected, got, "sequence conflict on append");
            }
            e
        })
    }

    /// Rotate while holding the identifier's writer lock.
    async fn rotate_locked(
        &self,
        identifier: &Prefix,
        new_signing: &Ed25519PublicKey,
        new_next: &Ed25519PublicKey,
    ) -> Result<KeyEvent> {
        let state = self.key_state(identifier).await?;
        let event = rotate(&state, new_signing, new_next).map_err(loud)?;
        self.append_event(identifier, &event).await?;
        info!(identifier = %identifier, sn = event.sn, said = %event.said, "rotated identity");
        Ok(event)
    }

    async fn current_state(&self, identifier: &Prefix) -> Result<IdentityState> {
        self.store
            .current_state(identifier)
            .await?
            .ok_or_else(|| KernelError::NoSuchIdentity(identifier.to_string()))
    }
}

#[async_trait]
impl<S: KelStore + 'static> Controller for Kernel<S> {
    async fn incept(
        &self,
        signing: &Ed25519PublicKey,
        next: &Ed25519PublicKey,
    ) -> Result<Inception> {
        let event = incept(signing, next)?;
        let identifier = event.identifier()?;

        let _writer = self.lock_writer(&identifier).await;

        self.ensure_new(&identifier).await?;
        self.append_event(&identifier, &event).await?;

        info!(identifier = %identifier, "incepted identity");
        Ok(Inception { identifier, event })
    }

    async fn rotate(
        &self,
        identifier: &Prefix,
        new_signing: &Ed25519PublicKey,
        new_next: &Ed25519PublicKey,
    ) -> Result<Rotation> {
        let _writer = self.lock_writer(identifier).await;

        let event = self.rotate_locked(identifier, new_signing, new_next).await?;
        let sn = event.sn;
        Ok(Rotation { event, sn })
    }

    async fn sign(&self, identifier: &Prefix, payload: &[u8]) -> Result<Ed25519Signature> {
        let state = self.current_state(identifier).await?;
        let keypair = self
            .keychain
            .current(identifier)
            .await?
            .ok_or_else(|| KernelError::KeyUnavailable(identifier.to_string()))?;

        // A held key that no longer matches the log is not usable.
        if keypair.public_key().to_encoded() != state.current_public_key {
            return Err(KernelError::KeyUnavailable(identifier.to_string()));
        }

        Ok(keypair.sign(payload))
    }

    async fn verify(&self, payload: &[u8], signature: &[u8], public_key: &str) -> Result<bool> {
        Ok(verify_encoded(public_key, payload, signature))
    }

    async fn multisig(&self, request: &GroupEventRequest) -> Result<GroupEvent> {
        let event = build_group_event(request)?;
        debug!(
            prefix = %event.prefix(),
            event_type = %event.event_type(),
            members = event.members.len(),
            "formatted group event"
        );
        Ok(event)
    }

    async fn kel(&self, identifier: &Prefix) -> Result<Vec<KeyEvent>> {
        let records = self.store.list_by_identifier(identifier).await?;
        if records.is_empty() {
            return Err(KernelError::NoSuchIdentity(identifier.to_string()));
        }
        records
            .iter()
            .map(|r| r.event().map_err(KernelError::from))
            .collect()
    }

    async fn state(&self, identifier: &Prefix) -> Result<IdentityState> {
        self.current_state(identifier).await
    }

    async fn create_identity(&self) -> Result<IdentityState> {
        let current = Keypair::generate();
        let next = Keypair::generate();

        let Inception { identifier, .. } =
            Controller::incept(self, &current.public_key(), &next.public_key()).await?;
        self.keychain.store(&identifier, current, next).await?;

        self.current_state(&identifier).await
    }

    async fn rotate_identity(&self, identifier: &Prefix) -> Result<IdentityState> {
        let _writer = self.lock_writer(identifier).await;

        let next = self
            .keychain
            .next(identifier)
            .await?
            .ok_or_else(|| KernelError::KeyUnavailable(identifier.to_string()))?;
        let new_next = Keypair::generate();

        self.rotate_locked(identifier, &next.public_key(), &new_next.public_key())
            .await?;
        self.keychain.commit_rotation(identifier, new_next).await?;

        self.current_state(identifier).await
    }
}

type Writers = std::sync::Mutex<HashMap<Prefix, Arc<Mutex<()>>>>;

/// Holds an identifier's writer lock; prunes the map entry on drop.
struct WriterGuard<'a> {
    writers: &'a Writers,
    identifier: Prefix,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for WriterGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut writers = lock_writers(self.writers);
        // One reference in the map, one here: nobody else is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            writers.remove(&self.identifier);
        }
    }
}

/// The map is never held across an await, and a panic while holding it
/// leaves it consistent, so a poisoned lock is still usable.
fn lock_writers(writers: &Writers) -> std::sync::MutexGuard<'_, HashMap<Prefix, Arc<Mutex<()>>>> {
    writers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Convert a core error, logging commitment failures.
fn loud(e: CoreError) -> KernelError {
    if let CoreError::KeyCommitmentMismatch { prefix, sn, key } = &e {
        warn!(identifier = %prefix, sn, key = %key, "rotation key was not pre-committed");
    }
    e.into()
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
