//! Store trait: the abstract interface for Key Event Log persistence.
//!
//! This trait allows the kernel to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use keri_kernel_core::{EventRecord, IdentityState, KeyEvent, KeyState, Prefix};

use crate::error::{Result, StoreError};

/// The KEL store: an append-only, per-identifier, sequence-ordered log.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Contiguity**: `append` accepts a record only at exactly the next
///   sequence number, so state is always reconstructible by replay.
/// - **Atomicity**: the record and the updated [`IdentityState`] are written
///   together or not at all.
/// - **No validation of signatures or SAIDs**: callers validate events
///   before appending. The store only enforces ordering.
#[async_trait]
pub trait KelStore: Send + Sync {
    /// Append a record to an identifier's log.
    ///
    /// # Errors
    /// - `AlreadyExists` for an inception record on an existing identifier.
    /// - `SequenceConflict` if `record.sn` is not the current max + 1.
    /// - `InvalidData` if `record.identifier` differs from `identifier`.
    async fn append(&self, identifier: &Prefix, record: &EventRecord) -> Result<()>;

    /// The full log for an identifier, ordered by sequence number.
    async fn list_by_identifier(&self, identifier: &Prefix) -> Result<Vec<EventRecord>>;

    /// The materialized state for an identifier.
    async fn current_state(&self, identifier: &Prefix) -> Result<Option<IdentityState>>;

    /// A single record by position.
    async fn get_event(&self, identifier: &Prefix, sn: u64) -> Result<Option<EventRecord>>;

    /// All identities, oldest first.
    async fn list_identities(&self) -> Result<Vec<IdentityState>>;

    async fn has_identity(&self, identifier: &Prefix) -> Result<bool>;
}

/// Check the shared preconditions of `append` against the current event count.
pub(crate) fn check_append(
    identifier: &Prefix,
    record: &EventRecord,
    event_count: Option<u64>,
) -> Result<()> {
    if &record.identifier != identifier {
        return Err(StoreError::InvalidData(format!(
            "record for {} appended under {}",
            record.identifier, identifier
        )));
    }

    if record.sn == 0 && event_count.is_some() {
        return Err(StoreError::AlreadyExists(identifier.to_string()));
    }

    let expected = event_count.unwrap_or(0);
    if record.sn != expected {
        return Err(StoreError::SequenceConflict {
            identifier: identifier.to_string(),
            expected,
            got: record.sn,
        });
    }

    Ok(())
}

/// Extension trait for common store patterns.
pub trait StoreExt: KelStore {
    /// Recompute the identity view by replaying the log from sequence 0.
    fn replay_state(
        &self,
        identifier: &Prefix,
    ) -> impl std::future::Future<Output = Result<Option<IdentityState>>> + Send;

    /// Replay and validate the full key state.
    fn load_key_state(
        &self,
        identifier: &Prefix,
    ) -> impl std::future::Future<Output = Result<Option<KeyState>>> + Send;
}

impl<S: KelStore + ?Sized> StoreExt for S {
    async fn replay_state(&self, identifier: &Prefix) -> Result<Option<IdentityState>> {
        let records = self.list_by_identifier(identifier).await?;
        let Some(first) = records.first() else {
            return Ok(None);
        };

        let mut state = IdentityState::from_inception(&first.event()?, first.timestamp)?;
        for record in &records[1..] {
            state.advance(&record.event()?)?;
        }
        Ok(Some(state))
    }

    async fn load_key_state(&self, identifier: &Prefix) -> Result<Option<KeyState>> {
        let records = self.list_by_identifier(identifier).await?;
        if records.is_empty() {
            return Ok(None);
        }

        let events = records
            .iter()
            .map(EventRecord::event)
            .collect::<std::result::Result<Vec<KeyEvent>, _>>()?;
        Ok(Some(KeyState::replay(&events)?))
    }
}
