//! In-memory implementation of the KelStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use keri_kernel_core::{EventRecord, IdentityState, Prefix};

use crate::error::{Result, StoreError};
use crate::traits::{check_append, KelStore};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Logs indexed by identifier, each ordered by sn.
    logs: HashMap<Prefix, Vec<EventRecord>>,

    /// Materialized identity states.
    states: HashMap<Prefix, IdentityState>,

    /// Identifiers in inception order.
    order: Vec<Prefix>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KelStore for MemoryStore {
    async fn append(&self, identifier: &Prefix, record: &EventRecord) -> Result<()> {
        let mut inner = self.write()?;

        let count = inner.states.get(identifier).map(|s| s.event_count);
        check_append(identifier, record, count)?;

        if record.sn == 0 {
            inner.states.insert(
                identifier.clone(),
                IdentityState {
                    identifier: identifier.clone(),
                    current_public_key: record.current_public_key.clone(),
                    next_key_digest: record.next_key_digest.clone(),
                    created_at: record.timestamp,
                    event_count: 1,
                },
            );
            inner.order.push(identifier.clone());
        } else if let Some(state) = inner.states.get_mut(identifier) {
            state.current_public_key = record.current_public_key.clone();
            state.next_key_digest = record.next_key_digest.clone();
            state.event_count += 1;
        }

        inner
            .logs
            .entry(identifier.clone())
            .or_default()
            .push(record.clone());

        debug!(identifier = %identifier, sn = record.sn, "appended event");
        Ok(())
    }

    async fn list_by_identifier(&self, identifier: &Prefix) -> Result<Vec<EventRecord>> {
        let inner = self.read()?;
        Ok(inner.logs.get(identifier).cloned().unwrap_or_default())
    }

    async fn current_state(&self, identifier: &Prefix) -> Result<Option<IdentityState>> {
        let inner = self.read()?;
        Ok(inner.states.get(identifier).cloned())
    }

    async fn get_event(&self, identifier: &Prefix, sn: u64) -> Result<Option<EventRecord>> {
        let inner = self.read()?;
        Ok(inner
            .logs
            .get(identifier)
            .and_then(|log| usize::try_from(sn).ok().and_then(|i| log.get(i)))
            .cloned())
    }

    async fn list_identities(&self) -> Result<Vec<IdentityState>> {
        let inner = self.read()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.states.get(id).cloned())
            .collect())
    }

    async fn has_identity(&self, identifier: &Prefix) -> Result<bool> {
        let inner = self.read()?;
        Ok(inner.states.contains_key(identifier))
    }
}
