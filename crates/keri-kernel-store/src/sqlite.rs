//! SQLite implementation of the KelStore trait.
//!
//! This is the primary storage backend for the KERI Kernel. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use keri_kernel_core::{EncodedKey, EventKind, EventRecord, IdentityState, Prefix};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::now_millis;
use crate::traits::{check_append, KelStore};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))
}

const RECORD_COLUMNS: &str =
    "identifier, sn, kind, said, event_json, current_public_key, next_key_digest, timestamp";

const STATE_COLUMNS: &str =
    "identifier, current_public_key, next_key_digest, created_at, event_count";

/// A record row as stored, before the encoded strings are validated.
struct RawRecord {
    identifier: String,
    sn: i64,
    kind: String,
    said: String,
    event_json: String,
    current_public_key: String,
    next_key_digest: Option<String>,
    timestamp: i64,
}

impl RawRecord {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            identifier: row.get("identifier")?,
            sn: row.get("sn")?,
            kind: row.get("kind")?,
            said: row.get("said")?,
            event_json: row.get("event_json")?,
            current_public_key: row.get("current_public_key")?,
            next_key_digest: row.get("next_key_digest")?,
            timestamp: row.get("timestamp")?,
        })
    }

    fn into_record(self) -> Result<EventRecord> {
        let kind = EventKind::parse(&self.kind)
            .ok_or_else(|| StoreError::InvalidData(format!("unknown event kind {}", self.kind)))?;
        Ok(EventRecord {
            identifier: Prefix::parse(&self.identifier)?,
            sn: to_u64(self.sn, "sn")?,
            kind,
            said: self.said,
            event_json: self.event_json,
            current_public_key: EncodedKey::parse(&self.current_public_key)?,
            next_key_digest: self
                .next_key_digest
                .as_deref()
                .map(EncodedKey::parse)
                .transpose()?,
            timestamp: self.timestamp,
        })
    }
}

/// An identity row as stored.
struct RawState {
    identifier: String,
    current_public_key: String,
    next_key_digest: Option<String>,
    created_at: i64,
    event_count: i64,
}

impl RawState {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            identifier: row.get("identifier")?,
            current_public_key: row.get("current_public_key")?,
            next_key_digest: row.get("next_key_digest")?,
            created_at: row.get("created_at")?,
            event_count: row.get("event_count")?,
        })
    }

    fn into_state(self) -> Result<IdentityState> {
        Ok(IdentityState {
            identifier: Prefix::parse(&self.identifier)?,
            current_public_key: EncodedKey::parse(&self.current_public_key)?,
            next_key_digest: self
                .next_key_digest
                .as_deref()
                .map(EncodedKey::parse)
                .transpose()?,
            created_at: self.created_at,
            event_count: to_u64(self.event_count, "event_count")?,
        })
    }
}

fn to_u64(value: i64, column: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("negative {}: {}", column, value)))
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("sequence number {} out of range", value)))
}

#[async_trait]
impl KelStore for SqliteStore {
    async fn append(&self, identifier: &Prefix, record: &EventRecord) -> Result<()> {
        let identifier = identifier.clone();
        let record = record.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            let count: Option<i64> = tx
                .query_row(
                    "SELECT event_count FROM identities WHERE identifier = ?1",
                    params![identifier.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            let count = count.map(|c| to_u64(c, "event_count")).transpose()?;
            check_append(&identifier, &record, count)?;

            let sn = to_i64(record.sn)?;
            let next_digest = record.next_key_digest.as_ref().map(|d| d.as_str());

            tx.execute(
                "INSERT INTO events (
                    identifier, sn, kind, said, event_json,
                    current_public_key, next_key_digest, timestamp
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    identifier.as_str(),
                    sn,
                    record.kind.as_str(),
                    &record.said,
                    &record.event_json,
                    record.current_public_key.as_str(),
                    next_digest,
                    record.timestamp,
                ],
            )?;

            if record.sn == 0 {
                tx.execute(
                    "INSERT INTO identities (
                        identifier, current_public_key, next_key_digest,
                        created_at, event_count, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, 1, ?4)",
                    params![
                        identifier.as_str(),
                        record.current_public_key.as_str(),
                        next_digest,
                        record.timestamp,
                    ],
                )?;
            } else {
                tx.execute(
                    "UPDATE identities SET
                        current_public_key = ?2,
                        next_key_digest = ?3,
                        event_count = event_count + 1,
                        updated_at = ?4
                     WHERE identifier = ?1",
                    params![
                        identifier.as_str(),
                        record.current_public_key.as_str(),
                        next_digest,
                        now_millis(),
                    ],
                )?;
            }

            tx.commit()?;
            debug!(identifier = %identifier, sn = record.sn, "appended event");
            Ok(())
        })
        .await
    }

    async fn list_by_identifier(&self, identifier: &Prefix) -> Result<Vec<EventRecord>> {
        let identifier = identifier.clone();

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM events WHERE identifier = ?1 ORDER BY sn",
                RECORD_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![identifier.as_str()], RawRecord::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(RawRecord::into_record).collect()
        })
        .await
    }

    async fn current_state(&self, identifier: &Prefix) -> Result<Option<IdentityState>> {
        let identifier = identifier.clone();

        self.blocking(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM identities WHERE identifier = ?1",
                    STATE_COLUMNS
                ),
                params![identifier.as_str()],
                RawState::from_row,
            )
            .optional()?
            .map(RawState::into_state)
            .transpose()
        })
        .await
    }

    async fn get_event(&self, identifier: &Prefix, sn: u64) -> Result<Option<EventRecord>> {
        let identifier = identifier.clone();
        let Ok(sn) = i64::try_from(sn) else {
            return Ok(None);
        };

        self.blocking(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM events WHERE identifier = ?1 AND sn = ?2",
                    RECORD_COLUMNS
                ),
                params![identifier.as_str(), sn],
                RawRecord::from_row,
            )
            .optional()?
            .map(RawRecord::into_record)
            .transpose()
        })
        .await
    }

    async fn list_identities(&self) -> Result<Vec<IdentityState>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM identities ORDER BY created_at, rowid",
                STATE_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], RawState::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(RawState::into_state).collect()
        })
        .await
    }

    async fn has_identity(&self, identifier: &Prefix) -> Result<bool> {
        let identifier = identifier.clone();

        self.blocking(move |conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM identities WHERE identifier = ?1",
                    params![identifier.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }
}
