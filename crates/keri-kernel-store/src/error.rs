//! Error types for the store module.

use keri_kernel_core::CoreError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The record does not extend the log by exactly one.
    #[error("sequence conflict for {identifier}: expected sn {expected}, got {got}")]
    SequenceConflict {
        identifier: String,
        expected: u64,
        got: u64,
    },

    /// An inception record for an identifier that already has a log.
    #[error("identity already exists: {0}")]
    AlreadyExists(String),

    #[error("identity not found: {0}")]
    NotFound(String),

    /// Invalid data in storage, or a record that contradicts its identifier.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A stored event failed to decode or replay.
    #[error("stored event rejected: {0}")]
    Core(#[from] CoreError),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Lock poisoned or blocking task failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
