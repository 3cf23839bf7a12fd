//! # KERI Kernel Store
//!
//! Storage abstraction for the KERI Kernel. Provides a trait-based interface
//! for Key Event Log persistence with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`KelStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`StoreExt`] - Replay helpers built on the trait
//!
//! ## Usage
//!
//! ```rust,no_run
//! use keri_kernel_core::{incept, EventRecord, Keypair};
//! use keri_kernel_store::{KelStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("kel.db").unwrap();
//!
//!     let event = incept(&Keypair::generate().public_key(), &Keypair::generate().public_key())
//!         .unwrap();
//!     let record = EventRecord::from_event(&event, 0).unwrap();
//!     store.append(&record.identifier.clone(), &record).await.unwrap();
//! }
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{KelStore, StoreExt};

/// Current time in Unix milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
