//! # KERI Kernel
//!
//! Self-certifying identities whose control is proven by rotating Ed25519
//! keys recorded in a Key Event Log.
//!
//! ## Overview
//!
//! - **Inception**: an identity is born from a signing key and a commitment
//!   (digest) to the next key. Its identifier is the SAID of that event.
//! - **Rotation**: the committed next key becomes the signing key, and a new
//!   commitment is made. Any other key is refused.
//! - **Signing**: payloads are signed with the identity's current key.
//! - **Group events**: unsigned multi-signature events are formatted for
//!   collection elsewhere.
//!
//! The [`Controller`] trait is implemented in process by [`Kernel`] and over
//! loopback HTTP by [`driver::DriverClient`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use keri_kernel::{Controller, Kernel, KernelConfig};
//! use keri_kernel::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("kel.db").unwrap();
//!     let kernel = Kernel::new(store, KernelConfig::default());
//!
//!     // Keys stay in the kernel's keychain
//!     let identity = kernel.create_identity().await.unwrap();
//!     let _signature = kernel.sign(&identity.identifier, b"hello").await.unwrap();
//!
//!     // Rotate to the pre-committed key
//!     let rotated = kernel.rotate_identity(&identity.identifier).await.unwrap();
//!     assert_eq!(rotated.event_count, 2);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `keri_kernel::core` - Events, SAIDs, keys, key state
//! - `keri_kernel::store` - Storage abstraction and SQLite

pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod kernel;
pub mod keychain;

// Re-export component crates
pub use keri_kernel_core as core;
pub use keri_kernel_store as store;

// Re-export main types for convenience
pub use config::{DriverConfig, KernelConfig};
pub use controller::{Controller, Inception, Rotation};
pub use error::{ErrorCode, KernelError, Result};
pub use kernel::Kernel;
pub use keychain::{Keychain, SoftwareKeychain};

// Re-export commonly used core types
pub use keri_kernel_core::{
    EncodedKey, Ed25519PublicKey, Ed25519Signature, GroupEvent, GroupEventRequest,
    GroupEventType, IdentityState, KeyEvent, Keypair, Prefix,
};
