//! # KERI Kernel Testkit
//!
//! Testing utilities for the KERI Kernel.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Seeded keys with the SAIDs their events must have
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Deterministic identities with full key histories
//!
//! ## Golden Vectors
//!
//! ```rust
//! use keri_kernel_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, said) in verify_all_vectors() {
//!     assert!(matches, "{}: {}", name, said);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use keri_kernel_testkit::generators::{inception_from_params, InceptionParams};
//!
//! proptest! {
//!     #[test]
//!     fn said_is_deterministic(params: InceptionParams) {
//!         let e1 = inception_from_params(&params);
//!         let e2 = inception_from_params(&params);
//!         prop_assert_eq!(e1.said, e2.said);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use keri_kernel_testkit::fixtures::TestIdentity;
//!
//! let mut alice = TestIdentity::new("alice");
//! let rotation = alice.rotate();
//! assert_eq!(rotation.sn, 1);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{group_request, key, multi_party_fixtures, TestIdentity};
pub use generators::{inception_from_params, rotation_from_params, InceptionParams};
pub use vectors::{all_vectors, generate_inception_from_vector, verify_all_vectors, GoldenVector};
