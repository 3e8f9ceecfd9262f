//! # wcmeta testkit
//!
//! Testing utilities for wcmeta.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Conflict records and registries with their exact skel bytes
//! - **Generators**: Proptest strategies for skels, versions and tree conflicts
//! - **Fixtures**: Temporary working copies with an on-disk store
//!
//! ## Golden Vectors
//!
//! ```rust
//! use wcmeta_testkit::vectors::verify_all_vectors;
//!
//! verify_all_vectors().unwrap();
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use wcmeta_testkit::generators::{conflict_from_params, ConflictParams};
//!
//! proptest! {
//!     #[test]
//!     fn encoding_is_deterministic(params: ConflictParams) {
//!         let conflict = conflict_from_params(&params, "/wc".as_ref());
//!         let a = wcmeta_core::encode_single_conflict(&conflict).unwrap();
//!         let b = wcmeta_core::encode_single_conflict(&conflict).unwrap();
//!         prop_assert_eq!(a, b);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use wcmeta_testkit::fixtures::TestFixture;
//! use wcmeta::{ConflictAction, ConflictReason};
//!
//! let mut fixture = TestFixture::new().unwrap();
//! let conflict = fixture.conflict("", "a.c", ConflictAction::Edit, ConflictReason::Deleted);
//! fixture.db.add_tree_conflict(conflict).unwrap();
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{recording_session, TestFixture};
pub use generators::{conflict_from_params, ConflictParams};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector, Subject};
