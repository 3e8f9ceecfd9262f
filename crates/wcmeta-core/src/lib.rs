//! # wcmeta core
//!
//! Pure primitives for working-copy metadata: the skel serialization format
//! and the tree-conflict records encoded in it.
//!
//! This crate contains no I/O and no storage. Everything here is computation
//! over byte strings and plain values.
//!
//! ## Key Types
//!
//! - [`Skel`] - A parsed skel: an atom or an ordered list of skels
//! - [`TreeConflictDescription`] - One tree conflict on a directory entry
//! - [`TreeConflictRegistry`] - All conflicts recorded on one directory
//! - [`Checksum`] - Content address of a pristine text
//!
//! ## Encoding
//!
//! [`parse`] and [`unparse`] convert between bytes and [`Skel`]. The
//! [`codec`] and [`registry`] modules map conflict records onto skels.

pub mod codec;
pub mod conflict;
pub mod describe;
pub mod error;
pub mod grammar;
pub mod registry;
pub mod skel;
pub mod types;
pub mod validation;

pub use codec::{
    decode_conflict, decode_single_conflict, decode_version, encode_conflict,
    encode_single_conflict, encode_version,
};
pub use conflict::{
    ConflictAction, ConflictReason, ConflictVersion, NodeKind, Operation,
    TreeConflictDescription,
};
pub use describe::{describe_conflict, describe_version};
pub use error::{CoreError, ErrorKind, FieldCategory, Result};
pub use grammar::{parse, unparse};
pub use registry::{
    decode_registry, encode_registry, registry_from_text, registry_to_text,
    TreeConflictRegistry,
};
pub use skel::Skel;
pub use types::Checksum;
pub use validation::{is_valid_conflict, is_valid_version};
