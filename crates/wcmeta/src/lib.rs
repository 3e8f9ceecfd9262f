//! # wcmeta
//!
//! Working-copy metadata: the tree conflicts recorded on each directory,
//! the node rows of the working copy and the reference-counted pristine
//! texts they point at, all kept in one transactional store.
//!
//! ## Overview
//!
//! - **Tree conflicts**: stored per directory as one skel-encoded registry
//! - **Nodes**: one row per path and op_depth, optionally naming a pristine
//! - **Pristines**: content-addressed rows whose reference counts follow
//!   every node insert, update and delete automatically
//! - **Transactions**: nested, with only the outermost level reaching SQLite
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use wcmeta::{WcDb, WcDbConfig, NodeRecord};
//! use wcmeta::core::{ConflictAction, ConflictReason, NodeKind, Operation, TreeConflictDescription};
//!
//! fn example() -> wcmeta::Result<()> {
//!     let mut db = WcDb::create("/work/wc", "/work/wc/.svn/wc.db", WcDbConfig::default())?;
//!
//!     let checksum = db.install_pristine(b"hello\n")?;
//!     db.insert_node(&NodeRecord::file("hello.txt", checksum))?;
//!
//!     db.add_tree_conflict(TreeConflictDescription::new(
//!         "/work/wc",
//!         "hello.txt",
//!         NodeKind::File,
//!         Operation::Update,
//!         ConflictAction::Delete,
//!         ConflictReason::Edited,
//!     ))?;
//!
//!     let conflicts = db.read_tree_conflicts(Path::new("/work/wc"))?;
//!     assert_eq!(conflicts.len(), 1);
//!
//!     db.close()
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `wcmeta::core` - Skel grammar and the tree-conflict codec
//! - `wcmeta::store` - Engines, sessions and statements

pub mod error;
pub mod wcdb;

// Re-export component crates
pub use wcmeta_core as core;
pub use wcmeta_store as store;

// Re-export main types for convenience
pub use error::{Result, WcError};
pub use wcdb::{NodeRecord, PristineInfo, WcDb, WcDbConfig};

// Re-export commonly used core types
pub use wcmeta_core::{
    describe_conflict, Checksum, ConflictAction, ConflictReason, ConflictVersion, ErrorKind,
    NodeKind, Operation, TreeConflictDescription, TreeConflictRegistry,
};
pub use wcmeta_store::{OpenMode, Session, TransactionMode};
