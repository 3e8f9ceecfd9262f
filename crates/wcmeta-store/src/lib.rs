//! # wcmeta store
//!
//! Store sessions for working-copy metadata. A [`Session`] owns one engine
//! handle, caches one statement per [`StatementKind`], keeps pristine
//! reference counts in step with the `nodes` table and counts nested
//! transactions so only the outermost level reaches the engine.
//!
//! ## Key Types
//!
//! - [`Engine`] - The seam between a session and the database
//! - [`SqliteEngine`] - SQLite-based engine (rusqlite, bundled)
//! - [`RecordingEngine`] - Engine double that records calls, for tests
//! - [`Session`] - Statement cache plus transaction bookkeeping
//! - [`StatementKind`] - Closed set of statements with table metadata
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wcmeta_store::{OpenMode, Session, StatementKind, Value};
//!
//! fn example() -> wcmeta_store::Result<()> {
//!     let mut session = Session::open("wc.db", OpenMode::RWCreate)?;
//!     session.install_schema()?;
//!
//!     session.run_in_transaction(|s| {
//!         s.exec(
//!             StatementKind::InsertPristine,
//!             &[Value::Text("0123abcd".into()), Value::Integer(12)],
//!         )?;
//!         Ok(())
//!     })?;
//!
//!     session.close()
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Nesting**: `begin` increments a depth counter; the engine only begins
//!   outside a transaction or to promote a read-only one
//! - **Triggers**: statements whose kind mutates `nodes` get the pristine
//!   reference-count trigger when first instantiated
//! - **Failure path**: `run_in_transaction` rolls back on error and still
//!   runs the matching commit so the depth stays balanced

pub mod config;
pub mod error;
pub mod migration;
pub mod recording;
pub mod session;
pub mod sqlite;
pub mod statement;
pub mod traits;

pub use config::{JournalMode, StoreConfig, SynchronousLevel};
pub use error::{Result, StoreError};
pub use recording::{EngineEvent, EngineLog, RecordingEngine};
pub use session::Session;
pub use sqlite::SqliteEngine;
pub use statement::{
    PristineRefcountTrigger, Registration, RowChange, RowTrigger, Statement, StatementKind,
    StatementOp, StatementRegistry, Table,
};
pub use traits::{Engine, OpenMode, Row, TransactionMode, Value};
