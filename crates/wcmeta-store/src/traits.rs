//! Engine trait: the seam between a session and the embedded database.
//!
//! A [`Session`](crate::Session) drives any engine through this trait. The
//! primary implementation is [`SqliteEngine`](crate::SqliteEngine);
//! [`RecordingEngine`](crate::RecordingEngine) stands in for it in tests that
//! care about which engine calls were made rather than their data.

use crate::config::StoreConfig;
use crate::error::Result;

pub use rusqlite::types::Value;

/// One result row, columns in select order.
pub type Row = Vec<Value>;

/// How a store file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// The file must exist; no writes.
    ReadOnly,
    /// The file must exist.
    ReadWrite,
    /// Create the file if it is missing.
    RWCreate,
}

/// Lock strength requested for an engine transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionMode {
    ReadOnly,
    Write,
    Exclusive,
}

impl TransactionMode {
    /// True for modes that need the write lock.
    pub fn is_write(&self) -> bool {
        !matches!(self, TransactionMode::ReadOnly)
    }
}

/// The embedded database behind a session.
///
/// Transaction methods act on the engine directly; nesting is counted by the
/// session, never by the engine.
pub trait Engine {
    // ─────────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a transaction, or promote a read-only one to `mode`.
    fn begin(&mut self, mode: TransactionMode) -> Result<()>;

    /// Commit the current transaction.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the current transaction.
    fn rollback(&mut self) -> Result<()>;

    /// Mode of the transaction in progress, `None` outside a transaction.
    fn transaction_mode(&self) -> Option<TransactionMode>;

    fn is_in_transaction(&self) -> bool {
        self.transaction_mode().is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one data-modifying statement, returning the number of changed rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize>;

    /// Run a batch of statements without parameters.
    fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Run one query and collect every row.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Schema & lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Names of all tables in the schema.
    fn table_names(&self) -> Result<Vec<String>>;

    /// Open a non-durable scratch engine of the same type.
    fn open_temporary(&self, config: &StoreConfig) -> Result<Self>
    where
        Self: Sized;

    /// Release the engine.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_modes() {
        assert!(!TransactionMode::ReadOnly.is_write());
        assert!(TransactionMode::Write.is_write());
        assert!(TransactionMode::Exclusive.is_write());
    }
}
