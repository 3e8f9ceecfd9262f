//! Error types for the store module.

use std::path::PathBuf;

use thiserror::Error;
use wcmeta_core::{CoreError, ErrorKind};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file does not exist and the open mode does not create it.
    #[error("file not found '{}'", .0.display())]
    NotFound(PathBuf),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored metadata failed to decode.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The caller broke a session invariant.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// A write would break a cross-table invariant.
    #[error("constraint failed: {0}")]
    Constraint(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rolling back after a failed transaction body failed as well.
    ///
    /// `original` is the error the caller should act on; the rollback
    /// failure is reachable through [`std::error::Error::source`].
    #[error("{original} (rollback also failed)")]
    RollbackFailed {
        original: Box<StoreError>,
        #[source]
        rollback: Box<StoreError>,
    },
}

impl StoreError {
    pub(crate) fn assertion(message: impl Into<String>) -> Self {
        StoreError::Assertion(message.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Database(_)
            | StoreError::Constraint(_)
            | StoreError::Io(_)
            | StoreError::Migration(_) => {
                ErrorKind::Engine
            }
            StoreError::Core(err) => err.kind(),
            StoreError::Assertion(_) => ErrorKind::AssertionFailure,
            StoreError::RollbackFailed { original, .. } => original.kind(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
