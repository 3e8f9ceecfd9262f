//! Error types for working-copy metadata operations.

use std::path::PathBuf;

use thiserror::Error;
use wcmeta_core::{CoreError, ErrorKind};
use wcmeta_store::StoreError;

/// Errors that can occur during [`WcDb`](crate::WcDb) operations.
#[derive(Debug, Error)]
pub enum WcError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Stored metadata failed to decode.
    #[error("corrupt metadata: {0}")]
    Core(#[from] CoreError),

    /// A path given to the database lies outside its working copy.
    #[error("'{}' is not inside working copy '{}'", path.display(), root.display())]
    OutsideWorkingCopy { path: PathBuf, root: PathBuf },

    /// No node row at the given path and depth.
    #[error("node not found: '{relpath}' at op_depth {op_depth}")]
    NodeNotFound { relpath: String, op_depth: i64 },
}

impl WcError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WcError::Store(err) => err.kind(),
            WcError::Core(err) => err.kind(),
            WcError::OutsideWorkingCopy { .. } => ErrorKind::AssertionFailure,
            WcError::NodeNotFound { .. } => ErrorKind::NotFound,
        }
    }
}

/// Result type for working-copy metadata operations.
pub type Result<T> = std::result::Result<T, WcError>;
