//! Error types for wcmeta core.

use std::fmt;

use thiserror::Error;

/// Coarse classification shared by every wcmeta error type.
///
/// Callers match on the kind rather than on individual variants when they
/// only need to decide between "report and continue" and "this is a bug".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The store file is missing and the open mode requires it to exist.
    NotFound,
    /// The embedded SQL engine reported a failure.
    Engine,
    /// Stored metadata violates the skel grammar or the conflict schema.
    Corruption,
    /// An internal invariant was broken by the caller of this library.
    AssertionFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::Engine => "engine error",
            ErrorKind::Corruption => "corruption",
            ErrorKind::AssertionFailure => "assertion failure",
        };
        f.write_str(name)
    }
}

/// Which enumerated field of a tree conflict failed to map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    NodeKind,
    Operation,
    ConflictAction,
    ConflictReason,
}

impl fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldCategory::NodeKind => "node kind",
            FieldCategory::Operation => "operation",
            FieldCategory::ConflictAction => "conflict action",
            FieldCategory::ConflictReason => "conflict reason",
        };
        f.write_str(name)
    }
}

/// Errors produced by the skel grammar and the tree-conflict codec.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed skel at byte {offset}: {reason}")]
    MalformedSkel { offset: usize, reason: &'static str },

    #[error("error parsing tree conflict skel")]
    RegistryNotList,

    #[error("invalid conflict info in tree conflict description")]
    InvalidConflictShape,

    #[error("invalid version info in tree conflict description")]
    InvalidVersionShape,

    #[error("empty 'victim' field in tree conflict description")]
    EmptyVictim,

    #[error("invalid 'node_kind' field in tree conflict description")]
    InvalidNodeKind,

    #[error("unknown {0} value in tree conflict description")]
    UnknownValue(FieldCategory),

    #[error("invalid peg revision '{0}' in tree conflict description")]
    InvalidRevision(String),

    #[error("invalid repository root '{0}' in tree conflict description")]
    InvalidRepositoryRoot(String),

    /// The codec produced a skel it would itself reject.
    #[error("failed to create valid {what} skel: '{skel}'")]
    InvalidEncoding { what: &'static str, skel: String },
}

impl CoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidEncoding { .. } => ErrorKind::AssertionFailure,
            _ => ErrorKind::Corruption,
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_value_names_field() {
        let err = CoreError::UnknownValue(FieldCategory::ConflictAction);
        assert_eq!(
            err.to_string(),
            "unknown conflict action value in tree conflict description"
        );
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn test_invalid_encoding_is_assertion() {
        let err = CoreError::InvalidEncoding {
            what: "conflict description",
            skel: "()".into(),
        };
        assert_eq!(err.kind(), ErrorKind::AssertionFailure);
    }
}
