//! The tree-conflict domain model.
//!
//! A tree conflict records a disagreement between the local working copy
//! and an incoming change at the level of a whole file or directory node.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Kind of a versioned node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Dir,
    None,
    Unknown,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Dir => "dir",
            NodeKind::None => "none",
            NodeKind::Unknown => "unknown",
        }
    }

    /// Parse a stored kind name. Only concrete kinds have a stored name;
    /// "unknown" is represented by absence and is not accepted here.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "file" => Some(NodeKind::File),
            "dir" => Some(NodeKind::Dir),
            "none" => Some(NodeKind::None),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The working-copy operation that raised the conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Update,
    Switch,
    Merge,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Update => "update",
            Operation::Switch => "switch",
            Operation::Merge => "merge",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "update" => Some(Operation::Update),
            "switch" => Some(Operation::Switch),
            "merge" => Some(Operation::Merge),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the incoming change tried to do to the victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictAction {
    Edit,
    Add,
    Delete,
    Replace,
}

impl ConflictAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictAction::Edit => "edit",
            ConflictAction::Add => "add",
            ConflictAction::Delete => "delete",
            ConflictAction::Replace => "replace",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "edit" => Some(ConflictAction::Edit),
            "add" => Some(ConflictAction::Add),
            "delete" => Some(ConflictAction::Delete),
            "replace" => Some(ConflictAction::Replace),
            _ => None,
        }
    }
}

impl fmt::Display for ConflictAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The local state that made the incoming action conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictReason {
    Edited,
    Obstructed,
    Deleted,
    Missing,
    Unversioned,
    Added,
    Replaced,
    MovedAway,
    MovedHere,
}

impl ConflictReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictReason::Edited => "edited",
            ConflictReason::Obstructed => "obstructed",
            ConflictReason::Deleted => "deleted",
            ConflictReason::Missing => "missing",
            ConflictReason::Unversioned => "unversioned",
            ConflictReason::Added => "added",
            ConflictReason::Replaced => "replaced",
            ConflictReason::MovedAway => "moved-away",
            ConflictReason::MovedHere => "moved-here",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "edited" => Some(ConflictReason::Edited),
            "obstructed" => Some(ConflictReason::Obstructed),
            "deleted" => Some(ConflictReason::Deleted),
            "missing" => Some(ConflictReason::Missing),
            "unversioned" => Some(ConflictReason::Unversioned),
            "added" => Some(ConflictReason::Added),
            "replaced" => Some(ConflictReason::Replaced),
            "moved-away" => Some(ConflictReason::MovedAway),
            "moved-here" => Some(ConflictReason::MovedHere),
            _ => None,
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of a conflicting change: where the node lived in the repository.
///
/// A version without a repository root cannot be told apart from "no version
/// at all" once encoded, so concrete versions always carry a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictVersion {
    /// Repository root URL.
    pub repository_root: Option<String>,
    /// Path of the node relative to the repository root.
    ///
    /// An empty path is stored like a missing one, so use `None` rather than
    /// `Some("")`.
    pub path: Option<String>,
    /// Peg revision; `None` is the invalid-revision sentinel.
    pub peg_revision: Option<u64>,
    pub kind: NodeKind,
}

impl ConflictVersion {
    /// Create a concrete version. An empty `path` becomes `None`.
    pub fn new(
        repository_root: impl Into<String>,
        path: impl Into<String>,
        peg_revision: u64,
        kind: NodeKind,
    ) -> Self {
        let path: String = path.into();
        Self {
            repository_root: Some(repository_root.into()),
            path: (!path.is_empty()).then_some(path),
            peg_revision: Some(peg_revision),
            kind,
        }
    }

    /// The sentinel written in place of a missing version.
    pub const fn null() -> Self {
        Self {
            repository_root: None,
            path: None,
            peg_revision: None,
            kind: NodeKind::Unknown,
        }
    }
}

/// A recorded tree conflict on one victim node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConflictDescription {
    /// Directory that owns the victim and stores the conflict.
    pub directory: PathBuf,
    /// Basename of the victim within `directory`.
    pub victim: String,
    /// Kind of the victim; only `File` and `Dir` are valid.
    pub node_kind: NodeKind,
    pub operation: Operation,
    pub action: ConflictAction,
    pub reason: ConflictReason,
    /// The incoming change's "before" side.
    pub source_left: Option<ConflictVersion>,
    /// The incoming change's "after" side.
    pub source_right: Option<ConflictVersion>,
}

impl TreeConflictDescription {
    /// Create a description with no version information.
    pub fn new(
        directory: impl Into<PathBuf>,
        victim: impl Into<String>,
        node_kind: NodeKind,
        operation: Operation,
        action: ConflictAction,
        reason: ConflictReason,
    ) -> Self {
        Self {
            directory: directory.into(),
            victim: victim.into(),
            node_kind,
            operation,
            action,
            reason,
            source_left: None,
            source_right: None,
        }
    }

    /// Set the source-left version.
    pub fn with_source_left(mut self, version: ConflictVersion) -> Self {
        self.source_left = Some(version);
        self
    }

    /// Set the source-right version.
    pub fn with_source_right(mut self, version: ConflictVersion) -> Self {
        self.source_right = Some(version);
        self
    }

    /// Full path of the victim.
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.victim)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}
