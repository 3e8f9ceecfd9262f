//! Short human-readable summaries of tree conflicts.
//!
//! Presentation only; nothing here is part of the stored format.

use crate::conflict::{
    ConflictAction, ConflictReason, ConflictVersion, NodeKind, Operation,
    TreeConflictDescription,
};

/// Summarize a conflict, e.g. `local file edit, incoming file delete or move upon update`.
pub fn describe_conflict(conflict: &TreeConflictDescription) -> String {
    // Edits and deletes act on what was there before; adds and replaces
    // bring in the right-hand side.
    let incoming = match conflict.action {
        ConflictAction::Edit | ConflictAction::Delete => conflict.source_left.as_ref(),
        ConflictAction::Add | ConflictAction::Replace => conflict.source_right.as_ref(),
    };
    let incoming_kind = incoming.map_or(NodeKind::Unknown, |version| version.kind);

    let mut local_kind = kind_label(conflict.node_kind).to_string();
    if !local_kind.is_empty() {
        local_kind.push(' ');
    }

    format!(
        "local {}{}, incoming {} upon {}",
        local_kind,
        reason_label(conflict.reason, conflict.operation),
        action_label(conflict.action, incoming_kind),
        conflict.operation,
    )
}

/// Summarize one side of a conflict, e.g. `(file) http://host/repo/trunk/a.c@12`.
pub fn describe_version(version: Option<&ConflictVersion>) -> String {
    let Some(version) = version else {
        return "(none)".to_string();
    };

    let location = match (&version.repository_root, &version.path) {
        (Some(root), Some(path)) => format!("{root}/{path}"),
        (Some(root), None) => format!("{root}/..."),
        (None, Some(path)) => path.clone(),
        (None, None) => "...".to_string(),
    };
    let revision = version.peg_revision.map_or(-1, |rev| rev as i128);

    format!("({}) {}@{}", kind_label(version.kind), location, revision)
}

fn kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Unknown => "",
        other => other.as_str(),
    }
}

fn reason_label(reason: ConflictReason, operation: Operation) -> &'static str {
    match reason {
        ConflictReason::Edited => "edit",
        ConflictReason::Obstructed => "obstruction",
        ConflictReason::Deleted => "delete",
        ConflictReason::Missing if operation == Operation::Merge => {
            "missing or deleted or moved away"
        }
        ConflictReason::Missing => "missing",
        ConflictReason::Unversioned => "unversioned",
        ConflictReason::Added => "add",
        ConflictReason::Replaced => "replace",
        ConflictReason::MovedAway => "moved away",
        ConflictReason::MovedHere => "moved here",
    }
}

fn action_label(action: ConflictAction, incoming_kind: NodeKind) -> &'static str {
    match (incoming_kind, action) {
        (NodeKind::File, ConflictAction::Add) => "file add",
        (NodeKind::File, ConflictAction::Edit) => "file edit",
        (NodeKind::File, ConflictAction::Delete) => "file delete or move",
        (NodeKind::File, ConflictAction::Replace) => "replace with file",
        (NodeKind::Dir, ConflictAction::Add) => "dir add",
        (NodeKind::Dir, ConflictAction::Edit) => "dir edit",
        (NodeKind::Dir, ConflictAction::Delete) => "dir delete or move",
        (NodeKind::Dir, ConflictAction::Replace) => "replace with dir",
        (_, ConflictAction::Add) => "add",
        (_, ConflictAction::Edit) => "edit",
        (_, ConflictAction::Delete) => "delete or move",
        (_, ConflictAction::Replace) => "replace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(action: ConflictAction, reason: ConflictReason) -> TreeConflictDescription {
        TreeConflictDescription::new("wc", "a.c", NodeKind::File, Operation::Update, action, reason)
    }

    #[test]
    fn test_edit_uses_left_kind() {
        let conflict = base(ConflictAction::Delete, ConflictReason::Edited)
            .with_source_left(ConflictVersion::new("http://h/r", "a.c", 1, NodeKind::File))
            .with_source_right(ConflictVersion::new("http://h/r", "a.c", 2, NodeKind::Dir));
        assert_eq!(
            describe_conflict(&conflict),
            "local file edit, incoming file delete or move upon update"
        );
    }

    #[test]
    fn test_add_uses_right_kind() {
        let conflict = base(ConflictAction::Add, ConflictReason::Obstructed)
            .with_source_right(ConflictVersion::new("http://h/r", "a.c", 2, NodeKind::Dir));
        assert_eq!(
            describe_conflict(&conflict),
            "local file obstruction, incoming dir add upon update"
        );
    }

    #[test]
    fn test_missing_versions_fall_back_to_plain_action() {
        let mut conflict = base(ConflictAction::Replace, ConflictReason::Missing);
        conflict.operation = Operation::Merge;
        assert_eq!(
            describe_conflict(&conflict),
            "local file missing or deleted or moved away, incoming replace upon merge"
        );
    }

    #[test]
    fn test_describe_version() {
        assert_eq!(describe_version(None), "(none)");

        let version = ConflictVersion::new("http://h/r", "trunk/a.c", 12, NodeKind::File);
        assert_eq!(describe_version(Some(&version)), "(file) http://h/r/trunk/a.c@12");

        let partial = ConflictVersion {
            repository_root: Some("http://h/r".into()),
            path: None,
            peg_revision: None,
            kind: NodeKind::Unknown,
        };
        assert_eq!(describe_version(Some(&partial)), "() http://h/r/...@-1");
    }
}
