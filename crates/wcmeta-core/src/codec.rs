//! Mapping between tree-conflict descriptions and skels.
//!
//! ```text
//! conflict := ("conflict" victim node-kind operation action reason left right)
//! version  := ("version" repo-root peg-revision path node-kind)
//! ```
//!
//! Missing versions are written as the null version so both shapes keep a
//! fixed arity. Every field that maps to an enumeration must match one of
//! its stored names exactly; anything else is corruption.

use std::path::Path;

use url::Url;

use crate::conflict::{
    ConflictAction, ConflictReason, ConflictVersion, NodeKind, Operation,
    TreeConflictDescription,
};
use crate::error::{CoreError, FieldCategory, Result};
use crate::grammar::{parse, unparse};
use crate::skel::Skel;
use crate::validation::{is_valid_conflict, is_valid_version, CONFLICT_TAG, VERSION_TAG};

/// Stored form of an invalid peg revision.
const INVALID_REVISION: &str = "-1";

/// Encode one version, substituting the null version for `None`.
pub fn encode_version(version: Option<&ConflictVersion>) -> Result<Skel> {
    let null = ConflictVersion::null();
    let version = version.unwrap_or(&null);
    if let Some(root) = &version.repository_root {
        check_repository_root(root)?;
    }

    let revision = match version.peg_revision {
        Some(rev) => rev.to_string(),
        None => INVALID_REVISION.to_string(),
    };

    let mut skel = Skel::empty_list();
    skel.prepend(Skel::str_atom(node_kind_name(version.kind)))?;
    skel.prepend(Skel::str_atom(version.path.as_deref().unwrap_or("")))?;
    skel.prepend(Skel::atom(revision))?;
    skel.prepend(Skel::str_atom(version.repository_root.as_deref().unwrap_or("")))?;
    skel.prepend(Skel::atom(VERSION_TAG))?;

    if !is_valid_version(&skel) {
        return Err(CoreError::InvalidEncoding {
            what: "conflict version",
            skel: skel.to_string(),
        });
    }
    Ok(skel)
}

/// Decode one version skel.
///
/// An empty repository root means "no version": the remaining fields are
/// not looked at and `None` is returned.
pub fn decode_version(skel: &Skel) -> Result<Option<ConflictVersion>> {
    if !is_valid_version(skel) {
        return Err(CoreError::InvalidVersionShape);
    }

    let root = atom_text(skel, 1);
    if root.is_empty() {
        return Ok(None);
    }
    check_repository_root(&root)?;

    let revision_text = atom_text(skel, 2);
    let peg_revision = if revision_text == INVALID_REVISION {
        None
    } else {
        Some(parse_revision(&revision_text)?)
    };

    let path = atom_text(skel, 3);
    let kind = parse_node_kind(&atom_text(skel, 4))?;

    Ok(Some(ConflictVersion {
        repository_root: Some(root),
        path: if path.is_empty() { None } else { Some(path) },
        peg_revision,
        kind,
    }))
}

/// Encode one tree conflict.
pub fn encode_conflict(conflict: &TreeConflictDescription) -> Result<Skel> {
    let mut skel = Skel::empty_list();

    skel.prepend(encode_version(conflict.source_right.as_ref())?)?;
    skel.prepend(encode_version(conflict.source_left.as_ref())?)?;
    skel.prepend(Skel::str_atom(conflict.reason.as_str()))?;
    skel.prepend(Skel::str_atom(conflict.action.as_str()))?;
    skel.prepend(Skel::str_atom(conflict.operation.as_str()))?;

    if !matches!(conflict.node_kind, NodeKind::File | NodeKind::Dir) {
        return Err(CoreError::InvalidNodeKind);
    }
    skel.prepend(Skel::str_atom(conflict.node_kind.as_str()))?;

    if conflict.victim.is_empty() {
        return Err(CoreError::EmptyVictim);
    }
    skel.prepend(Skel::str_atom(&conflict.victim))?;
    skel.prepend(Skel::atom(CONFLICT_TAG))?;

    if !is_valid_conflict(&skel) {
        return Err(CoreError::InvalidEncoding {
            what: "conflict description",
            skel: skel.to_string(),
        });
    }
    Ok(skel)
}

/// Decode one tree conflict owned by `directory`.
pub fn decode_conflict(skel: &Skel, directory: &Path) -> Result<TreeConflictDescription> {
    if !is_valid_conflict(skel) {
        return Err(CoreError::InvalidConflictShape);
    }

    let victim = atom_text(skel, 1);
    if victim.is_empty() {
        return Err(CoreError::EmptyVictim);
    }

    let node_kind = parse_node_kind(&atom_text(skel, 2))?;
    if !matches!(node_kind, NodeKind::File | NodeKind::Dir) {
        return Err(CoreError::InvalidNodeKind);
    }

    let operation = Operation::parse(&atom_text(skel, 3))
        .ok_or(CoreError::UnknownValue(FieldCategory::Operation))?;
    let action = ConflictAction::parse(&atom_text(skel, 4))
        .ok_or(CoreError::UnknownValue(FieldCategory::ConflictAction))?;
    let reason = ConflictReason::parse(&atom_text(skel, 5))
        .ok_or(CoreError::UnknownValue(FieldCategory::ConflictReason))?;

    let left = skel.child(6).ok_or(CoreError::InvalidConflictShape)?;
    let right = skel.child(7).ok_or(CoreError::InvalidConflictShape)?;
    let source_left = decode_version(left)?;
    let source_right = decode_version(right)?;

    Ok(TreeConflictDescription {
        directory: directory.to_path_buf(),
        victim,
        node_kind,
        operation,
        action,
        reason,
        source_left,
        source_right,
    })
}

/// Encode a single conflict to bytes.
pub fn encode_single_conflict(conflict: &TreeConflictDescription) -> Result<Vec<u8>> {
    Ok(unparse(&encode_conflict(conflict)?))
}

/// Decode a single conflict from bytes.
pub fn decode_single_conflict(data: &[u8], directory: &Path) -> Result<TreeConflictDescription> {
    decode_conflict(&parse(data)?, directory)
}

/// Stored name of a kind; unknown is written as the empty atom.
fn node_kind_name(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Unknown => "",
        other => other.as_str(),
    }
}

fn parse_node_kind(name: &str) -> Result<NodeKind> {
    if name.is_empty() {
        return Ok(NodeKind::Unknown);
    }
    NodeKind::parse(name).ok_or(CoreError::UnknownValue(FieldCategory::NodeKind))
}

/// A stored root must be a non-empty URL; an empty one reads back as "no version".
fn check_repository_root(root: &str) -> Result<()> {
    if root.is_empty() || Url::parse(root).is_err() {
        return Err(CoreError::InvalidRepositoryRoot(root.to_string()));
    }
    Ok(())
}

/// Plain decimal digits only, the form [`encode_version`] writes.
fn parse_revision(text: &str) -> Result<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::InvalidRevision(text.to_string()));
    }
    text.parse::<u64>()
        .map_err(|_| CoreError::InvalidRevision(text.to_string()))
}

/// Text of an atom child. Callers validate shape first.
fn atom_text(skel: &Skel, index: usize) -> String {
    let data = skel.child(index).and_then(Skel::as_atom).unwrap_or_default();
    String::from_utf8_lossy(data).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_conflict() -> TreeConflictDescription {
        TreeConflictDescription::new(
            "wc/trunk",
            "foo.c",
            NodeKind::File,
            Operation::Merge,
            ConflictAction::Edit,
            ConflictReason::Deleted,
        )
        .with_source_left(ConflictVersion::new(
            "http://svn.example.com/repos",
            "trunk/foo.c",
            12,
            NodeKind::File,
        ))
        .with_source_right(ConflictVersion::new(
            "http://svn.example.com/repos",
            "branches/b1/foo.c",
            40,
            NodeKind::File,
        ))
    }

    fn conflict_with(field: usize, value: &str) -> Skel {
        let skel = encode_conflict(&sample_conflict()).unwrap();
        let mut children = skel.as_list().unwrap().clone();
        children[field] = Skel::str_atom(value);
        Skel::List(children)
    }

    #[test]
    fn test_encode_null_version() {
        let skel = encode_version(None).unwrap();
        assert_eq!(unparse(&skel), b"(version 0  2 -1 0  0 )");
    }

    #[test]
    fn test_encode_conflict_layout() {
        let conflict = TreeConflictDescription::new(
            "wc",
            "foo",
            NodeKind::Dir,
            Operation::Update,
            ConflictAction::Delete,
            ConflictReason::Edited,
        );
        let bytes = encode_single_conflict(&conflict).unwrap();
        assert_eq!(
            bytes,
            b"(conflict foo dir update delete edited (version 0  2 -1 0  0 ) (version 0  2 -1 0  0 ))"
                .to_vec()
        );
    }

    #[test]
    fn test_conflict_roundtrip() {
        let conflict = sample_conflict();
        let skel = encode_conflict(&conflict).unwrap();
        let decoded = decode_conflict(&skel, Path::new("wc/trunk")).unwrap();
        assert_eq!(decoded, conflict);
    }

    #[test]
    fn test_conflict_roundtrip_through_bytes() {
        let conflict = sample_conflict().with_source_left(ConflictVersion {
            repository_root: Some("svn://host/r".into()),
            path: None,
            peg_revision: None,
            kind: NodeKind::Unknown,
        });
        let bytes = encode_single_conflict(&conflict).unwrap();
        let decoded = decode_single_conflict(&bytes, Path::new("wc/trunk")).unwrap();
        assert_eq!(decoded, conflict);
    }

    #[test]
    fn test_empty_root_means_no_version() {
        // Everything after the empty root is ignored, even garbage.
        let skel = parse(b"(version 0  1 7 some/path 5 bogus)").unwrap();
        assert_eq!(decode_version(&skel).unwrap(), None);
    }

    #[test]
    fn test_version_fields() {
        let skel = parse(b"(version file:///repo 1 7 trunk dir)").unwrap();
        let version = decode_version(&skel).unwrap().unwrap();
        assert_eq!(version.repository_root.as_deref(), Some("file:///repo"));
        assert_eq!(version.peg_revision, Some(7));
        assert_eq!(version.path.as_deref(), Some("trunk"));
        assert_eq!(version.kind, NodeKind::Dir);
    }

    #[test]
    fn test_version_non_numeric_revision() {
        let skel = parse(b"(version file:///repo seven trunk dir)").unwrap();
        assert!(matches!(
            decode_version(&skel),
            Err(CoreError::InvalidRevision(text)) if text == "seven"
        ));
    }

    #[test]
    fn test_version_bad_root() {
        let skel = parse(b"(version not-a-url 1 7 trunk dir)").unwrap();
        assert!(matches!(
            decode_version(&skel),
            Err(CoreError::InvalidRepositoryRoot(_))
        ));
    }

    #[test]
    fn test_version_revision_must_be_plain_digits() {
        for text in ["+5", " 5", "5 ", "0x5", ""] {
            let bytes = format!("(version file:///repo {} {text} trunk dir)", text.len());
            let skel = parse(bytes.as_bytes()).unwrap();
            assert!(
                matches!(decode_version(&skel), Err(CoreError::InvalidRevision(ref t)) if t == text),
                "revision {text:?}"
            );
        }
    }

    #[test]
    fn test_encode_rejects_root_decode_would_reject() {
        for root in ["repos", "", "not a url"] {
            let version = ConflictVersion::new(root, "trunk/a.c", 3, NodeKind::File);
            assert!(
                matches!(encode_version(Some(&version)), Err(CoreError::InvalidRepositoryRoot(ref r)) if r == root),
                "root {root:?}"
            );

            let conflict = sample_conflict().with_source_right(version);
            assert!(matches!(
                encode_single_conflict(&conflict),
                Err(CoreError::InvalidRepositoryRoot(_))
            ));
        }
    }

    #[test]
    fn test_empty_path_roundtrips() {
        let version = ConflictVersion::new("svn://host/r", "", 9, NodeKind::Dir);
        assert_eq!(version.path, None);
        let decoded = decode_version(&encode_version(Some(&version)).unwrap()).unwrap();
        assert_eq!(decoded, Some(version));
    }

    #[test]
    fn test_version_bad_kind() {
        let skel = parse(b"(version file:///repo 1 7 trunk unknown)").unwrap();
        assert!(matches!(
            decode_version(&skel),
            Err(CoreError::UnknownValue(FieldCategory::NodeKind))
        ));
    }

    #[test]
    fn test_bogus_action_names_field() {
        let err = decode_conflict(&conflict_with(4, "bogus"), Path::new("wc")).unwrap_err();
        assert!(matches!(err, CoreError::UnknownValue(FieldCategory::ConflictAction)));
        assert!(err.to_string().contains("conflict action"));
    }

    #[test]
    fn test_bogus_operation_and_reason() {
        assert!(matches!(
            decode_conflict(&conflict_with(3, "checkout"), Path::new("wc")),
            Err(CoreError::UnknownValue(FieldCategory::Operation))
        ));
        assert!(matches!(
            decode_conflict(&conflict_with(5, "Edited"), Path::new("wc")),
            Err(CoreError::UnknownValue(FieldCategory::ConflictReason))
        ));
    }

    #[test]
    fn test_node_kind_must_be_file_or_dir() {
        assert!(matches!(
            decode_conflict(&conflict_with(2, "none"), Path::new("wc")),
            Err(CoreError::InvalidNodeKind)
        ));
        assert!(matches!(
            decode_conflict(&conflict_with(2, ""), Path::new("wc")),
            Err(CoreError::InvalidNodeKind)
        ));
        assert!(matches!(
            decode_conflict(&conflict_with(2, "symlink"), Path::new("wc")),
            Err(CoreError::UnknownValue(FieldCategory::NodeKind))
        ));
    }

    #[test]
    fn test_empty_victim_rejected() {
        assert!(matches!(
            decode_conflict(&conflict_with(1, ""), Path::new("wc")),
            Err(CoreError::EmptyVictim)
        ));

        let mut conflict = sample_conflict();
        conflict.victim.clear();
        assert!(matches!(encode_conflict(&conflict), Err(CoreError::EmptyVictim)));
    }

    #[test]
    fn test_encode_rejects_unknown_node_kind() {
        let mut conflict = sample_conflict();
        conflict.node_kind = NodeKind::None;
        assert!(matches!(encode_conflict(&conflict), Err(CoreError::InvalidNodeKind)));
    }

    #[test]
    fn test_shape_checked_before_content() {
        // Seven elements with a bogus action: shape error wins.
        let skel = parse(b"(conflict foo file update bogus (version 0  2 -1 0  0 ) (version 0  2 -1 0  0 ))")
            .unwrap();
        assert!(matches!(
            decode_conflict(&skel, Path::new("wc")),
            Err(CoreError::InvalidConflictShape)
        ));
    }

    #[test]
    fn test_decoded_path_joins_directory() {
        let skel = encode_conflict(&sample_conflict()).unwrap();
        let decoded = decode_conflict(&skel, Path::new("other/dir")).unwrap();
        assert_eq!(decoded.path(), PathBuf::from("other/dir/foo.c"));
    }
}
