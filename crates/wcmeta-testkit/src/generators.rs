//! Proptest generators for property-based testing.

use std::path::{Path, PathBuf};

use proptest::prelude::*;

use wcmeta_core::{
    ConflictAction, ConflictReason, ConflictVersion, NodeKind, Operation, Skel,
    TreeConflictDescription, TreeConflictRegistry,
};

/// Any atom: arbitrary bytes, implicit-looking words, or pure whitespace.
pub fn atom() -> impl Strategy<Value = Skel> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Skel::atom),
        "[a-zA-Z][a-zA-Z0-9._/:-]{0,20}".prop_map(Skel::atom),
        prop::collection::vec(
            prop::sample::select(vec![b' ', b'\t', b'\n', b'\r', 0x0b, 0x0c]),
            0..8
        )
        .prop_map(Skel::atom),
        prop::collection::vec(0x80u8..=0xff, 1..8).prop_map(Skel::atom),
    ]
}

/// Any skel up to a few levels deep.
pub fn skel() -> impl Strategy<Value = Skel> {
    atom().prop_recursive(5, 64, 8, |inner| {
        prop::collection::vec(inner, 0..8).prop_map(Skel::list)
    })
}

/// Node kind of a conflict victim.
pub fn victim_kind() -> impl Strategy<Value = NodeKind> {
    prop_oneof![Just(NodeKind::File), Just(NodeKind::Dir)]
}

/// Node kind recorded in a conflict version.
pub fn version_kind() -> impl Strategy<Value = NodeKind> {
    prop_oneof![
        Just(NodeKind::File),
        Just(NodeKind::Dir),
        Just(NodeKind::None),
        Just(NodeKind::Unknown),
    ]
}

pub fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Update),
        Just(Operation::Switch),
        Just(Operation::Merge),
    ]
}

pub fn action() -> impl Strategy<Value = ConflictAction> {
    prop_oneof![
        Just(ConflictAction::Edit),
        Just(ConflictAction::Add),
        Just(ConflictAction::Delete),
        Just(ConflictAction::Replace),
    ]
}

pub fn reason() -> impl Strategy<Value = ConflictReason> {
    prop_oneof![
        Just(ConflictReason::Edited),
        Just(ConflictReason::Obstructed),
        Just(ConflictReason::Deleted),
        Just(ConflictReason::Missing),
        Just(ConflictReason::Unversioned),
        Just(ConflictReason::Added),
        Just(ConflictReason::Replaced),
        Just(ConflictReason::MovedAway),
        Just(ConflictReason::MovedHere),
    ]
}

/// A victim basename, including names that need explicit atoms.
pub fn victim() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z0-9_.-]{0,15}",
        "[0-9][a-z0-9]{0,7}",
        "[a-z]{1,6} [a-z]{1,6}",
        "[a-z]{1,4}\\([a-z]{1,4}\\)",
    ]
}

/// A repository root URL.
pub fn repository_root() -> impl Strategy<Value = String> {
    ("(http|https|svn|file)", "[a-z]{1,8}", "[a-z]{0,8}").prop_map(|(scheme, host, repo)| {
        if scheme == "file" {
            format!("file:///{host}/{repo}")
        } else {
            format!("{scheme}://{host}.example.com/{repo}")
        }
    })
}

/// A present conflict version. The root is always set, since a version
/// without a root decodes as absent.
pub fn conflict_version() -> impl Strategy<Value = ConflictVersion> {
    (
        repository_root(),
        proptest::option::of("[a-z]{1,8}(/[a-z0-9 ]{1,8}){0,3}"),
        proptest::option::of(0u64..=1_000_000),
        version_kind(),
    )
        .prop_map(|(root, path, peg_revision, kind)| ConflictVersion {
            repository_root: Some(root),
            path,
            peg_revision,
            kind,
        })
}

/// A version whose root may be anything, valid URL or not.
pub fn unchecked_conflict_version() -> impl Strategy<Value = ConflictVersion> {
    (
        prop_oneof![repository_root(), "\\PC{0,12}"],
        proptest::option::of("[a-z]{1,8}"),
        proptest::option::of(0u64..=1_000_000),
        version_kind(),
    )
        .prop_map(|(root, path, peg_revision, kind)| ConflictVersion {
            repository_root: Some(root),
            path,
            peg_revision,
            kind,
        })
}

/// Parameters for generating a tree conflict.
#[derive(Debug, Clone)]
pub struct ConflictParams {
    pub victim: String,
    pub node_kind: NodeKind,
    pub operation: Operation,
    pub action: ConflictAction,
    pub reason: ConflictReason,
    pub source_left: Option<ConflictVersion>,
    pub source_right: Option<ConflictVersion>,
}

impl Arbitrary for ConflictParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            victim(),
            victim_kind(),
            operation(),
            action(),
            reason(),
            proptest::option::of(conflict_version()),
            proptest::option::of(conflict_version()),
        )
            .prop_map(
                |(victim, node_kind, operation, action, reason, source_left, source_right)| {
                    ConflictParams {
                        victim,
                        node_kind,
                        operation,
                        action,
                        reason,
                        source_left,
                        source_right,
                    }
                },
            )
            .boxed()
    }
}

/// Build a conflict on `directory` from parameters.
pub fn conflict_from_params(params: &ConflictParams, directory: &Path) -> TreeConflictDescription {
    TreeConflictDescription {
        directory: directory.to_path_buf(),
        victim: params.victim.clone(),
        node_kind: params.node_kind,
        operation: params.operation,
        action: params.action,
        reason: params.reason,
        source_left: params.source_left.clone(),
        source_right: params.source_right.clone(),
    }
}

/// A registry on `directory` holding up to `max` conflicts.
pub fn registry(directory: PathBuf, max: usize) -> impl Strategy<Value = TreeConflictRegistry> {
    prop::collection::vec(any::<ConflictParams>(), 0..=max).prop_map(move |params| {
        let mut registry = TreeConflictRegistry::new(directory.clone());
        for p in &params {
            registry.insert(conflict_from_params(p, &directory));
        }
        registry
    })
}
