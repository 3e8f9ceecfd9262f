//! Golden skel vectors.
//!
//! These vectors pin the exact bytes the codec writes, so stores written by
//! one build stay readable by every other build.

use std::path::Path;

use wcmeta_core::{
    decode_registry, decode_single_conflict, decode_version, encode_registry,
    encode_single_conflict, encode_version, parse, unparse, ConflictAction, ConflictReason,
    ConflictVersion, NodeKind, Operation, TreeConflictDescription, TreeConflictRegistry,
};

/// Directory every vector's conflicts belong to.
pub const VECTOR_DIR: &str = "/wc/dir";

/// What a vector encodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    Version(Option<ConflictVersion>),
    Conflict(TreeConflictDescription),
    Registry(TreeConflictRegistry),
}

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Builds the value to encode.
    pub subject: fn() -> Subject,
    /// Expected canonical bytes.
    pub expected: &'static [u8],
}

fn trunk_file() -> ConflictVersion {
    ConflictVersion::new("http://svn.example.com/repos", "trunk/a.c", 12, NodeKind::File)
}

fn conflict(
    victim: &str,
    node_kind: NodeKind,
    operation: Operation,
    action: ConflictAction,
    reason: ConflictReason,
) -> TreeConflictDescription {
    TreeConflictDescription::new(VECTOR_DIR, victim, node_kind, operation, action, reason)
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "null version",
            subject: || Subject::Version(None),
            expected: b"(version 0  2 -1 0  0 )",
        },
        GoldenVector {
            name: "full version",
            subject: || Subject::Version(Some(trunk_file())),
            expected: b"(version http://svn.example.com/repos 2 12 trunk/a.c file)",
        },
        GoldenVector {
            name: "version with root only",
            subject: || {
                Subject::Version(Some(ConflictVersion {
                    repository_root: Some("svn://host/repo".into()),
                    path: None,
                    peg_revision: None,
                    kind: NodeKind::Unknown,
                }))
            },
            expected: b"(version svn://host/repo 2 -1 0  0 )",
        },
        GoldenVector {
            name: "conflict with null versions",
            subject: || {
                Subject::Conflict(conflict(
                    "foo",
                    NodeKind::Dir,
                    Operation::Update,
                    ConflictAction::Delete,
                    ConflictReason::Edited,
                ))
            },
            expected: b"(conflict foo dir update delete edited \
                        (version 0  2 -1 0  0 ) (version 0  2 -1 0  0 ))",
        },
        GoldenVector {
            name: "merge conflict with incoming version",
            subject: || {
                Subject::Conflict(
                    conflict(
                        "a.c",
                        NodeKind::File,
                        Operation::Merge,
                        ConflictAction::Add,
                        ConflictReason::Obstructed,
                    )
                    .with_source_right(trunk_file()),
                )
            },
            expected: b"(conflict a.c file merge add obstructed (version 0  2 -1 0  0 ) \
                        (version http://svn.example.com/repos 2 12 trunk/a.c file))",
        },
        GoldenVector {
            name: "victim needing an explicit atom",
            subject: || {
                Subject::Conflict(conflict(
                    "my file",
                    NodeKind::File,
                    Operation::Switch,
                    ConflictAction::Replace,
                    ConflictReason::MovedAway,
                ))
            },
            expected: b"(conflict 7 my file file switch replace moved-away \
                        (version 0  2 -1 0  0 ) (version 0  2 -1 0  0 ))",
        },
        GoldenVector {
            name: "empty registry",
            subject: || Subject::Registry(TreeConflictRegistry::new(VECTOR_DIR)),
            expected: b"()",
        },
        GoldenVector {
            name: "registry in basename order",
            subject: || {
                let mut registry = TreeConflictRegistry::new(VECTOR_DIR);
                registry.insert(conflict(
                    "b",
                    NodeKind::File,
                    Operation::Update,
                    ConflictAction::Edit,
                    ConflictReason::Deleted,
                ));
                registry.insert(conflict(
                    "a",
                    NodeKind::Dir,
                    Operation::Update,
                    ConflictAction::Add,
                    ConflictReason::Unversioned,
                ));
                Subject::Registry(registry)
            },
            expected: b"((conflict a dir update add unversioned \
                        (version 0  2 -1 0  0 ) (version 0  2 -1 0  0 )) \
                        (conflict b file update edit deleted \
                        (version 0  2 -1 0  0 ) (version 0  2 -1 0  0 )))",
        },
    ]
}

/// Encode a vector's subject.
pub fn encode_subject(subject: &Subject) -> Result<Vec<u8>, String> {
    match subject {
        Subject::Version(version) => encode_version(version.as_ref())
            .map(|skel| unparse(&skel))
            .map_err(|e| e.to_string()),
        Subject::Conflict(conflict) => encode_single_conflict(conflict).map_err(|e| e.to_string()),
        Subject::Registry(registry) => encode_registry(registry).map_err(|e| e.to_string()),
    }
}

/// Decode `bytes` back into the same kind of subject.
pub fn decode_subject(like: &Subject, bytes: &[u8]) -> Result<Subject, String> {
    let dir = Path::new(VECTOR_DIR);
    match like {
        Subject::Version(_) => parse(bytes)
            .and_then(|skel| decode_version(&skel))
            .map(Subject::Version)
            .map_err(|e| e.to_string()),
        Subject::Conflict(_) => decode_single_conflict(bytes, dir)
            .map(Subject::Conflict)
            .map_err(|e| e.to_string()),
        Subject::Registry(_) => decode_registry(Some(bytes), dir)
            .map(Subject::Registry)
            .map_err(|e| e.to_string()),
    }
}

/// Check one vector: it must encode to the expected bytes and decode back.
pub fn verify_vector(vector: &GoldenVector) -> Result<(), String> {
    let subject = (vector.subject)();
    let encoded = encode_subject(&subject)?;
    if encoded != vector.expected {
        return Err(format!(
            "{}: expected {} got {}",
            vector.name,
            hex::encode(vector.expected),
            hex::encode(&encoded)
        ));
    }
    let decoded = decode_subject(&subject, &encoded)?;
    if decoded != subject {
        return Err(format!("{}: decoded value differs", vector.name));
    }
    Ok(())
}

/// Verify all golden vectors.
pub fn verify_all_vectors() -> Result<(), String> {
    all_vectors().iter().try_for_each(verify_vector)
}
