//! The set of tree conflicts recorded for one directory.
//!
//! A directory stores all of its tree conflicts in a single blob: a skel
//! list whose children are conflict skels. The registry is the decoded form
//! of that blob, keyed by victim basename.

use std::collections::btree_map::{self, BTreeMap};
use std::path::{Path, PathBuf};

use crate::codec::{decode_conflict, encode_conflict};
use crate::conflict::TreeConflictDescription;
use crate::error::{CoreError, Result};
use crate::grammar::{parse, unparse};
use crate::skel::Skel;
use crate::validation::is_valid_conflict;

/// Tree conflicts of one directory, keyed by victim basename.
///
/// Iteration is ordered by basename, which makes [`encode_registry`]
/// byte-for-byte deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConflictRegistry {
    directory: PathBuf,
    conflicts: BTreeMap<String, TreeConflictDescription>,
}

impl TreeConflictRegistry {
    /// Create an empty registry for `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            conflicts: BTreeMap::new(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Record a conflict, replacing any previous one on the same victim.
    pub fn insert(&mut self, conflict: TreeConflictDescription) -> Option<TreeConflictDescription> {
        self.conflicts.insert(conflict.victim.clone(), conflict)
    }

    pub fn remove(&mut self, victim: &str) -> Option<TreeConflictDescription> {
        self.conflicts.remove(victim)
    }

    pub fn get(&self, victim: &str) -> Option<&TreeConflictDescription> {
        self.conflicts.get(victim)
    }

    pub fn contains(&self, victim: &str) -> bool {
        self.conflicts.contains_key(victim)
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Conflicts in basename order.
    pub fn iter(&self) -> btree_map::Values<'_, String, TreeConflictDescription> {
        self.conflicts.values()
    }
}

impl<'a> IntoIterator for &'a TreeConflictRegistry {
    type Item = &'a TreeConflictDescription;
    type IntoIter = btree_map::Values<'a, String, TreeConflictDescription>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Decode a directory's conflict blob.
///
/// `None` means the directory has no recorded conflicts. When two entries
/// share a victim basename the later one wins.
pub fn decode_registry(data: Option<&[u8]>, directory: &Path) -> Result<TreeConflictRegistry> {
    let mut registry = TreeConflictRegistry::new(directory);
    let Some(data) = data else {
        return Ok(registry);
    };

    let skel = parse(data)?;
    let Some(children) = skel.as_list() else {
        return Err(CoreError::RegistryNotList);
    };

    for child in children {
        registry.insert(decode_conflict(child, directory)?);
    }
    Ok(registry)
}

/// Encode a registry to its blob form.
pub fn encode_registry(registry: &TreeConflictRegistry) -> Result<Vec<u8>> {
    let mut skel = Skel::empty_list();
    // Prepending in reverse leaves the outer list in basename order.
    for conflict in registry.iter().rev() {
        let conflict_skel = encode_conflict(conflict)?;
        if !is_valid_conflict(&conflict_skel) {
            return Err(CoreError::InvalidEncoding {
                what: "conflict description",
                skel: conflict_skel.to_string(),
            });
        }
        skel.prepend(conflict_skel)?;
    }
    Ok(unparse(&skel))
}

/// Decode a conflict blob stored as text.
pub fn registry_from_text(text: Option<&str>, directory: &Path) -> Result<TreeConflictRegistry> {
    decode_registry(text.map(str::as_bytes), directory)
}

/// Encode a registry as text.
///
/// Encoded registries are UTF-8 unless an atom holds non-UTF-8 bytes; those
/// are rendered lossily, so callers that need an exact copy should store
/// [`encode_registry`]'s bytes instead.
pub fn registry_to_text(registry: &TreeConflictRegistry) -> Result<String> {
    let data = encode_registry(registry)?;
    Ok(match String::from_utf8(data) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    })
}
