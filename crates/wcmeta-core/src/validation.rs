//! Shape checks for conflict and version skels.
//!
//! Shape is validated before any field is interpreted, so a record with the
//! wrong arity or tag is reported as corrupt rather than half-decoded.

use crate::skel::Skel;

/// Tag atom of a conflict description skel.
pub const CONFLICT_TAG: &[u8] = b"conflict";
/// Tag atom of a conflict version skel.
pub const VERSION_TAG: &[u8] = b"version";

/// Elements in a conflict skel, tag included.
pub const CONFLICT_ARITY: usize = 8;
/// Elements in a version skel, tag included.
pub const VERSION_ARITY: usize = 5;

/// `("version" root rev path kind)`, atoms only.
pub fn is_valid_version(skel: &Skel) -> bool {
    skel.list_len() == Some(VERSION_ARITY)
        && skel.child(0).is_some_and(|tag| tag.atom_equals(VERSION_TAG))
        && skel.contains_atoms_only()
}

/// `("conflict" victim kind operation action reason left right)` where
/// elements 1-5 are atoms and 6-7 are valid version skels.
pub fn is_valid_conflict(skel: &Skel) -> bool {
    if skel.list_len() != Some(CONFLICT_ARITY) {
        return false;
    }
    if !skel.child(0).is_some_and(|tag| tag.atom_equals(CONFLICT_TAG)) {
        return false;
    }
    if !(1..6).all(|i| skel.child(i).is_some_and(Skel::is_atom)) {
        return false;
    }
    skel.child(6).is_some_and(is_valid_version) && skel.child(7).is_some_and(is_valid_version)
}
