//! Skel: a minimal recursive value of byte atoms and ordered lists.
//!
//! A skel carries no I/O and no domain knowledge. The grammar that turns
//! skels into bytes and back lives in [`crate::grammar`].

use std::collections::VecDeque;
use std::fmt;

use bytes::Bytes;

use crate::error::{CoreError, Result};
use crate::grammar::unparse;

/// A skel value: either an atom of raw bytes or a list of skels.
///
/// Lists keep their children in order. Equality is structural, so two skels
/// are equal exactly when they unparse to the same canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Skel {
    /// A terminal byte string.
    Atom(Bytes),
    /// An ordered sequence of children.
    List(VecDeque<Skel>),
}

impl Skel {
    /// Create an atom from anything convertible to [`Bytes`].
    pub fn atom(data: impl Into<Bytes>) -> Self {
        Skel::Atom(data.into())
    }

    /// Create an atom by copying a string's bytes.
    pub fn str_atom(text: &str) -> Self {
        Skel::Atom(Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Create an empty list.
    pub fn empty_list() -> Self {
        Skel::List(VecDeque::new())
    }

    /// Create a list from children in order.
    pub fn list(children: impl IntoIterator<Item = Skel>) -> Self {
        Skel::List(children.into_iter().collect())
    }

    pub fn is_atom(&self) -> bool {
        matches!(self, Skel::Atom(_))
    }

    /// The atom's bytes, or `None` for a list.
    pub fn as_atom(&self) -> Option<&[u8]> {
        match self {
            Skel::Atom(data) => Some(data),
            Skel::List(_) => None,
        }
    }

    /// The list's children, or `None` for an atom.
    pub fn as_list(&self) -> Option<&VecDeque<Skel>> {
        match self {
            Skel::Atom(_) => None,
            Skel::List(children) => Some(children),
        }
    }

    /// Number of children of a list, `None` for an atom.
    pub fn list_len(&self) -> Option<usize> {
        self.as_list().map(VecDeque::len)
    }

    /// The `index`th child of a list.
    pub fn child(&self, index: usize) -> Option<&Skel> {
        self.as_list().and_then(|children| children.get(index))
    }

    /// True if this is an atom whose bytes equal `expected`.
    pub fn atom_equals(&self, expected: &[u8]) -> bool {
        self.as_atom() == Some(expected)
    }

    /// True if this is a list and none of its children are lists.
    pub fn contains_atoms_only(&self) -> bool {
        self.as_list()
            .is_some_and(|children| children.iter().all(Skel::is_atom))
    }

    /// Insert `child` at the front of this list in O(1) amortized time.
    ///
    /// Builders prepend fields last-to-first so the tag atom, prepended last,
    /// ends up as element 0.
    pub fn prepend(&mut self, child: Skel) -> Result<()> {
        match self {
            Skel::List(children) => {
                children.push_front(child);
                Ok(())
            }
            Skel::Atom(_) => Err(CoreError::InvalidEncoding {
                what: "list",
                skel: self.to_string(),
            }),
        }
    }
}

impl fmt::Display for Skel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&unparse(self)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepend_puts_tag_first() {
        let mut skel = Skel::empty_list();
        skel.prepend(Skel::atom("second")).unwrap();
        skel.prepend(Skel::atom("first")).unwrap();
        skel.prepend(Skel::atom("tag")).unwrap();

        assert_eq!(skel.list_len(), Some(3));
        assert!(skel.child(0).unwrap().atom_equals(b"tag"));
        assert!(skel.child(2).unwrap().atom_equals(b"second"));
    }

    #[test]
    fn test_prepend_to_atom_fails() {
        let mut skel = Skel::atom("x");
        assert!(skel.prepend(Skel::atom("y")).is_err());
    }

    #[test]
    fn test_contains_atoms_only() {
        let flat = Skel::list([Skel::atom("a"), Skel::atom("")]);
        let nested = Skel::list([Skel::atom("a"), Skel::empty_list()]);
        assert!(flat.contains_atoms_only());
        assert!(!nested.contains_atoms_only());
        assert!(!Skel::atom("a").contains_atoms_only());
    }

    #[test]
    fn test_structural_equality() {
        let a = Skel::list([Skel::atom("x"), Skel::list([Skel::atom("")])]);
        let b = Skel::list([Skel::str_atom("x"), Skel::list([Skel::atom(Vec::new())])]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_display_uses_canonical_form() {
        let skel = Skel::list([Skel::atom("version"), Skel::atom("")]);
        assert_eq!(skel.to_string(), "(version 0 )");
    }
}
