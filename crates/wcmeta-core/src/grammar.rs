//! The skel grammar: byte-oriented parsing and canonical unparsing.
//!
//! ```text
//! skel     := atom | list
//! list     := '(' space* (skel space*)* ')'
//! atom     := implicit | explicit
//! implicit := ALPHA (printable, not space, not paren)*
//! explicit := DIGIT+ space BYTE{n}
//! ```
//!
//! Parsing accepts either atom form. Unparsing is canonical: the implicit
//! form is used only when the atom can round-trip through it, everything
//! else is length-prefixed.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::error::{CoreError, Result};
use crate::skel::Skel;

/// Atoms this long or longer are always written in explicit form.
pub const MAX_IMPLICIT_LEN: usize = 100;

/// Deepest list nesting accepted by [`parse`].
pub const MAX_NESTING: usize = 256;

fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')
}

fn is_paren(byte: u8) -> bool {
    matches!(byte, b'(' | b')' | b'[' | b']')
}

/// Bytes allowed after the first byte of an implicit atom.
fn is_implicit_byte(byte: u8) -> bool {
    byte.is_ascii_graphic() && !is_paren(byte)
}

/// Whether `data` can be written as an implicit atom.
fn use_implicit(data: &[u8]) -> bool {
    match data.first() {
        Some(first) if first.is_ascii_alphabetic() => {
            data.len() < MAX_IMPLICIT_LEN && data.iter().all(|&b| is_implicit_byte(b))
        }
        _ => false,
    }
}

/// Parse one skel from `data`.
///
/// Leading and trailing whitespace is ignored; anything else after the
/// top-level value is an error.
pub fn parse(data: &[u8]) -> Result<Skel> {
    let mut parser = Parser { data, pos: 0 };
    parser.skip_space();
    if parser.at_end() {
        return Err(parser.malformed("empty input"));
    }

    let skel = parser.parse_value()?;

    parser.skip_space();
    if !parser.at_end() {
        return Err(parser.malformed("trailing data after skel"));
    }
    Ok(skel)
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn skip_space(&mut self) {
        while self.peek().is_some_and(is_space) {
            self.pos += 1;
        }
    }

    fn malformed(&self, reason: &'static str) -> CoreError {
        CoreError::MalformedSkel {
            offset: self.pos,
            reason,
        }
    }

    /// Parse a single value. Open lists live on an explicit stack so hostile
    /// input cannot exhaust the call stack.
    fn parse_value(&mut self) -> Result<Skel> {
        let mut open: Vec<VecDeque<Skel>> = Vec::new();

        loop {
            self.skip_space();
            let Some(byte) = self.peek() else {
                let reason = if open.is_empty() {
                    "unexpected end of input"
                } else {
                    "unbalanced parentheses"
                };
                return Err(self.malformed(reason));
            };

            let value = match byte {
                b'(' => {
                    if open.len() >= MAX_NESTING {
                        return Err(self.malformed("lists nested too deeply"));
                    }
                    self.pos += 1;
                    open.push(VecDeque::new());
                    continue;
                }
                b')' => {
                    let Some(children) = open.pop() else {
                        return Err(self.malformed("unbalanced parentheses"));
                    };
                    self.pos += 1;
                    Skel::List(children)
                }
                b'0'..=b'9' => self.explicit_atom()?,
                b if b.is_ascii_alphabetic() => self.implicit_atom(),
                _ => return Err(self.malformed("unexpected byte")),
            };

            match open.last_mut() {
                Some(parent) => parent.push_back(value),
                None => return Ok(value),
            }
        }
    }

    fn implicit_atom(&mut self) -> Skel {
        let start = self.pos;
        self.pos += 1;
        while self.peek().is_some_and(is_implicit_byte) {
            self.pos += 1;
        }
        Skel::Atom(Bytes::copy_from_slice(&self.data[start..self.pos]))
    }

    fn explicit_atom(&mut self) -> Result<Skel> {
        let mut len: usize = 0;
        while let Some(digit @ b'0'..=b'9') = self.peek() {
            len = len
                .checked_mul(10)
                .and_then(|n| n.checked_add(usize::from(digit - b'0')))
                .ok_or_else(|| self.malformed("explicit atom length overflows"))?;
            self.pos += 1;
        }

        match self.peek() {
            Some(b) if is_space(b) => self.pos += 1,
            _ => return Err(self.malformed("explicit atom length not followed by whitespace")),
        }

        let remaining = self.data.len() - self.pos;
        if len > remaining {
            return Err(self.malformed("explicit atom length exceeds input"));
        }

        let start = self.pos;
        self.pos += len;
        Ok(Skel::Atom(Bytes::copy_from_slice(&self.data[start..self.pos])))
    }
}

/// Serialize a skel to its canonical byte form.
pub fn unparse(skel: &Skel) -> Vec<u8> {
    let mut buf = Vec::new();
    unparse_to(&mut buf, skel);
    buf
}

fn unparse_to(buf: &mut Vec<u8>, skel: &Skel) {
    match skel {
        Skel::Atom(data) => {
            if use_implicit(data) {
                buf.extend_from_slice(data);
            } else {
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.push(b' ');
                buf.extend_from_slice(data);
            }
        }
        Skel::List(children) => {
            buf.push(b'(');
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    buf.push(b' ');
                }
                unparse_to(buf, child);
            }
            buf.push(b')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn malformed_reason(input: &[u8]) -> &'static str {
        match parse(input) {
            Err(CoreError::MalformedSkel { reason, .. }) => reason,
            other => panic!("expected malformed skel, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_implicit_and_explicit_atoms_agree() {
        assert_eq!(parse(b"conflict").unwrap(), Skel::atom("conflict"));
        assert_eq!(parse(b"8 conflict").unwrap(), Skel::atom("conflict"));
    }

    #[test]
    fn test_parse_list() {
        let skel = parse(b"(version 0  2 -1 0  0 )").unwrap();
        assert_eq!(
            skel,
            Skel::list([
                Skel::atom("version"),
                Skel::atom(""),
                Skel::atom("-1"),
                Skel::atom(""),
                Skel::atom(""),
            ])
        );
    }

    #[test]
    fn test_parse_nested_with_extra_whitespace() {
        let skel = parse(b"  ( a\n( b\t(c) )  () )\n").unwrap();
        assert_eq!(
            skel,
            Skel::list([
                Skel::atom("a"),
                Skel::list([Skel::atom("b"), Skel::list([Skel::atom("c")])]),
                Skel::empty_list(),
            ])
        );
    }

    #[test]
    fn test_explicit_atom_may_hold_delimiters() {
        let skel = parse(b"(5 a b)c)").unwrap();
        assert_eq!(skel, Skel::list([Skel::atom("a b)c")]));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(malformed_reason(b""), "empty input");
        assert_eq!(malformed_reason(b"   \n"), "empty input");
        assert_eq!(malformed_reason(b"(a b"), "unbalanced parentheses");
        assert_eq!(malformed_reason(b")"), "unbalanced parentheses");
        assert_eq!(malformed_reason(b"(a))"), "trailing data after skel");
        assert_eq!(malformed_reason(b"10 short"), "explicit atom length exceeds input");
        assert_eq!(
            malformed_reason(b"3abc"),
            "explicit atom length not followed by whitespace"
        );
        assert_eq!(malformed_reason(b"(a \x01)"), "unexpected byte");
        assert_eq!(malformed_reason(b"-1"), "unexpected byte");
        assert_eq!(
            malformed_reason(b"99999999999999999999999999 x"),
            "explicit atom length overflows"
        );
    }

    #[test]
    fn test_nesting_limit() {
        let deep = "(".repeat(MAX_NESTING + 1);
        assert_eq!(malformed_reason(deep.as_bytes()), "lists nested too deeply");
    }

    #[test]
    fn test_unparse_canonical_forms() {
        assert_eq!(unparse(&Skel::atom("edited")), b"edited");
        assert_eq!(unparse(&Skel::atom("moved-away")), b"moved-away");
        assert_eq!(unparse(&Skel::atom("")), b"0 ");
        assert_eq!(unparse(&Skel::atom("-1")), b"2 -1");
        assert_eq!(unparse(&Skel::atom("two words")), b"9 two words");
        assert_eq!(unparse(&Skel::atom("a(b")), b"3 a(b");
        assert_eq!(unparse(&Skel::atom(&b"\xffx"[..])), b"2 \xffx");
        assert_eq!(
            unparse(&Skel::atom("http://svn.example.com/repos")),
            b"http://svn.example.com/repos"
        );
        assert_eq!(unparse(&Skel::empty_list()), b"()");
    }

    #[test]
    fn test_long_atoms_are_explicit() {
        let long = "a".repeat(MAX_IMPLICIT_LEN);
        let bytes = unparse(&Skel::str_atom(&long));
        assert!(bytes.starts_with(b"100 "));
        assert_eq!(parse(&bytes).unwrap(), Skel::str_atom(&long));
    }

    fn arb_skel() -> impl Strategy<Value = Skel> {
        let leaf = prop_oneof![
            prop::collection::vec(any::<u8>(), 0..24).prop_map(Skel::atom),
            "[a-z][a-z0-9-]{0,12}".prop_map(Skel::atom),
            prop::collection::vec(prop::sample::select(vec![b' ', b'\t', b'\n']), 0..6)
                .prop_map(Skel::atom),
        ];
        leaf.prop_recursive(4, 48, 6, |inner| {
            prop::collection::vec(inner, 0..6).prop_map(Skel::list)
        })
    }

    proptest! {
        #[test]
        fn test_roundtrip(skel in arb_skel()) {
            let bytes = unparse(&skel);
            prop_assert_eq!(parse(&bytes).unwrap(), skel);
        }

        #[test]
        fn test_unparse_is_deterministic(skel in arb_skel()) {
            prop_assert_eq!(unparse(&skel), unparse(&skel.clone()));
        }
    }
}
