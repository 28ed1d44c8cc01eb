// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

//! symbolic tag name encoding
//!
//! Turns a Logix-style tag name like `MyUDT.Member[3,4].2` into the CIP IOI
//! byte string sent in read/write request paths. The grammar:
//!
//! ```text
//! tag      ::= symbol ( '.' symbol | '[' num (',' num){0,2} ']' )* ( '.' num )?
//! symbol   ::= [A-Za-z_:] [A-Za-z0-9_:]*
//! num      ::= [0-9]+
//! ```
//!
//! The trailing `'.' num` form is a bit index into the tag payload; it emits
//! no IOI bytes and is carried out-of-band.

use crate::status::{Status, ERR_BAD_PARAM};
use crate::Result;

/// encoded names must fit a one-byte word count
pub(crate) const MAX_ENCODED_NAME: usize = 260;

/// a fully encoded symbolic name
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EncodedName {
    /// `[word_count, ioi bytes...]`; the leading byte counts 16-bit words
    /// and does not count itself
    pub bytes: Vec<u8>,
    /// bit index when the name ends in a bit segment
    pub bit: Option<u16>,
}

fn bad_name(name: &str, msg: &str) -> Status {
    log::warn!("tag name {:?}: {}", name, msg);
    Status::Err(ERR_BAD_PARAM)
}

fn is_symbol_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':'
}

fn is_symbol_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b':'
}

/// scan a decimal number starting at `pos`, returning the value and the
/// first index past it
fn scan_number(name: &[u8], pos: usize) -> Option<(u32, usize)> {
    let mut i = pos;
    let mut val: u64 = 0;
    while i < name.len() && name[i].is_ascii_digit() {
        val = val * 10 + u64::from(name[i] - b'0');
        if val > u64::from(u32::MAX) {
            return None;
        }
        i += 1;
    }
    if i == pos {
        None
    } else {
        Some((val as u32, i))
    }
}

fn skip_whitespace(name: &[u8], pos: usize) -> usize {
    let mut i = pos;
    while i < name.len() && name[i] == b' ' {
        i += 1;
    }
    i
}

/// append a symbolic segment `91 <len> <ascii…> [pad]`; returns the index
/// past the symbol, or `None` when `pos` does not start a symbol
fn put_symbol(out: &mut Vec<u8>, name: &[u8], pos: usize) -> Option<usize> {
    if pos >= name.len() || !is_symbol_start(name[pos]) {
        return None;
    }
    let mut end = pos + 1;
    while end < name.len() && is_symbol_char(name[end]) {
        end += 1;
    }
    let seg = &name[pos..end];
    out.push(0x91);
    out.push(seg.len() as u8);
    out.extend_from_slice(seg);
    if seg.len() & 0x01 != 0 {
        out.push(0);
    }
    Some(end)
}

/// append a numeric element segment: `28 v` / `29 00 v16` / `2A 00 v32`
fn put_element(out: &mut Vec<u8>, val: u32) {
    if val <= 0xFF {
        out.push(0x28);
        out.push(val as u8);
    } else if val <= 0xFFFF {
        out.push(0x29);
        out.push(0);
        out.extend_from_slice(&(val as u16).to_le_bytes());
    } else {
        out.push(0x2A);
        out.push(0);
        out.extend_from_slice(&val.to_le_bytes());
    }
}

/// encode a symbolic tag name into its IOI form.
///
/// `payload_size` is the tag payload length in bytes; a trailing bit segment
/// must index inside it.
pub(crate) fn encode_tag_name(name: &str, payload_size: usize) -> Result<EncodedName> {
    if !name.is_ascii() {
        return Err(bad_name(name, "not ascii"));
    }
    let raw = name.as_bytes();
    let mut out: Vec<u8> = vec![0]; // word count placeholder
    let mut bit: Option<u16> = None;

    // names must start with a symbolic segment
    let mut pos = put_symbol(&mut out, raw, 0)
        .ok_or_else(|| bad_name(name, "must start with a symbolic segment"))?;

    while pos < raw.len() {
        match raw[pos] {
            b'.' => {
                pos += 1;
                match put_symbol(&mut out, raw, pos) {
                    Some(next) => pos = next,
                    None => {
                        // not a symbol, so this must be the final bit segment
                        let (val, next) = scan_number(raw, pos).ok_or_else(|| {
                            bad_name(name, "expected a symbol or bit index after '.'")
                        })?;
                        if val as usize >= payload_size.saturating_mul(8) {
                            return Err(bad_name(name, "bit index outside the payload"));
                        }
                        bit = Some(val as u16);
                        pos = next;
                        break;
                    }
                }
            }
            b'[' => {
                let mut dims = 0;
                loop {
                    pos = skip_whitespace(raw, pos + 1);
                    let (val, next) = scan_number(raw, pos)
                        .ok_or_else(|| bad_name(name, "expected an array index"))?;
                    put_element(&mut out, val);
                    dims += 1;
                    pos = skip_whitespace(raw, next);
                    match raw.get(pos) {
                        Some(b',') if dims < 3 => continue,
                        Some(b']') => break,
                        _ => return Err(bad_name(name, "expected ']'")),
                    }
                }
                pos += 1;
            }
            _ => break,
        }
        if out.len() > MAX_ENCODED_NAME {
            return Err(bad_name(name, "encoded name too long"));
        }
    }

    if pos != raw.len() {
        return Err(bad_name(name, "trailing characters after the name"));
    }
    if out.len() > MAX_ENCODED_NAME {
        return Err(bad_name(name, "encoded name too long"));
    }

    // symbol and element segments are all an even number of bytes
    debug_assert_eq!((out.len() - 1) % 2, 0);
    out[0] = ((out.len() - 1) / 2) as u8;
    Ok(EncodedName { bytes: out, bit })
}

impl EncodedName {
    /// the IOI path without the leading word count byte
    #[inline]
    pub fn path(&self) -> &[u8] {
        &self.bytes[1..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_symbol() {
        let e = encode_tag_name("Tag", 4).unwrap();
        assert_eq!(e.bytes, vec![0x03, 0x91, 0x03, b'T', b'a', b'g', 0x00]);
        assert_eq!(e.bit, None);
    }

    #[test]
    fn test_array_element() {
        let e = encode_tag_name("TestBigArray[5]", 4).unwrap();
        let mut expect = vec![0x08, 0x91, 0x0C];
        expect.extend_from_slice(b"TestBigArray");
        expect.extend_from_slice(&[0x28, 0x05]);
        assert_eq!(e.bytes, expect);
        // word count covers the whole IOI after the count byte
        assert_eq!(usize::from(e.bytes[0]) * 2 + 1, e.bytes.len());
    }

    #[test]
    fn test_wide_indexes() {
        let e = encode_tag_name("A[256]", 4).unwrap();
        assert_eq!(
            e.bytes,
            vec![0x04, 0x91, 0x01, b'A', 0x00, 0x29, 0x00, 0x00, 0x01]
        );
        let e = encode_tag_name("A[65536]", 4).unwrap();
        assert_eq!(
            e.bytes,
            vec![0x05, 0x91, 0x01, b'A', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x01, 0x00]
        );
    }

    #[test]
    fn test_multi_dimension() {
        let e = encode_tag_name("M[1, 2 ,3]", 4).unwrap();
        let mut expect = vec![0x05, 0x91, 0x01, b'M', 0x00];
        expect.extend_from_slice(&[0x28, 0x01, 0x28, 0x02, 0x28, 0x03]);
        assert_eq!(e.bytes, expect);
    }

    #[test]
    fn test_four_dimensions_rejected() {
        let err = encode_tag_name("M[1,2,3,4]", 4).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
    }

    #[test]
    fn test_nested_members_and_bit() {
        let e = encode_tag_name("Foo.Bar.3", 2).unwrap();
        let expect = vec![
            0x06, 0x91, 0x03, b'F', b'o', b'o', 0x00, 0x91, 0x03, b'B', b'a', b'r', 0x00,
        ];
        assert_eq!(e.bytes, expect);
        assert_eq!(e.bit, Some(3));
    }

    #[test]
    fn test_bit_out_of_range() {
        // a 2-byte payload has bits 0..=15
        let err = encode_tag_name("Foo.16", 2).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
        let e = encode_tag_name("Foo.15", 2).unwrap();
        assert_eq!(e.bit, Some(15));
    }

    #[test]
    fn test_bit_must_be_last() {
        let err = encode_tag_name("Foo.3.Bar", 2).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
        let err = encode_tag_name("Foo.3[1]", 2).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
    }

    #[test]
    fn test_program_scoped_name() {
        let e = encode_tag_name("Program:Main.Counter", 4).unwrap();
        let mut expect = vec![0x0C, 0x91, 0x0C];
        expect.extend_from_slice(b"Program:Main");
        expect.extend_from_slice(&[0x91, 0x07]);
        expect.extend_from_slice(b"Counter");
        expect.push(0x00);
        assert_eq!(e.bytes, expect);
    }

    #[test]
    fn test_bad_names() {
        for name in ["", "5Tag", "[1]", "Tag[", "Tag[1", "Tag[]", "Tag.", "Tag[1]x", "Tag-2"] {
            let err = encode_tag_name(name, 4).unwrap_err();
            assert_eq!(i32::from(err), ERR_BAD_PARAM, "name {:?}", name);
        }
    }

    #[test]
    fn test_over_long_name_rejected() {
        let long = format!("{}", "a".repeat(300));
        let err = encode_tag_name(&long, 4).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
    }

    #[test]
    fn test_word_count_invariant() {
        for name in ["Tag", "TestBigArray[5]", "Foo.Bar", "M[1,2,3]", "A[70000]"] {
            let e = encode_tag_name(name, 8).unwrap();
            assert_eq!(usize::from(e.bytes[0]) * 2 + 1, e.bytes.len());
        }
    }
}
