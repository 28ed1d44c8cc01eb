// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

//! CIP connection path encoding
//!
//! A route is a comma separated list of byte-valued hops, e.g. `1,0`
//! (backplane port 1, slot 0). The last hop may instead be a DH+ triple
//! `channel:src:dest` (channel `A`/`a`/`2` or `B`/`b`/`3`) when bridging to a
//! PLC/5 on a remote DH+ link.

use crate::plc::PlcKind;
use crate::status::{Status, ERR_BAD_PARAM};
use crate::Result;

/// encoded connection paths must fit a one-byte word count
pub(crate) const MAX_CONN_PATH: usize = 260;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DhpNode {
    channel: u8,
    src: u16,
    dest: u16,
}

fn bad_path(path: &str, msg: &str) -> Status {
    log::warn!("connection path {:?}: {}", path, msg);
    Status::Err(ERR_BAD_PARAM)
}

/// match a DH+ triple `c:d:d`.
///
/// Returns `None` when the segment does not even start like a triple (so it
/// may still be a plain hop number), `Some(Err(..))` when it commits to the
/// triple syntax and then fails.
fn match_dhp_node(seg: &str) -> Option<Result<DhpNode>> {
    let mut chars = seg.chars();
    let channel = match chars.next() {
        Some('A') | Some('a') | Some('2') => 1,
        Some('B') | Some('b') | Some('3') => 2,
        _ => return None,
    };
    if chars.next() != Some(':') {
        return None;
    }
    // committed to the DH+ syntax from here on
    let rest = &seg[2..];
    let (src, rest) = match rest.split_once(':') {
        Some(parts) => parts,
        None => return Some(Err(Status::Err(ERR_BAD_PARAM))),
    };
    let parse_node = |s: &str| -> Result<u16> {
        if s.is_empty() || s.len() > 3 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Status::Err(ERR_BAD_PARAM));
        }
        let v: u16 = s.parse().map_err(|_| Status::Err(ERR_BAD_PARAM))?;
        if v > 255 {
            return Err(Status::Err(ERR_BAD_PARAM));
        }
        Ok(v)
    };
    let node = (|| {
        Ok(DhpNode {
            channel,
            src: parse_node(src)?,
            dest: parse_node(rest)?,
        })
    })();
    Some(node)
}

/// encode a textual route into CIP connection path bytes.
///
/// Returns the padded byte path plus the DH+ destination node when the route
/// ends on a DH+ hop. The result length is always even and at most
/// [`MAX_CONN_PATH`].
pub(crate) fn encode_connection_path(
    path: &str,
    needs_connection: bool,
    plc: PlcKind,
) -> Result<(Vec<u8>, Option<u16>)> {
    let mut data: Vec<u8> = Vec::new();
    let mut dhp: Option<DhpNode> = None;

    for seg in path.split(',') {
        let seg = seg.trim();
        if seg.is_empty() {
            if path.trim().is_empty() {
                break;
            }
            return Err(bad_path(path, "empty segment"));
        }
        if dhp.is_some() {
            // a DH+ hop anywhere but the end of the route is unroutable
            return Err(bad_path(path, "DH+ hop must be the last segment"));
        }
        match match_dhp_node(seg) {
            Some(Ok(node)) => {
                log::debug!(
                    "route {:?}: DH+ channel {} src {} dest {}",
                    path,
                    node.channel,
                    node.src,
                    node.dest
                );
                dhp = Some(node);
            }
            Some(Err(_)) => return Err(bad_path(path, "bad DH+ triple syntax")),
            None => {
                let hop: u8 = seg
                    .parse()
                    .map_err(|_| bad_path(path, "expected a number in 0..255"))?;
                data.push(hop);
            }
        }
    }

    let dhp_dest = match dhp {
        Some(node) if plc == PlcKind::Plc5 => {
            // port segment to the DH+ channel, link address 1
            data.extend_from_slice(&[0x20, 0xA6, 0x24, node.channel, 0x2C, 0x01]);
            Some(node.dest)
        }
        Some(_) => {
            return Err(bad_path(path, "DH+ routing is only valid for plc5"));
        }
        None => {
            if needs_connection {
                // generic route to the message router object
                data.extend_from_slice(&[0x20, 0x02, 0x24, 0x01]);
            }
            None
        }
    };

    // pad to a whole number of 16-bit words
    if data.len() & 0x01 != 0 {
        data.push(0);
    }
    if data.len() > MAX_CONN_PATH {
        return Err(bad_path(path, "encoded path too long"));
    }
    Ok((data, dhp_dest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backplane_route_connected() {
        let (path, dest) = encode_connection_path("1,4", true, PlcKind::ControlLogix).unwrap();
        assert_eq!(path, vec![0x01, 0x04, 0x20, 0x02, 0x24, 0x01]);
        assert_eq!(dest, None);
    }

    #[test]
    fn test_dhp_route_plc5() {
        let (path, dest) = encode_connection_path("A:1:2", false, PlcKind::Plc5).unwrap();
        assert_eq!(path, vec![0x20, 0xA6, 0x24, 0x01, 0x2C, 0x01]);
        assert_eq!(dest, Some(2));
    }

    #[test]
    fn test_dhp_channel_b() {
        let (path, dest) = encode_connection_path("b:0:17", false, PlcKind::Plc5).unwrap();
        assert_eq!(path, vec![0x20, 0xA6, 0x24, 0x02, 0x2C, 0x01]);
        assert_eq!(dest, Some(17));
    }

    #[test]
    fn test_hop_before_dhp() {
        let (path, dest) = encode_connection_path("1,2,A:1:5", false, PlcKind::Plc5).unwrap();
        assert_eq!(path, vec![0x01, 0x02, 0x20, 0xA6, 0x24, 0x01, 0x2C, 0x01]);
        assert_eq!(dest, Some(5));
    }

    #[test]
    fn test_odd_length_padded() {
        let (path, _) = encode_connection_path("1", false, PlcKind::ControlLogix).unwrap();
        assert_eq!(path, vec![0x01, 0x00]);
        let (path, _) = encode_connection_path("1,0", false, PlcKind::ControlLogix).unwrap();
        assert_eq!(path, vec![0x01, 0x00]);
    }

    #[test]
    fn test_empty_path() {
        let (path, dest) = encode_connection_path("", true, PlcKind::Micro800).unwrap();
        assert_eq!(path, vec![0x20, 0x02, 0x24, 0x01]);
        assert_eq!(dest, None);
        let (path, _) = encode_connection_path("", false, PlcKind::ControlLogix).unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn test_dhp_not_last_rejected() {
        let err = encode_connection_path("A:1:2,5", false, PlcKind::Plc5).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
    }

    #[test]
    fn test_dhp_wrong_family_rejected() {
        let err = encode_connection_path("A:1:2", true, PlcKind::ControlLogix).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
        let err = encode_connection_path("A:1:2", false, PlcKind::Slc500).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
    }

    #[test]
    fn test_node_out_of_range() {
        let err = encode_connection_path("A:1:300", false, PlcKind::Plc5).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
        let err = encode_connection_path("A:1:1234", false, PlcKind::Plc5).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
    }

    #[test]
    fn test_hop_out_of_range() {
        let err = encode_connection_path("1,300", false, PlcKind::ControlLogix).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
    }

    #[test]
    fn test_garbage_rejected() {
        let err = encode_connection_path("1,x", false, PlcKind::ControlLogix).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
        let err = encode_connection_path("A:x:2", false, PlcKind::Plc5).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
    }

    #[test]
    fn test_deterministic() {
        let a = encode_connection_path("1,4", true, PlcKind::ControlLogix).unwrap();
        let b = encode_connection_path("1,4", true, PlcKind::ControlLogix).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.0.len() % 2, 0);
    }
}
