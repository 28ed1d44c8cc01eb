// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

//! PCCC command framing for the PLC/5, SLC 500 and MicroLogix families
//!
//! PCCC commands are tunneled through CIP service 0x4B on the PCCC
//! passthrough object, or carried directly inside connected frames with a
//! DH+ link header when the route ends on a DH+ bridge. Data-file addresses
//! use the classic `N7:0` / `F8:10` notation.

use crate::cip::{self, Reply};
use crate::enip::{Frame, Reader};
use crate::status::{Status, ERR_BAD_PARAM, ERR_BAD_REPLY, ERR_TOO_LARGE};
use crate::Result;

/// command byte for the protected typed / word range function set
const CMD_TYPED: u8 = 0x0F;
/// reply flag set on the command byte of a response
const CMD_REPLY_MASK: u8 = 0x40;
/// STS value signalling an extended status byte
const STS_EXTENDED: u8 = 0xF0;

/// PLC/5 word range write
const FUNC_WORD_RANGE_WRITE: u8 = 0x00;
/// PLC/5 word range read
const FUNC_WORD_RANGE_READ: u8 = 0x01;
/// SLC protected typed logical read, three address fields
const FUNC_TYPED_READ: u8 = 0xA2;
/// SLC protected typed logical write, three address fields
const FUNC_TYPED_WRITE: u8 = 0xAA;
/// SLC protected typed logical read-modify-write
const FUNC_TYPED_RMW: u8 = 0xAB;

/// a single PCCC request fits in one frame; no fragmentation on this path
pub(crate) const MAX_PCCC_PAYLOAD: usize = 240;

/// parsed data-file address such as `N7:0`, `F8:10` or `B3:4/2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileAddress {
    /// PCCC file type code, e.g. 0x89 for integer files
    pub file_type: u8,
    pub file_num: u16,
    pub elem: u16,
    /// bit position from a `/bit` suffix
    pub bit: Option<u8>,
    /// normalized `<letters><num>:<elem>` form, used for logical ASCII
    /// addressing on the PLC/5
    pub ascii: String,
}

fn bad_addr(name: &str, msg: &str) -> Status {
    log::warn!("data file address {:?}: {}", name, msg);
    Status::Err(ERR_BAD_PARAM)
}

/// map a file type mnemonic to (type code, default file number)
fn file_type_of(letters: &str) -> Option<(u8, Option<u16>)> {
    match letters {
        "O" => Some((0x8B, Some(0))),
        "I" => Some((0x8C, Some(1))),
        "S" => Some((0x84, Some(2))),
        "B" => Some((0x85, Some(3))),
        "T" => Some((0x86, Some(4))),
        "C" => Some((0x87, Some(5))),
        "R" => Some((0x88, Some(6))),
        "N" => Some((0x89, Some(7))),
        "F" => Some((0x8A, Some(8))),
        "ST" => Some((0x8D, None)),
        "A" => Some((0x8E, None)),
        "L" => Some((0x91, None)),
        _ => None,
    }
}

/// parse a data-file address.
///
/// Accepted shape: `letters [file#] ':' element ['/' bit]`, case
/// insensitive. File numbers default to the classic assignments (`N` is 7,
/// `F` is 8, ...) when omitted.
pub(crate) fn parse_address(name: &str) -> Result<FileAddress> {
    let s = name.trim();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    if i == 0 || i > 2 {
        return Err(bad_addr(name, "expected a file type mnemonic"));
    }
    let letters = s[..i].to_ascii_uppercase();
    let (file_type, default_num) =
        file_type_of(&letters).ok_or_else(|| bad_addr(name, "unknown file type"))?;

    let mut j = i;
    while j < bytes.len() && bytes[j].is_ascii_digit() {
        j += 1;
    }
    let file_num = if j > i {
        s[i..j]
            .parse::<u16>()
            .map_err(|_| bad_addr(name, "file number out of range"))?
    } else {
        default_num.ok_or_else(|| bad_addr(name, "file number required"))?
    };

    if bytes.get(j) != Some(&b':') {
        return Err(bad_addr(name, "expected ':'"));
    }
    j += 1;
    let mut k = j;
    while k < bytes.len() && bytes[k].is_ascii_digit() {
        k += 1;
    }
    if k == j {
        return Err(bad_addr(name, "expected an element number"));
    }
    let elem = s[j..k]
        .parse::<u16>()
        .map_err(|_| bad_addr(name, "element out of range"))?;

    let bit = match bytes.get(k) {
        None => None,
        Some(&b'/') => {
            let rest = &s[k + 1..];
            if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
                return Err(bad_addr(name, "expected a bit number after '/'"));
            }
            let v = rest
                .parse::<u8>()
                .map_err(|_| bad_addr(name, "bit out of range"))?;
            if v > 15 {
                return Err(bad_addr(name, "bit must be in 0..15"));
            }
            Some(v)
        }
        Some(_) => return Err(bad_addr(name, "trailing characters")),
    };

    Ok(FileAddress {
        file_type,
        file_num,
        elem,
        bit,
        ascii: format!("{}{}:{}", letters, file_num, elem),
    })
}

/// write an SLC logical address field: one byte, or 0xFF + 16 bits
fn put_addr_field(f: &mut Frame, v: u16) {
    if v < 0xFF {
        f.u8(v as u8);
    } else {
        f.u8(0xFF);
        f.u16(v);
    }
}

fn put_slc_address(f: &mut Frame, byte_size: usize, addr: &FileAddress) {
    f.u8(byte_size as u8);
    put_addr_field(f, addr.file_num);
    f.u8(addr.file_type);
    put_addr_field(f, addr.elem);
    put_addr_field(f, 0); // sub-element
}

/// PLC/5 logical ASCII address: `0x00 '$' <addr> 0x00`
fn put_plc5_address(f: &mut Frame, addr: &FileAddress) {
    f.u8(0x00);
    f.u8(b'$');
    f.bytes(addr.ascii.as_bytes());
    f.u8(0x00);
}

/// raw PCCC command: cmd, sts, tns, func, body
fn pccc_cmd(tns: u16, func: u8, body: &[u8]) -> Vec<u8> {
    let mut f = Frame::with_capacity(5 + body.len());
    f.u8(CMD_TYPED).u8(0).u16(tns).u8(func).bytes(body);
    f.into_vec()
}

/// SLC protected typed logical read
pub(crate) fn slc_read(tns: u16, addr: &FileAddress, bytes: usize) -> Result<Vec<u8>> {
    if bytes > MAX_PCCC_PAYLOAD {
        return Err(Status::Err(ERR_TOO_LARGE));
    }
    let mut body = Frame::new();
    put_slc_address(&mut body, bytes, addr);
    Ok(pccc_cmd(tns, FUNC_TYPED_READ, &body.into_vec()))
}

/// SLC protected typed logical write
pub(crate) fn slc_write(tns: u16, addr: &FileAddress, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_PCCC_PAYLOAD {
        return Err(Status::Err(ERR_TOO_LARGE));
    }
    let mut body = Frame::new();
    put_slc_address(&mut body, data.len(), addr);
    body.bytes(data);
    Ok(pccc_cmd(tns, FUNC_TYPED_WRITE, &body.into_vec()))
}

/// SLC protected typed read-modify-write of one 16-bit word
pub(crate) fn slc_rmw(tns: u16, addr: &FileAddress, and_mask: u16, or_mask: u16) -> Result<Vec<u8>> {
    let mut body = Frame::new();
    put_slc_address(&mut body, 2, addr);
    body.u16(and_mask).u16(or_mask);
    Ok(pccc_cmd(tns, FUNC_TYPED_RMW, &body.into_vec()))
}

/// PLC/5 word range read; `bytes` must be an even word count
pub(crate) fn plc5_read(tns: u16, addr: &FileAddress, bytes: usize) -> Result<Vec<u8>> {
    if bytes > MAX_PCCC_PAYLOAD {
        return Err(Status::Err(ERR_TOO_LARGE));
    }
    let words = (bytes + 1) / 2;
    let mut body = Frame::new();
    body.u16(0); // packed offset
    body.u16(words as u16);
    put_plc5_address(&mut body, addr);
    body.u8(bytes as u8);
    Ok(pccc_cmd(tns, FUNC_WORD_RANGE_READ, &body.into_vec()))
}

/// PLC/5 word range write
pub(crate) fn plc5_write(tns: u16, addr: &FileAddress, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_PCCC_PAYLOAD {
        return Err(Status::Err(ERR_TOO_LARGE));
    }
    let words = (data.len() + 1) / 2;
    let mut body = Frame::new();
    body.u16(0);
    body.u16(words as u16);
    put_plc5_address(&mut body, addr);
    body.bytes(data);
    Ok(pccc_cmd(tns, FUNC_WORD_RANGE_WRITE, &body.into_vec()))
}

/// wrap a raw PCCC command in the CIP execute service with our requestor id
pub(crate) fn execute(pccc: &[u8]) -> Result<Vec<u8>> {
    let mut data = Frame::with_capacity(7 + pccc.len());
    data.u8(0x07) // requestor id length, including this byte
        .u16(cip::VENDOR_ID)
        .u32(cip::ORIG_SERIAL)
        .bytes(pccc);
    cip::mr_request(
        cip::SERVICE_PCCC_EXECUTE,
        &cip::PCCC_OBJECT_PATH,
        &data.into_vec(),
    )
}

/// prefix a raw PCCC command with the DH+ link header used on connected
/// frames routed across a DH+ bridge
pub(crate) fn dhp_wrap(dest_node: u16, pccc: &[u8]) -> Vec<u8> {
    let mut f = Frame::with_capacity(4 + pccc.len());
    f.u8(dest_node as u8).u8(0).u8(0).u8(0).bytes(pccc);
    f.into_vec()
}

/// decoded PCCC response
#[derive(Debug, Clone, Copy)]
pub(crate) struct PcccReply<'a> {
    pub tns: u16,
    pub data: &'a [u8],
}

fn parse_cmd_reply<'a>(r: &mut Reader<'a>) -> Result<PcccReply<'a>> {
    let cmd = r.u8()?;
    if cmd & CMD_REPLY_MASK == 0 {
        return Err(Status::Err(ERR_BAD_REPLY));
    }
    let sts = r.u8()?;
    let tns = r.u16()?;
    if sts != 0 {
        let extended = if sts == STS_EXTENDED { r.u8()? as u16 } else { 0 };
        return Err(Status::Plc(sts, extended));
    }
    Ok(PcccReply { tns, data: r.rest() })
}

/// unpack the payload of a CIP execute reply: requestor id echo, then the
/// PCCC response
pub(crate) fn parse_execute_reply<'a>(reply: &Reply<'a>) -> Result<PcccReply<'a>> {
    reply.status().into_result()?;
    let mut r = Reader::new(reply.data);
    let id_len = r.u8()? as usize;
    if id_len < 1 {
        return Err(Status::Err(ERR_BAD_REPLY));
    }
    r.skip(id_len - 1)?;
    parse_cmd_reply(&mut r)
}

/// unpack a connected DH+ frame: link header, then the PCCC response
pub(crate) fn parse_dhp_reply(data: &[u8]) -> Result<PcccReply<'_>> {
    let mut r = Reader::new(data);
    r.skip(4)?;
    parse_cmd_reply(&mut r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer_file() {
        let addr = parse_address("N7:0").unwrap();
        assert_eq!(addr.file_type, 0x89);
        assert_eq!(addr.file_num, 7);
        assert_eq!(addr.elem, 0);
        assert_eq!(addr.bit, None);
        assert_eq!(addr.ascii, "N7:0");
    }

    #[test]
    fn test_parse_float_file() {
        let addr = parse_address("F8:10").unwrap();
        assert_eq!(addr.file_type, 0x8A);
        assert_eq!(addr.file_num, 8);
        assert_eq!(addr.elem, 10);
    }

    #[test]
    fn test_parse_bit_suffix() {
        let addr = parse_address("B3:4/2").unwrap();
        assert_eq!(addr.file_type, 0x85);
        assert_eq!(addr.elem, 4);
        assert_eq!(addr.bit, Some(2));
    }

    #[test]
    fn test_default_file_numbers() {
        assert_eq!(parse_address("I:0").unwrap().file_num, 1);
        assert_eq!(parse_address("O:2").unwrap().file_num, 0);
        assert_eq!(parse_address("n:12").unwrap().ascii, "N7:12");
    }

    #[test]
    fn test_bad_addresses() {
        for name in ["", "7:0", "Q4:0", "N7", "N7:", "N7:0/16", "N7:0x", "ST:0"] {
            let err = parse_address(name).unwrap_err();
            assert_eq!(i32::from(err), ERR_BAD_PARAM, "address {:?}", name);
        }
    }

    #[test]
    fn test_slc_read_frame() {
        let addr = parse_address("N7:0").unwrap();
        let req = slc_read(0x1234, &addr, 2).unwrap();
        assert_eq!(
            req,
            vec![0x0F, 0x00, 0x34, 0x12, 0xA2, 0x02, 0x07, 0x89, 0x00, 0x00]
        );
    }

    #[test]
    fn test_slc_wide_fields() {
        let addr = parse_address("N255:400").unwrap();
        let req = slc_read(0, &addr, 2).unwrap();
        // file number and element both need the 0xFF escape
        assert_eq!(
            &req[5..],
            &[0x02, 0xFF, 0xFF, 0x00, 0x89, 0xFF, 0x90, 0x01, 0x00]
        );
    }

    #[test]
    fn test_slc_rmw_frame() {
        let addr = parse_address("B3:0").unwrap();
        let req = slc_rmw(0, &addr, 0xFFFF, 0x0004).unwrap();
        assert_eq!(
            &req[5..],
            &[0x02, 0x03, 0x85, 0x00, 0x00, 0xFF, 0xFF, 0x04, 0x00]
        );
    }

    #[test]
    fn test_plc5_read_frame() {
        let addr = parse_address("F8:10").unwrap();
        let req = plc5_read(0x0001, &addr, 4).unwrap();
        let mut expect = vec![0x0F, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x00, 0x00, b'$'];
        expect.extend_from_slice(b"F8:10");
        expect.push(0x00);
        expect.push(4);
        assert_eq!(req, expect);
    }

    #[test]
    fn test_execute_wrapping() {
        let addr = parse_address("N7:0").unwrap();
        let pccc = slc_read(7, &addr, 2).unwrap();
        let req = execute(&pccc).unwrap();
        assert_eq!(req[0], cip::SERVICE_PCCC_EXECUTE);
        assert_eq!(req[1], 2);
        assert_eq!(&req[2..6], &cip::PCCC_OBJECT_PATH);
        assert_eq!(req[6], 0x07);
        assert_eq!(&req[13..], pccc.as_slice());
    }

    #[test]
    fn test_reply_parse() {
        // id echo + cmd reply + two data bytes
        let bytes = [0x07, 0x3D, 0xF3, 0x55, 0x2A, 0x55, 0x2A, 0x4F, 0x00, 0x34, 0x12, 0x2A, 0x00];
        let reply = Reply {
            service: cip::SERVICE_PCCC_EXECUTE | cip::REPLY_MASK,
            general: 0,
            extended: 0,
            data: &bytes,
        };
        let pccc = parse_execute_reply(&reply).unwrap();
        assert_eq!(pccc.tns, 0x1234);
        assert_eq!(pccc.data, &[0x2A, 0x00]);
    }

    #[test]
    fn test_reply_fault() {
        let bytes = [0x07, 0x3D, 0xF3, 0x55, 0x2A, 0x55, 0x2A, 0x4F, 0x10, 0x34, 0x12];
        let reply = Reply {
            service: cip::SERVICE_PCCC_EXECUTE | cip::REPLY_MASK,
            general: 0,
            extended: 0,
            data: &bytes,
        };
        let err = parse_execute_reply(&reply).unwrap_err();
        assert_eq!(err, Status::Plc(0x10, 0));
    }

    #[test]
    fn test_dhp_round_trip() {
        let addr = parse_address("N7:0").unwrap();
        let pccc = slc_read(9, &addr, 2).unwrap();
        let framed = dhp_wrap(5, &pccc);
        assert_eq!(&framed[..4], &[5, 0, 0, 0]);
        let reply_bytes = [5u8, 0, 0, 0, 0x4F, 0x00, 0x09, 0x00, 0xAA, 0xBB];
        let reply = parse_dhp_reply(&reply_bytes).unwrap();
        assert_eq!(reply.tns, 9);
        assert_eq!(reply.data, &[0xAA, 0xBB]);
    }
}
