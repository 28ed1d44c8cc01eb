// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

//! EtherNet/IP encapsulation codec
//!
//! Frames are a fixed 24-byte header followed by a command-specific body.
//! All integers are little-endian. Request/reply payloads ride inside
//! Common Packet Format (CPF) item lists.

use crate::status::{Status, ERR_BAD_REPLY, ERR_TOO_SMALL};
use crate::Result;
use byteorder::{ByteOrder, LittleEndian};

/// well-known ENIP TCP port
pub(crate) const ENIP_PORT: u16 = 44818;
/// encapsulation header length
pub(crate) const HEADER_LEN: usize = 24;
/// largest body we will accept before declaring the stream corrupt
pub(crate) const MAX_BODY: usize = 64 * 1024;

pub(crate) const CMD_REGISTER_SESSION: u16 = 0x0065;
pub(crate) const CMD_UNREGISTER_SESSION: u16 = 0x0066;
pub(crate) const CMD_SEND_RR_DATA: u16 = 0x006F;
pub(crate) const CMD_SEND_UNIT_DATA: u16 = 0x0070;

const CPF_NULL_ADDR: u16 = 0x0000;
const CPF_CONNECTED_ADDR: u16 = 0x00A1;
const CPF_CONNECTED_DATA: u16 = 0x00B1;
const CPF_UNCONNECTED_DATA: u16 = 0x00B2;

const ENIP_PROTOCOL_VERSION: u16 = 1;
/// seconds the target may spend on an unconnected request
const UCMM_TIMEOUT_SECS: u16 = 5;

/// little-endian frame builder
#[derive(Debug, Default)]
pub(crate) struct Frame {
    buf: Vec<u8>,
}

impl Frame {
    pub fn new() -> Self {
        Frame { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Frame {
            buf: Vec::with_capacity(cap),
        }
    }

    #[inline]
    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    #[inline]
    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    #[inline]
    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    #[inline]
    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    #[inline]
    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }

    #[inline]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

/// little-endian bounds-checked reader
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    #[inline]
    pub fn left(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    #[inline]
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.left() < n {
            return Err(Status::Err(ERR_TOO_SMALL));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    #[inline]
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    #[inline]
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    #[inline]
    pub fn u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    #[inline]
    pub fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    #[inline]
    pub fn u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }
}

/// parsed encapsulation header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub command: u16,
    pub length: u16,
    pub session: u32,
    pub status: u32,
    pub context: u64,
    pub options: u32,
}

impl Header {
    pub fn parse(buf: &[u8]) -> Result<Header> {
        let mut r = Reader::new(buf);
        Ok(Header {
            command: r.u16()?,
            length: r.u16()?,
            session: r.u32()?,
            status: r.u32()?,
            context: r.u64()?,
            options: r.u32()?,
        })
    }
}

fn header(frame: &mut Frame, command: u16, body_len: usize, session: u32, context: u64) {
    frame
        .u16(command)
        .u16(body_len as u16)
        .u32(session)
        .u32(0) // status, always 0 on requests
        .u64(context)
        .u32(0); // options
}

/// register session request; session handle and context are zero
pub(crate) fn register_session() -> Vec<u8> {
    let mut f = Frame::with_capacity(HEADER_LEN + 4);
    header(&mut f, CMD_REGISTER_SESSION, 4, 0, 0);
    f.u16(ENIP_PROTOCOL_VERSION).u16(0);
    f.into_vec()
}

/// unregister session request; no reply is expected
pub(crate) fn unregister_session(session: u32) -> Vec<u8> {
    let mut f = Frame::with_capacity(HEADER_LEN);
    header(&mut f, CMD_UNREGISTER_SESSION, 0, session, 0);
    f.into_vec()
}

/// wrap an unconnected CIP request in SendRRData
pub(crate) fn send_rr_data(session: u32, context: u64, cip: &[u8]) -> Vec<u8> {
    let body_len = 6 + 2 + 4 + 4 + cip.len();
    let mut f = Frame::with_capacity(HEADER_LEN + body_len);
    header(&mut f, CMD_SEND_RR_DATA, body_len, session, context);
    f.u32(0) // interface handle: CIP
        .u16(UCMM_TIMEOUT_SECS)
        .u16(2) // CPF item count
        .u16(CPF_NULL_ADDR)
        .u16(0)
        .u16(CPF_UNCONNECTED_DATA)
        .u16(cip.len() as u16)
        .bytes(cip);
    f.into_vec()
}

/// wrap a connected CIP request in SendUnitData, tagged with the connection
/// id and a 16-bit connection sequence number
pub(crate) fn send_unit_data(session: u32, conn_id: u32, seq: u16, cip: &[u8]) -> Vec<u8> {
    let body_len = 6 + 2 + 8 + 4 + 2 + cip.len();
    let mut f = Frame::with_capacity(HEADER_LEN + body_len);
    header(&mut f, CMD_SEND_UNIT_DATA, body_len, session, 0);
    f.u32(0)
        .u16(0) // timeout is unused for connected data
        .u16(2)
        .u16(CPF_CONNECTED_ADDR)
        .u16(4)
        .u32(conn_id)
        .u16(CPF_CONNECTED_DATA)
        .u16((cip.len() + 2) as u16)
        .u16(seq)
        .bytes(cip);
    f.into_vec()
}

/// unpack a SendRRData reply body down to the CIP reply bytes
pub(crate) fn parse_rr_body(body: &[u8]) -> Result<&[u8]> {
    let mut r = Reader::new(body);
    r.skip(4)?; // interface handle
    r.skip(2)?; // timeout echo
    let count = r.u16()?;
    if count < 2 {
        return Err(Status::Err(ERR_BAD_REPLY));
    }
    let addr_type = r.u16()?;
    let addr_len = r.u16()? as usize;
    if addr_type != CPF_NULL_ADDR {
        return Err(Status::Err(ERR_BAD_REPLY));
    }
    r.skip(addr_len)?;
    let data_type = r.u16()?;
    let data_len = r.u16()? as usize;
    if data_type != CPF_UNCONNECTED_DATA {
        return Err(Status::Err(ERR_BAD_REPLY));
    }
    r.take(data_len)
}

/// unpack a SendUnitData reply body into (connection id, sequence, CIP bytes)
pub(crate) fn parse_unit_body(body: &[u8]) -> Result<(u32, u16, &[u8])> {
    let mut r = Reader::new(body);
    r.skip(4)?;
    r.skip(2)?;
    let count = r.u16()?;
    if count < 2 {
        return Err(Status::Err(ERR_BAD_REPLY));
    }
    let addr_type = r.u16()?;
    let addr_len = r.u16()? as usize;
    if addr_type != CPF_CONNECTED_ADDR || addr_len != 4 {
        return Err(Status::Err(ERR_BAD_REPLY));
    }
    let conn_id = r.u32()?;
    let data_type = r.u16()?;
    let data_len = r.u16()? as usize;
    if data_type != CPF_CONNECTED_DATA || data_len < 2 {
        return Err(Status::Err(ERR_BAD_REPLY));
    }
    let item = r.take(data_len)?;
    let mut ir = Reader::new(item);
    let seq = ir.u16()?;
    Ok((conn_id, seq, ir.rest()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_session_frame() {
        let frame = register_session();
        assert_eq!(frame.len(), HEADER_LEN + 4);
        let hdr = Header::parse(&frame).unwrap();
        assert_eq!(hdr.command, CMD_REGISTER_SESSION);
        assert_eq!(hdr.length, 4);
        assert_eq!(hdr.session, 0);
        assert_eq!(&frame[HEADER_LEN..], &[0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_rr_data_round_trip() {
        let cip = [0x4C, 0x02, 0x20, 0x02, 0x24, 0x01, 0x01, 0x00];
        let frame = send_rr_data(0x11223344, 0xAABB, &cip);
        let hdr = Header::parse(&frame).unwrap();
        assert_eq!(hdr.command, CMD_SEND_RR_DATA);
        assert_eq!(hdr.session, 0x11223344);
        assert_eq!(hdr.context, 0xAABB);
        assert_eq!(hdr.length as usize, frame.len() - HEADER_LEN);
        let body = &frame[HEADER_LEN..];
        let echoed = parse_rr_body(body).unwrap();
        assert_eq!(echoed, &cip);
    }

    #[test]
    fn test_unit_data_round_trip() {
        let cip = [0x4C, 0x03, 0x91, 0x03, b'T', b'a', b'g', 0x00, 0x01, 0x00];
        let frame = send_unit_data(0x55, 0xCAFEF00D, 0x0102, &cip);
        let hdr = Header::parse(&frame).unwrap();
        assert_eq!(hdr.command, CMD_SEND_UNIT_DATA);
        assert_eq!(hdr.length as usize, frame.len() - HEADER_LEN);
        let (conn, seq, echoed) = parse_unit_body(&frame[HEADER_LEN..]).unwrap();
        assert_eq!(conn, 0xCAFEF00D);
        assert_eq!(seq, 0x0102);
        assert_eq!(echoed, &cip);
    }

    #[test]
    fn test_reader_bounds() {
        let mut r = Reader::new(&[1, 2, 3]);
        assert_eq!(r.u16().unwrap(), 0x0201);
        assert!(r.u16().is_err());
        assert_eq!(r.u8().unwrap(), 3);
        assert_eq!(r.left(), 0);
    }

    #[test]
    fn test_truncated_body_rejected() {
        let cip = [0x4C, 0x00];
        let frame = send_rr_data(1, 2, &cip);
        let body = &frame[HEADER_LEN..];
        assert!(parse_rr_body(&body[..body.len() - 1]).is_err());
    }
}
