// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

//! CIP message framing: message-router requests and replies, unconnected
//! send wrapping, and the forward open/close connection services

pub(crate) mod name;
pub(crate) mod path;

use crate::enip::{Frame, Reader};
use crate::status::{Status, ERR_BAD_REPLY, ERR_ENCODE};
use crate::Result;

/// read tag service
pub(crate) const SERVICE_READ_TAG: u8 = 0x4C;
/// read tag fragmented service
pub(crate) const SERVICE_READ_TAG_FRAG: u8 = 0x52;
/// write tag service
pub(crate) const SERVICE_WRITE_TAG: u8 = 0x4D;
/// write tag fragmented service
pub(crate) const SERVICE_WRITE_TAG_FRAG: u8 = 0x53;
/// read-modify-write tag service (bit masking)
pub(crate) const SERVICE_RMW_TAG: u8 = 0x4E;
/// PCCC execute service on the PCCC object
pub(crate) const SERVICE_PCCC_EXECUTE: u8 = 0x4B;
/// unconnected send service on the connection manager
pub(crate) const SERVICE_UNCONNECTED_SEND: u8 = 0x52;
/// forward open service
pub(crate) const SERVICE_FORWARD_OPEN: u8 = 0x54;
/// forward close service
pub(crate) const SERVICE_FORWARD_CLOSE: u8 = 0x4E;

/// set on the service byte of every reply
pub(crate) const REPLY_MASK: u8 = 0x80;

/// general status: success
pub(crate) const GEN_STATUS_OK: u8 = 0x00;
/// general status: partial data, issue another fragment
pub(crate) const GEN_STATUS_PARTIAL: u8 = 0x06;

/// message router object, class 2 instance 1
pub(crate) const MESSAGE_ROUTER_PATH: [u8; 4] = [0x20, 0x02, 0x24, 0x01];
/// connection manager object, class 6 instance 1
pub(crate) const CONNECTION_MANAGER_PATH: [u8; 4] = [0x20, 0x06, 0x24, 0x01];
/// PCCC passthrough object, class 0x67 instance 1
pub(crate) const PCCC_OBJECT_PATH: [u8; 4] = [0x20, 0x67, 0x24, 0x01];

/// originator vendor id used in forward opens and PCCC requestor ids
pub(crate) const VENDOR_ID: u16 = 0xF33D;
/// originator serial number, constant per the library instance
pub(crate) const ORIG_SERIAL: u32 = 0x2A55_2A55;

const SECS_PER_TICK: u8 = 0x0A;
const TIMEOUT_TICKS: u8 = 0x05;
/// point-to-point, low priority, variable size, 500 byte connection
const CONN_PARAMS: u16 = 0x43F4;
/// requested packet interval, microseconds
const CONN_RPI_US: u32 = 1_000_000;
/// class 3, application trigger, server transport
const TRANSPORT_CLASS: u8 = 0xA3;

/// build a message router request: service, path size in words, path, data
pub(crate) fn mr_request(service: u8, req_path: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if req_path.len() & 0x01 != 0 || req_path.len() / 2 > 0xFF {
        return Err(Status::Err(ERR_ENCODE));
    }
    let mut f = Frame::with_capacity(2 + req_path.len() + data.len());
    f.u8(service)
        .u8((req_path.len() / 2) as u8)
        .bytes(req_path)
        .bytes(data);
    Ok(f.into_vec())
}

/// wrap a message router request in an unconnected send so the gateway
/// forwards it along `route`
pub(crate) fn unconnected_send(embedded: &[u8], route: &[u8]) -> Result<Vec<u8>> {
    if route.is_empty() || route.len() & 0x01 != 0 || route.len() / 2 > 0xFF {
        return Err(Status::Err(ERR_ENCODE));
    }
    let mut f = Frame::with_capacity(12 + embedded.len() + route.len());
    f.u8(SERVICE_UNCONNECTED_SEND)
        .u8((CONNECTION_MANAGER_PATH.len() / 2) as u8)
        .bytes(&CONNECTION_MANAGER_PATH)
        .u8(SECS_PER_TICK)
        .u8(TIMEOUT_TICKS)
        .u16(embedded.len() as u16)
        .bytes(embedded);
    if embedded.len() & 0x01 != 0 {
        f.u8(0);
    }
    f.u8((route.len() / 2) as u8).u8(0).bytes(route);
    Ok(f.into_vec())
}

/// build a forward open request establishing a class-3 connection pair
pub(crate) fn forward_open(t_o_conn_id: u32, conn_serial: u16, conn_path: &[u8]) -> Result<Vec<u8>> {
    if conn_path.is_empty() || conn_path.len() & 0x01 != 0 || conn_path.len() / 2 > 0xFF {
        return Err(Status::Err(ERR_ENCODE));
    }
    let mut f = Frame::with_capacity(36 + conn_path.len());
    f.u8(SECS_PER_TICK)
        .u8(TIMEOUT_TICKS)
        .u32(0) // O->T connection id, assigned by the target
        .u32(t_o_conn_id)
        .u16(conn_serial)
        .u16(VENDOR_ID)
        .u32(ORIG_SERIAL)
        .u8(0x01) // timeout multiplier x4
        .bytes(&[0, 0, 0]) // reserved
        .u32(CONN_RPI_US)
        .u16(CONN_PARAMS)
        .u32(CONN_RPI_US)
        .u16(CONN_PARAMS)
        .u8(TRANSPORT_CLASS)
        .u8((conn_path.len() / 2) as u8)
        .bytes(conn_path);
    mr_request(SERVICE_FORWARD_OPEN, &CONNECTION_MANAGER_PATH, &f.into_vec())
}

/// connection ids returned by a successful forward open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConnectionIds {
    /// originator to target: tags outgoing SendUnitData frames
    pub o_t: u32,
    /// target to originator: tags incoming SendUnitData frames
    pub t_o: u32,
}

/// pull the connection id pair out of a forward open reply payload
pub(crate) fn parse_forward_open_reply(data: &[u8]) -> Result<ConnectionIds> {
    let mut r = Reader::new(data);
    let o_t = r.u32()?;
    let t_o = r.u32()?;
    // serial, vendor, originator serial and the API echoes follow; nothing
    // in them changes how the connection is used
    Ok(ConnectionIds { o_t, t_o })
}

/// build a forward close request for the connection identified at open time
pub(crate) fn forward_close(conn_serial: u16, conn_path: &[u8]) -> Result<Vec<u8>> {
    if conn_path.is_empty() || conn_path.len() & 0x01 != 0 || conn_path.len() / 2 > 0xFF {
        return Err(Status::Err(ERR_ENCODE));
    }
    let mut f = Frame::with_capacity(12 + conn_path.len());
    f.u8(SECS_PER_TICK)
        .u8(TIMEOUT_TICKS)
        .u16(conn_serial)
        .u16(VENDOR_ID)
        .u32(ORIG_SERIAL)
        .u8((conn_path.len() / 2) as u8)
        .u8(0) // reserved
        .bytes(conn_path);
    mr_request(SERVICE_FORWARD_CLOSE, &CONNECTION_MANAGER_PATH, &f.into_vec())
}

/// a decoded message router reply
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reply<'a> {
    /// reply service byte, i.e. request service | [`REPLY_MASK`]
    pub service: u8,
    /// CIP general status
    pub general: u8,
    /// first extended status word, 0 when absent
    pub extended: u16,
    /// service payload after the status words
    pub data: &'a [u8],
}

impl<'a> Reply<'a> {
    /// split a raw message router reply into status and payload
    pub fn parse(bytes: &'a [u8]) -> Result<Reply<'a>> {
        let mut r = Reader::new(bytes);
        let service = r.u8()?;
        r.skip(1)?; // reserved
        let general = r.u8()?;
        let ext_words = r.u8()? as usize;
        let mut extended = 0;
        for i in 0..ext_words {
            let word = r.u16()?;
            if i == 0 {
                extended = word;
            }
        }
        Ok(Reply {
            service,
            general,
            extended,
            data: r.rest(),
        })
    }

    /// the reply as a [`Status`]: Ok, or the verbatim PLC fault
    pub fn status(&self) -> Status {
        if self.general == GEN_STATUS_OK {
            Status::Ok
        } else {
            Status::Plc(self.general, self.extended)
        }
    }

    /// true when the reply answers `service`
    pub fn answers(&self, service: u8) -> bool {
        self.service == service | REPLY_MASK
    }
}

/// reject replies that do not even carry the right service echo
pub(crate) fn checked_reply<'a>(bytes: &'a [u8], service: u8) -> Result<Reply<'a>> {
    let reply = Reply::parse(bytes)?;
    if !reply.answers(service) {
        log::warn!(
            "reply service {:#04x} does not answer request {:#04x}",
            reply.service,
            service
        );
        return Err(Status::Err(ERR_BAD_REPLY));
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mr_request_shape() {
        let req = mr_request(SERVICE_READ_TAG, &[0x91, 0x02, b'h', b'i'], &[0x01, 0x00]).unwrap();
        assert_eq!(req, vec![0x4C, 0x02, 0x91, 0x02, b'h', b'i', 0x01, 0x00]);
    }

    #[test]
    fn test_mr_request_odd_path_rejected() {
        assert!(mr_request(SERVICE_READ_TAG, &[0x91], &[]).is_err());
    }

    #[test]
    fn test_unconnected_send_pads_odd_payload() {
        let embedded = [0x4C, 0x01, 0x20, 0x02, 0x24]; // odd length on purpose
        let route = [0x01, 0x00];
        let req = unconnected_send(&embedded, &route).unwrap();
        assert_eq!(req[0], SERVICE_UNCONNECTED_SEND);
        assert_eq!(req[1], 2);
        assert_eq!(&req[2..6], &CONNECTION_MANAGER_PATH);
        // embedded length precedes the payload
        assert_eq!(u16::from_le_bytes([req[8], req[9]]) as usize, embedded.len());
        // pad byte, then route size, reserved, route
        let tail = &req[10 + embedded.len()..];
        assert_eq!(tail, &[0x00, 0x01, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn test_forward_open_reply() {
        let data = [
            0x78, 0x56, 0x34, 0x12, // O->T
            0x21, 0x43, 0x65, 0x87, // T->O
            0x01, 0x00, 0x3D, 0xF3, // serial, vendor
        ];
        let ids = parse_forward_open_reply(&data).unwrap();
        assert_eq!(ids.o_t, 0x12345678);
        assert_eq!(ids.t_o, 0x87654321);
    }

    #[test]
    fn test_reply_parse() {
        let bytes = [0xCC, 0x00, 0x00, 0x00, 0xC3, 0x00, 0x2A, 0x00];
        let reply = checked_reply(&bytes, SERVICE_READ_TAG).unwrap();
        assert_eq!(reply.general, GEN_STATUS_OK);
        assert!(reply.status().is_ok());
        assert_eq!(reply.data, &[0xC3, 0x00, 0x2A, 0x00]);
    }

    #[test]
    fn test_reply_extended_status() {
        let bytes = [0xCC, 0x00, 0xFF, 0x01, 0x05, 0x21];
        let reply = Reply::parse(&bytes).unwrap();
        assert_eq!(reply.general, 0xFF);
        assert_eq!(reply.extended, 0x2105);
        assert_eq!(reply.status(), Status::Plc(0xFF, 0x2105));
    }

    #[test]
    fn test_reply_service_mismatch() {
        let bytes = [0xCD, 0x00, 0x00, 0x00];
        assert!(checked_reply(&bytes, SERVICE_READ_TAG).is_err());
    }

    #[test]
    fn test_forward_open_frame() {
        let path = [0x01, 0x00, 0x20, 0x02, 0x24, 0x01];
        let req = forward_open(0xAABBCCDD, 0x1234, &path).unwrap();
        assert_eq!(req[0], SERVICE_FORWARD_OPEN);
        assert_eq!(req[1], 2);
        assert_eq!(&req[2..6], &CONNECTION_MANAGER_PATH);
        // connection path size in words sits right before the path
        let tail = &req[req.len() - path.len() - 1..];
        assert_eq!(tail[0] as usize, path.len() / 2);
        assert_eq!(&tail[1..], &path);
    }
}
