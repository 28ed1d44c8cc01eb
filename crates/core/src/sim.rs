// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

//! an in-process ENIP/CIP device simulator
//!
//! A tiny stand-in for a PLC, listening on a loopback port: register
//! session, forward open/close, symbolic read/write (plain, fragmented and
//! masked), and PCCC typed read/write behind the passthrough object. The
//! test-suite drives the client against it; frames are parsed here byte by
//! byte, independently of the client codec, so encode bugs cannot cancel
//! out.
//!
//! Hidden from the public docs; semantics are deliberately minimal.

#![allow(missing_docs)]

use byteorder::{ByteOrder, LittleEndian};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// simulator tuning knobs
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// artificial delay before answering tag data services
    pub reply_delay: Duration,
    /// largest read reply chunk; smaller payloads than the tag force
    /// fragmented reads
    pub read_chunk: usize,
}

impl Default for SimOptions {
    fn default() -> Self {
        SimOptions {
            reply_delay: Duration::ZERO,
            read_chunk: usize::MAX,
        }
    }
}

#[derive(Debug, Clone)]
struct TagSlot {
    type_code: u16,
    data: Vec<u8>,
}

#[derive(Default)]
struct Store {
    /// symbolic tags keyed by dotted name
    tags: HashMap<String, TagSlot>,
    /// PCCC data files keyed by (file type, file number)
    files: HashMap<(u8, u16), Vec<u8>>,
}

struct Shared {
    opts: SimOptions,
    store: Mutex<Store>,
    stop: AtomicBool,
    next_conn_id: AtomicU32,
}

/// handle to a running simulator; shuts down on drop
pub struct Simulator {
    shared: Arc<Shared>,
    port: u16,
}

impl Simulator {
    pub fn start() -> Simulator {
        Self::start_with(SimOptions::default())
    }

    pub fn start_with(opts: SimOptions) -> Simulator {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let port = listener.local_addr().expect("local addr").port();
        let shared = Arc::new(Shared {
            opts,
            store: Mutex::new(Store::default()),
            stop: AtomicBool::new(false),
            next_conn_id: AtomicU32::new(0x3333_0001),
        });
        {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    if shared.stop.load(Ordering::Relaxed) {
                        break;
                    }
                    match stream {
                        Ok(sock) => {
                            let shared = Arc::clone(&shared);
                            std::thread::spawn(move || serve(shared, sock));
                        }
                        Err(_) => break,
                    }
                }
            });
        }
        Simulator { shared, port }
    }

    /// gateway string for tag attribute strings
    pub fn gateway(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// install or replace a symbolic tag
    pub fn set_tag(&self, name: &str, type_code: u16, data: Vec<u8>) {
        self.shared.store.lock().tags.insert(
            name.to_owned(),
            TagSlot {
                type_code,
                data,
            },
        );
    }

    /// current bytes of a symbolic tag
    pub fn tag_bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.shared
            .store
            .lock()
            .tags
            .get(name)
            .map(|slot| slot.data.clone())
    }

    /// install or replace a PCCC data file, e.g. (0x89, 7) for N7
    pub fn set_data_file(&self, file_type: u8, file_num: u16, data: Vec<u8>) {
        self.shared
            .store
            .lock()
            .files
            .insert((file_type, file_num), data);
    }

    pub fn data_file(&self, file_type: u8, file_num: u16) -> Option<Vec<u8>> {
        self.shared
            .store
            .lock()
            .files
            .get(&(file_type, file_num))
            .cloned()
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        // poke the accept loop awake
        let _ = TcpStream::connect(("127.0.0.1", self.port));
    }
}

// ---- per-connection state ----------------------------------------------

struct Conn {
    shared: Arc<Shared>,
    session: u32,
    /// connection pair from forward open: (ours, the client's)
    conn: Option<(u32, u32)>,
}

fn serve(shared: Arc<Shared>, mut sock: TcpStream) {
    let _ = sock.set_nodelay(true);
    let mut conn = Conn {
        shared,
        session: 0,
        conn: None,
    };
    loop {
        if conn.shared.stop.load(Ordering::Relaxed) {
            return;
        }
        let mut header = [0u8; 24];
        if sock.read_exact(&mut header).is_err() {
            return;
        }
        let command = LittleEndian::read_u16(&header[0..2]);
        let length = LittleEndian::read_u16(&header[2..4]) as usize;
        let context = LittleEndian::read_u64(&header[12..20]);
        let mut body = vec![0u8; length];
        if sock.read_exact(&mut body).is_err() {
            return;
        }
        let reply = match command {
            0x0065 => {
                conn.session = 0x1111_2222;
                Some(frame(0x0065, conn.session, context, &[1, 0, 0, 0]))
            }
            0x0066 => return,
            0x006F => conn.on_rr_data(context, &body),
            0x0070 => conn.on_unit_data(&body),
            _ => None,
        };
        if let Some(reply) = reply {
            if sock.write_all(&reply).is_err() {
                return;
            }
        }
    }
}

fn frame(command: u16, session: u32, context: u64, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(24 + body.len());
    out.extend_from_slice(&command.to_le_bytes());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(&session.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&context.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(body);
    out
}

fn mr_error(service: u8, general: u8, extended: Option<u16>) -> Vec<u8> {
    let mut out = vec![service | 0x80, 0, general, 0];
    if let Some(ext) = extended {
        out[3] = 1;
        out.extend_from_slice(&ext.to_le_bytes());
    }
    out
}

fn mr_ok(service: u8, data: &[u8]) -> Vec<u8> {
    let mut out = vec![service | 0x80, 0, 0, 0];
    out.extend_from_slice(data);
    out
}

impl Conn {
    fn on_rr_data(&mut self, context: u64, body: &[u8]) -> Option<Vec<u8>> {
        // interface handle(4) + timeout(2) + item count(2) + null item(4)
        // + data item type(2) + len(2)
        if body.len() < 16 {
            return None;
        }
        let count = LittleEndian::read_u16(&body[6..8]);
        if count < 2 {
            return None;
        }
        let data_len = LittleEndian::read_u16(&body[14..16]) as usize;
        let cip = &body[16..16 + data_len.min(body.len() - 16)];
        let reply_cip = self.on_cip(cip);
        let mut out = Vec::with_capacity(16 + reply_cip.len());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&[0, 0, 0, 0]); // null address item
        out.extend_from_slice(&0x00B2u16.to_le_bytes());
        out.extend_from_slice(&(reply_cip.len() as u16).to_le_bytes());
        out.extend_from_slice(&reply_cip);
        Some(frame(0x006F, self.session, context, &out))
    }

    fn on_unit_data(&mut self, body: &[u8]) -> Option<Vec<u8>> {
        // interface handle(4) + timeout(2) + count(2) + addr item(4+4)
        // + data item type(2) + len(2) + seq(2)
        if body.len() < 22 {
            return None;
        }
        let data_len = LittleEndian::read_u16(&body[18..20]) as usize;
        if data_len < 2 {
            return None;
        }
        let seq = LittleEndian::read_u16(&body[20..22]);
        let cip = &body[22..20 + data_len.min(body.len() - 20)];
        let reply_cip = self.on_cip(cip);
        let (_, their_id) = self.conn.unwrap_or((0, 0));
        let mut out = Vec::with_capacity(24 + reply_cip.len());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&0x00A1u16.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&their_id.to_le_bytes());
        out.extend_from_slice(&0x00B1u16.to_le_bytes());
        out.extend_from_slice(&((reply_cip.len() + 2) as u16).to_le_bytes());
        out.extend_from_slice(&seq.to_le_bytes());
        out.extend_from_slice(&reply_cip);
        Some(frame(0x0070, self.session, 0, &out))
    }

    /// handle one message router request and produce the reply bytes
    fn on_cip(&mut self, cip: &[u8]) -> Vec<u8> {
        if cip.len() < 2 {
            return mr_error(0, 0x05, None);
        }
        let service = cip[0];
        let path_words = cip[1] as usize;
        let path_end = 2 + path_words * 2;
        if cip.len() < path_end {
            return mr_error(service, 0x05, None);
        }
        let path = &cip[2..path_end];
        let data = &cip[path_end..];

        match (service, path) {
            (0x52, [0x20, 0x06, 0x24, 0x01]) => {
                // unconnected send: unwrap and handle the embedded request
                if data.len() < 4 {
                    return mr_error(service, 0x05, None);
                }
                let emb_len = LittleEndian::read_u16(&data[2..4]) as usize;
                if data.len() < 4 + emb_len {
                    return mr_error(service, 0x05, None);
                }
                let embedded = data[4..4 + emb_len].to_vec();
                self.on_cip(&embedded)
            }
            (0x54, [0x20, 0x06, 0x24, 0x01]) => self.on_forward_open(data),
            (0x4E, [0x20, 0x06, 0x24, 0x01]) => mr_ok(0x4E, &[0u8; 10]),
            (0x4B, [0x20, 0x67, 0x24, 0x01]) => self.on_pccc(data),
            (0x4C, _) | (0x52, _) => self.on_read(service, path, data),
            (0x4D, _) | (0x53, _) => self.on_write(service, path, data),
            (0x4E, _) => self.on_rmw(path, data),
            _ => mr_error(service, 0x08, None), // unsupported service
        }
    }

    fn on_forward_open(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() < 10 {
            return mr_error(0x54, 0x05, None);
        }
        let their_id = LittleEndian::read_u32(&data[6..10]);
        let our_id = self.shared.next_conn_id.fetch_add(1, Ordering::Relaxed);
        self.conn = Some((our_id, their_id));
        let mut out = Vec::new();
        out.extend_from_slice(&our_id.to_le_bytes()); // O->T
        out.extend_from_slice(&their_id.to_le_bytes()); // T->O
        out.extend_from_slice(&data[10..14.min(data.len())]); // serial + vendor echo
        out.extend_from_slice(&[0u8; 14]);
        mr_ok(0x54, &out)
    }

    fn delay(&self) {
        let delay = self.shared.opts.reply_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    fn on_read(&mut self, service: u8, path: &[u8], data: &[u8]) -> Vec<u8> {
        self.delay();
        let name = match decode_ioi(path) {
            Some(name) => name,
            None => return mr_error(service, 0x04, None),
        };
        let offset = if service == 0x52 {
            if data.len() < 6 {
                return mr_error(service, 0x05, None);
            }
            LittleEndian::read_u32(&data[2..6]) as usize
        } else {
            0
        };
        let store = self.shared.store.lock();
        let slot = match store.tags.get(&name) {
            Some(slot) => slot,
            None => return mr_error(service, 0x04, Some(0x0000)),
        };
        if offset > slot.data.len() {
            return mr_error(service, 0xFF, Some(0x2105));
        }
        let rest = &slot.data[offset..];
        let chunk = rest.len().min(self.shared.opts.read_chunk);
        let mut out = Vec::with_capacity(2 + chunk);
        out.extend_from_slice(&slot.type_code.to_le_bytes());
        out.extend_from_slice(&rest[..chunk]);
        if chunk < rest.len() {
            let mut reply = mr_error(service, 0x06, None);
            reply.extend_from_slice(&out);
            reply
        } else {
            mr_ok(service, &out)
        }
    }

    fn on_write(&mut self, service: u8, path: &[u8], data: &[u8]) -> Vec<u8> {
        self.delay();
        let name = match decode_ioi(path) {
            Some(name) => name,
            None => return mr_error(service, 0x04, None),
        };
        if data.len() < 4 {
            return mr_error(service, 0x05, None);
        }
        let type_code = LittleEndian::read_u16(&data[0..2]);
        let (offset, payload) = if service == 0x53 {
            if data.len() < 8 {
                return mr_error(service, 0x05, None);
            }
            (LittleEndian::read_u32(&data[4..8]) as usize, &data[8..])
        } else {
            (0, &data[4..])
        };
        let mut store = self.shared.store.lock();
        let slot = match store.tags.get_mut(&name) {
            Some(slot) => slot,
            None => return mr_error(service, 0x04, Some(0x0000)),
        };
        if type_code != slot.type_code {
            return mr_error(service, 0xFF, Some(0x2107));
        }
        if offset + payload.len() > slot.data.len() {
            return mr_error(service, 0xFF, Some(0x2105));
        }
        slot.data[offset..offset + payload.len()].copy_from_slice(payload);
        mr_ok(service, &[])
    }

    fn on_rmw(&mut self, path: &[u8], data: &[u8]) -> Vec<u8> {
        self.delay();
        let name = match decode_ioi(path) {
            Some(name) => name,
            None => return mr_error(0x4E, 0x04, None),
        };
        if data.len() < 2 {
            return mr_error(0x4E, 0x05, None);
        }
        let mask_size = LittleEndian::read_u16(&data[0..2]) as usize;
        if data.len() < 2 + mask_size * 2 {
            return mr_error(0x4E, 0x05, None);
        }
        let or_mask = &data[2..2 + mask_size];
        let and_mask = &data[2 + mask_size..2 + mask_size * 2];
        let mut store = self.shared.store.lock();
        let slot = match store.tags.get_mut(&name) {
            Some(slot) => slot,
            None => return mr_error(0x4E, 0x04, Some(0x0000)),
        };
        for i in 0..mask_size.min(slot.data.len()) {
            slot.data[i] = (slot.data[i] & and_mask[i]) | or_mask[i];
        }
        mr_ok(0x4E, &[])
    }

    fn on_pccc(&mut self, data: &[u8]) -> Vec<u8> {
        self.delay();
        // requestor id (len byte + vendor + serial), then cmd/sts/tns/func
        if data.len() < 1 {
            return mr_error(0x4B, 0x05, None);
        }
        let id_len = data[0] as usize;
        if data.len() < id_len + 5 {
            return mr_error(0x4B, 0x05, None);
        }
        let id_echo = &data[..id_len];
        let pccc = &data[id_len..];
        let tns = LittleEndian::read_u16(&pccc[2..4]);
        let func = pccc[4];
        let body = &pccc[5..];

        let mut reply_data = Vec::new();
        let sts: u8 = match func {
            // protected typed logical read
            0xA2 if body.len() >= 5 => {
                let bytes = body[0] as usize;
                let (file_num, rest) = take_addr_field(&body[1..]);
                let file_type = rest[0];
                let (elem, _) = take_addr_field(&rest[1..]);
                let store = self.shared.store.lock();
                match store.files.get(&(file_type, file_num)) {
                    Some(file) => {
                        let elem_size = pccc_elem_size(file_type);
                        let off = elem as usize * elem_size;
                        if off + bytes <= file.len() {
                            reply_data.extend_from_slice(&file[off..off + bytes]);
                            0
                        } else {
                            0x10
                        }
                    }
                    None => 0x10,
                }
            }
            // protected typed logical write
            0xAA if body.len() >= 5 => {
                let bytes = body[0] as usize;
                let (file_num, rest) = take_addr_field(&body[1..]);
                let file_type = rest[0];
                let (elem, rest) = take_addr_field(&rest[1..]);
                let (_sub, rest) = take_addr_field(rest);
                let mut store = self.shared.store.lock();
                match store.files.get_mut(&(file_type, file_num)) {
                    Some(file) => {
                        let elem_size = pccc_elem_size(file_type);
                        let off = elem as usize * elem_size;
                        if off + bytes <= file.len() && rest.len() >= bytes {
                            file[off..off + bytes].copy_from_slice(&rest[..bytes]);
                            0
                        } else {
                            0x10
                        }
                    }
                    None => 0x10,
                }
            }
            // protected typed logical read-modify-write of one word
            0xAB if body.len() >= 5 => {
                let (file_num, rest) = take_addr_field(&body[1..]);
                let file_type = rest[0];
                let (elem, rest) = take_addr_field(&rest[1..]);
                let (_sub, rest) = take_addr_field(rest);
                let mut store = self.shared.store.lock();
                match store.files.get_mut(&(file_type, file_num)) {
                    Some(file) if rest.len() >= 4 => {
                        let off = elem as usize * pccc_elem_size(file_type);
                        if off + 2 <= file.len() {
                            let and_mask = LittleEndian::read_u16(&rest[0..2]);
                            let or_mask = LittleEndian::read_u16(&rest[2..4]);
                            let word = LittleEndian::read_u16(&file[off..off + 2]);
                            let word = (word & and_mask) | or_mask;
                            file[off..off + 2].copy_from_slice(&word.to_le_bytes());
                            0
                        } else {
                            0x10
                        }
                    }
                    _ => 0x10,
                }
            }
            _ => 0x10, // illegal command or format
        };

        let mut out = Vec::new();
        out.extend_from_slice(id_echo);
        out.push(pccc[0] | 0x40);
        out.push(sts);
        out.extend_from_slice(&tns.to_le_bytes());
        out.extend_from_slice(&reply_data);
        mr_ok(0x4B, &out)
    }
}

/// SLC address field: one byte, or 0xFF + u16
fn take_addr_field(buf: &[u8]) -> (u16, &[u8]) {
    if buf.is_empty() {
        return (0, buf);
    }
    if buf[0] == 0xFF && buf.len() >= 3 {
        (LittleEndian::read_u16(&buf[1..3]), &buf[3..])
    } else {
        (u16::from(buf[0]), &buf[1..])
    }
}

fn pccc_elem_size(file_type: u8) -> usize {
    match file_type {
        0x8A => 4, // float
        0x91 => 4, // long
        0x86 | 0x87 | 0x88 => 6,
        _ => 2,
    }
}

/// turn an IOI request path back into a dotted tag name (indices appended as
/// `[i,j]`); used to key the tag store
fn decode_ioi(path: &[u8]) -> Option<String> {
    let mut out = String::new();
    let mut i = 0;
    let mut indices: Vec<u32> = Vec::new();
    while i < path.len() {
        match path[i] {
            0x91 => {
                let len = *path.get(i + 1)? as usize;
                let seg = path.get(i + 2..i + 2 + len)?;
                if !out.is_empty() && indices.is_empty() {
                    out.push('.');
                }
                out.push_str(std::str::from_utf8(seg).ok()?);
                i += 2 + len + (len & 1);
            }
            0x28 => {
                indices.push(u32::from(*path.get(i + 1)?));
                i += 2;
            }
            0x29 => {
                indices.push(u32::from(LittleEndian::read_u16(path.get(i + 2..i + 4)?)));
                i += 4;
            }
            0x2A => {
                indices.push(LittleEndian::read_u32(path.get(i + 2..i + 6)?));
                i += 6;
            }
            _ => return None,
        }
    }
    if !indices.is_empty() {
        out.push('[');
        let parts: Vec<String> = indices.iter().map(|v| v.to_string()).collect();
        out.push_str(&parts.join(","));
        out.push(']');
    }
    Some(out)
}
