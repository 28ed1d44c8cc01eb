// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

//! the tag runtime
//!
//! Every tag is a little state machine driven by its session worker:
//!
//! ```text
//! INIT ---(session ready)---> READY
//! READY --read()--> READ_PENDING --(reply)--> READY
//! READY --write()--> WRITE_PENDING --(reply)--> READY
//! any ----destroy()----> DESTROYED
//! ```
//!
//! At most one operation is outstanding per tag. Fragmented transfers and
//! the type-priming read that precedes a first write are sub-steps of the
//! one pending operation; the user-visible status stays `Pending` until the
//! last sub-step completes.

use crate::attr;
use crate::cip::{self, name::EncodedName, path, Reply};
use crate::enip::{Frame, Reader};
use crate::event::{self, Event};
use crate::handle;
use crate::pccc::{self, FileAddress};
use crate::plc::PlcKind;
use crate::session::{self, Request, RequestKind, Session, SessionKey};
use crate::status::{
    Status, ERR_ABORT, ERR_BAD_PARAM, ERR_BAD_REPLY, ERR_BUSY, ERR_NOT_FOUND, ERR_TIMEOUT,
    ERR_TOO_LARGE, ERR_UNSUPPORTED,
};
use crate::Result;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// bound for operations started without an explicit timeout
pub(crate) const DEFAULT_OP_TIMEOUT_MS: u32 = 5000;
/// payloads above this write in fragments
const FRAG_WRITE_THRESHOLD: usize = 450;
/// bytes of payload per write fragment
const FRAG_CHUNK: usize = 400;
/// hard cap on a tag payload
const MAX_PAYLOAD: usize = 1 << 20;
/// CIP type marker for structured tags; two more type bytes follow
const TYPE_IS_STRUCT: u16 = 0x02A0;

/// tag protocol states
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum TagState {
    Init,
    Ready,
    ReadPending,
    WritePending,
    Aborted,
    Destroyed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum OpKind {
    Ready,
    Read,
    Write,
}

impl OpKind {
    fn event(self) -> Event {
        match self {
            OpKind::Ready => Event::Created,
            OpKind::Read => Event::ReadCompleted,
            OpKind::Write => Event::WriteCompleted,
        }
    }
}

#[derive(Debug)]
struct Pending {
    kind: OpKind,
    token: u64,
    timeout_ms: u32,
    /// next byte offset: read accumulation point or bytes already written
    offset: usize,
    /// reassembled read data across fragments
    accum: Vec<u8>,
    /// sub-step: learning the tag type before the first write
    priming: bool,
    /// write is running as a fragment series
    fragmented: bool,
}

struct Cell {
    state: TagState,
    last: Status,
    pending: Option<Pending>,
}

/// the shared tag object behind a handle
pub(crate) struct TagCore {
    id: i32,
    plc: PlcKind,
    elem_size: usize,
    elem_count: usize,
    encoded_name: Option<EncodedName>,
    file_addr: Option<FileAddress>,
    bit: Option<u16>,
    dhp_dest: Option<u16>,
    session: Arc<Session>,
    payload: Mutex<Vec<u8>>,
    /// raw CIP type bytes captured from the first read, replayed on writes
    type_info: Mutex<Vec<u8>>,
    cell: Mutex<Cell>,
    cond: Condvar,
}

fn deadline_of(timeout_ms: u32) -> Instant {
    let ms = if timeout_ms == 0 {
        DEFAULT_OP_TIMEOUT_MS
    } else {
        timeout_ms
    };
    Instant::now() + Duration::from_millis(u64::from(ms))
}

/// create a tag from its attribute string; returns the new handle.
///
/// With `timeout_ms > 0` this blocks until the tag is ready (or fails and is
/// torn down again); with 0 it returns immediately and the caller polls.
pub(crate) fn create(attrs: &str, timeout_ms: u32) -> Result<i32> {
    crate::debug::debug_level(); // pick up ABTAG_DEBUG on first use
    let opts = attr::parse(attrs)?;
    let payload_size = opts
        .elem_size
        .checked_mul(opts.elem_count)
        .filter(|n| *n > 0 && *n <= MAX_PAYLOAD)
        .ok_or(Status::Err(ERR_TOO_LARGE))?;

    let (conn_path, dhp_dest) =
        path::encode_connection_path(&opts.path, opts.use_connected_msg, opts.plc)?;
    // DH+ bridges only speak connected messaging
    let connected = opts.use_connected_msg || dhp_dest.is_some();

    let mut encoded_name = None;
    let mut file_addr = None;
    let bit;
    if opts.plc.is_pccc() {
        let addr = pccc::parse_address(&opts.name)?;
        bit = addr.bit.map(u16::from);
        if let Some(b) = bit {
            if usize::from(b) >= opts.elem_size * 8 {
                log::warn!("tag {:?}: bit outside the element", opts.name);
                return Err(Status::Err(ERR_BAD_PARAM));
            }
        }
        file_addr = Some(addr);
    } else {
        let name = cip::name::encode_tag_name(&opts.name, payload_size)?;
        bit = name.bit;
        encoded_name = Some(name);
    }

    let key = SessionKey {
        gateway: opts.gateway.clone(),
        path: conn_path,
        plc: opts.plc,
        connected,
        instance: if opts.share_session {
            0
        } else {
            session::private_instance()
        },
    };

    let id = handle::insert_with(|id| {
        let session = session::get_or_create(key.clone())?;
        Ok(Arc::new(TagCore {
            id,
            plc: opts.plc,
            elem_size: opts.elem_size,
            elem_count: opts.elem_count,
            encoded_name: encoded_name.clone(),
            file_addr: file_addr.clone(),
            bit,
            dhp_dest,
            session,
            payload: Mutex::new(vec![0; payload_size]),
            type_info: Mutex::new(Vec::new()),
            cell: Mutex::new(Cell {
                state: TagState::Init,
                last: Status::Pending,
                pending: None,
            }),
            cond: Condvar::new(),
        }))
    })?;

    let tag = match handle::lookup(id) {
        Some(tag) => tag,
        None => return Err(Status::Err(ERR_NOT_FOUND)),
    };
    if let Err(status) = tag.start_ready(timeout_ms) {
        destroy(id);
        return Err(status);
    }
    log::debug!("tag {}: created for {:?}", id, opts.name);

    if timeout_ms > 0 {
        let status = tag.wait_done(timeout_ms);
        if !status.is_ok() {
            destroy(id);
            return Err(status);
        }
    }
    Ok(id)
}

/// drop the handle; pending work is aborted and memory is reclaimed once the
/// last borrow is released. Destroying twice reports `ERR_NOT_FOUND`.
pub(crate) fn destroy(id: i32) -> Status {
    match handle::remove(id) {
        Some(tag) => {
            tag.shutdown();
            Status::Ok
        }
        None => Status::Err(ERR_NOT_FOUND),
    }
}

impl TagCore {
    // ---- identity ------------------------------------------------------

    pub(crate) fn elem_size(&self) -> usize {
        self.elem_size
    }

    pub(crate) fn elem_count(&self) -> usize {
        self.elem_count
    }

    pub(crate) fn bit_index(&self) -> Option<u16> {
        self.bit
    }

    pub(crate) fn size(&self) -> usize {
        self.payload.lock().len()
    }

    pub(crate) fn with_payload<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.payload.lock())
    }

    pub(crate) fn with_payload_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.payload.lock())
    }

    fn is_dhp(&self) -> bool {
        self.dhp_dest.is_some()
    }

    fn tns_of(token: u64) -> u16 {
        (token & 0xFFFF) as u16
    }

    // ---- public operations --------------------------------------------

    /// poll the status of the last/current operation; never blocks
    pub(crate) fn status(&self) -> Status {
        let cell = self.cell.lock();
        if cell.state == TagState::Destroyed {
            return Status::Err(ERR_NOT_FOUND);
        }
        cell.last
    }

    pub(crate) fn read(&self, timeout_ms: u32) -> Status {
        let token = self.session.next_token();
        {
            let mut cell = self.cell.lock();
            if let Some(status) = Self::op_guard(&cell) {
                return status;
            }
            cell.pending = Some(Pending {
                kind: OpKind::Read,
                token,
                timeout_ms,
                offset: 0,
                accum: Vec::new(),
                priming: false,
                fragmented: false,
            });
            cell.state = TagState::ReadPending;
            cell.last = Status::Pending;
        }
        let submitted = self
            .build_read_request(token, 0, timeout_ms)
            .and_then(|req| self.session.submit(req));
        if let Err(status) = submitted {
            self.finish(token, status);
            return status;
        }
        if timeout_ms == 0 {
            return Status::Pending;
        }
        self.wait_done(timeout_ms)
    }

    pub(crate) fn write(&self, timeout_ms: u32) -> Status {
        if self.plc == PlcKind::Plc5 && self.bit.is_some() {
            // no read-modify-write function in the word-range set
            return Status::Err(ERR_UNSUPPORTED);
        }
        let token = self.session.next_token();
        let priming = {
            let mut cell = self.cell.lock();
            if let Some(status) = Self::op_guard(&cell) {
                return status;
            }
            // a CIP write must carry the tag type; learn it with one read
            let priming = !self.plc.is_pccc()
                && self.bit.is_none()
                && self.type_info.lock().is_empty();
            let fragmented = !self.plc.is_pccc()
                && self.bit.is_none()
                && self.size() > FRAG_WRITE_THRESHOLD;
            cell.pending = Some(Pending {
                kind: OpKind::Write,
                token,
                timeout_ms,
                offset: 0,
                accum: Vec::new(),
                priming,
                fragmented,
            });
            cell.state = TagState::WritePending;
            cell.last = Status::Pending;
            priming
        };
        let submitted = if priming {
            self.build_prime_request(token, timeout_ms)
                .and_then(|req| self.session.submit(req))
        } else {
            self.build_write_request(token, 0, timeout_ms)
                .and_then(|(req, next_offset)| {
                    if let Some(pending) = self.cell.lock().pending.as_mut() {
                        pending.offset = next_offset;
                    }
                    self.session.submit(req)
                })
        };
        if let Err(status) = submitted {
            self.finish(token, status);
            return status;
        }
        if timeout_ms == 0 {
            return Status::Pending;
        }
        self.wait_done(timeout_ms)
    }

    /// cancel the pending operation, if any
    pub(crate) fn abort(&self) -> Result<()> {
        let mut cell = self.cell.lock();
        if let Some(pending) = cell.pending.take() {
            self.session.cancel(pending.token);
            cell.last = Status::Err(ERR_ABORT);
            if cell.state != TagState::Destroyed {
                cell.state = TagState::Aborted;
            }
            self.cond.notify_all();
            drop(cell);
            event::emit(self.id, Event::Aborted, Status::Err(ERR_ABORT));
        }
        Ok(())
    }

    /// destruction path shared by `destroy` and the global shutdown
    pub(crate) fn shutdown(&self) {
        {
            let mut cell = self.cell.lock();
            if let Some(pending) = cell.pending.take() {
                self.session.cancel(pending.token);
                cell.last = Status::Err(ERR_ABORT);
            }
            cell.state = TagState::Destroyed;
            self.cond.notify_all();
        }
        event::emit(self.id, Event::Destroyed, Status::Ok);
        event::forget(self.id);
        log::debug!("tag {}: destroyed", self.id);
    }

    // ---- blocking helpers ---------------------------------------------

    fn op_guard(cell: &Cell) -> Option<Status> {
        match cell.state {
            TagState::Destroyed => Some(Status::Err(ERR_NOT_FOUND)),
            _ if cell.pending.is_some() => Some(Status::Err(ERR_BUSY)),
            TagState::ReadPending | TagState::WritePending => Some(Status::Err(ERR_BUSY)),
            TagState::Init => Some(Status::Err(ERR_BUSY)),
            TagState::Ready | TagState::Aborted => None,
        }
    }

    fn start_ready(&self, timeout_ms: u32) -> Result<()> {
        let token = self.session.next_token();
        {
            let mut cell = self.cell.lock();
            cell.pending = Some(Pending {
                kind: OpKind::Ready,
                token,
                timeout_ms,
                offset: 0,
                accum: Vec::new(),
                priming: false,
                fragmented: false,
            });
            cell.state = TagState::Init;
            cell.last = Status::Pending;
        }
        self.session.submit(Request {
            handle: self.id,
            token,
            kind: RequestKind::Ready,
            cip: Vec::new(),
            deadline: deadline_of(timeout_ms),
        })
    }

    /// wait until the pending operation resolves, bounded by `timeout_ms`
    fn wait_done(&self, timeout_ms: u32) -> Status {
        let deadline = Instant::now() + Duration::from_millis(u64::from(timeout_ms));
        let mut cell = self.cell.lock();
        while cell.pending.is_some() {
            if self.cond.wait_until(&mut cell, deadline).timed_out() {
                if let Some(pending) = cell.pending.take() {
                    self.session.cancel(pending.token);
                    cell.last = Status::Err(ERR_TIMEOUT);
                    if cell.state != TagState::Destroyed {
                        cell.state = TagState::Ready;
                    }
                    let kind = pending.kind;
                    drop(cell);
                    event::emit(self.id, kind.event(), Status::Err(ERR_TIMEOUT));
                }
                return Status::Err(ERR_TIMEOUT);
            }
        }
        cell.last
    }

    /// resolve the pending op `token` with `status`
    fn finish(&self, token: u64, status: Status) {
        let cell = self.cell.lock();
        self.finish_locked(cell, token, status);
    }

    fn finish_locked(&self, mut cell: MutexGuard<'_, Cell>, token: u64, status: Status) {
        let pending = match cell.pending.take() {
            Some(p) if p.token == token => p,
            other => {
                // stale completion (already timed out, aborted or replaced)
                cell.pending = other;
                return;
            }
        };
        cell.last = status;
        if cell.state != TagState::Destroyed {
            cell.state = TagState::Ready;
        }
        self.cond.notify_all();
        drop(cell);
        event::emit(self.id, pending.kind.event(), status);
    }

    // ---- completion path (called from the session worker) --------------

    /// deliver the response (or failure) for request `token`
    pub(crate) fn on_reply(&self, token: u64, result: std::result::Result<Vec<u8>, Status>) {
        let cell = self.cell.lock();
        let current = match cell.pending.as_ref() {
            Some(p) if p.token == token => p,
            _ => {
                log::debug!("tag {}: stale reply for token {}", self.id, token);
                return;
            }
        };
        let kind = current.kind;
        let priming = current.priming;
        match result {
            Err(status) => self.finish_locked(cell, token, status),
            Ok(bytes) => match kind {
                OpKind::Ready => self.finish_locked(cell, token, Status::Ok),
                OpKind::Read => self.on_read_reply(cell, token, &bytes),
                OpKind::Write if priming => self.on_prime_reply(cell, token, &bytes),
                OpKind::Write => self.on_write_reply(cell, token, &bytes),
            },
        }
    }

    fn on_read_reply(&self, mut cell: MutexGuard<'_, Cell>, token: u64, bytes: &[u8]) {
        let parsed = if self.plc.is_pccc() {
            self.parse_pccc_data(token, bytes).map(|d| (false, d))
        } else {
            self.parse_cip_read(bytes)
        };
        let (partial, data) = match parsed {
            Ok(v) => v,
            Err(status) => return self.finish_locked(cell, token, status),
        };

        let pending = match cell.pending.as_mut() {
            Some(p) => p,
            None => return,
        };
        pending.accum.extend_from_slice(data);

        if partial {
            pending.offset = pending.accum.len();
            let new_token = self.session.next_token();
            pending.token = new_token;
            let timeout_ms = pending.timeout_ms;
            let offset = pending.offset;
            let submitted = self
                .build_read_request(new_token, offset, timeout_ms)
                .and_then(|req| self.session.submit(req));
            if let Err(status) = submitted {
                self.finish_locked(cell, new_token, status);
            }
            return;
        }

        let accum = std::mem::take(&mut pending.accum);
        {
            let mut payload = self.payload.lock();
            let n = accum.len().min(payload.len());
            payload[..n].copy_from_slice(&accum[..n]);
            if accum.len() != payload.len() {
                log::debug!(
                    "tag {}: read returned {} bytes for a {} byte payload",
                    self.id,
                    accum.len(),
                    payload.len()
                );
            }
        }
        self.finish_locked(cell, token, Status::Ok);
    }

    fn on_prime_reply(&self, mut cell: MutexGuard<'_, Cell>, token: u64, bytes: &[u8]) {
        // the priming read only exists to capture the type bytes
        if let Err(status) = self.parse_cip_read(bytes) {
            return self.finish_locked(cell, token, status);
        }
        let (new_token, timeout_ms) = {
            let pending = match cell.pending.as_mut() {
                Some(p) => p,
                None => return,
            };
            pending.priming = false;
            pending.offset = 0;
            let new_token = self.session.next_token();
            pending.token = new_token;
            (new_token, pending.timeout_ms)
        };
        match self.build_write_request(new_token, 0, timeout_ms) {
            Ok((req, next_offset)) => {
                if let Some(pending) = cell.pending.as_mut() {
                    pending.offset = next_offset;
                }
                if let Err(status) = self.session.submit(req) {
                    self.finish_locked(cell, new_token, status);
                }
            }
            Err(status) => self.finish_locked(cell, new_token, status),
        }
    }

    fn on_write_reply(&self, mut cell: MutexGuard<'_, Cell>, token: u64, bytes: &[u8]) {
        let status = if self.plc.is_pccc() {
            self.parse_pccc_data(token, bytes).map(|_| ())
        } else {
            self.parse_cip_write(bytes)
        };
        if let Err(status) = status {
            return self.finish_locked(cell, token, status);
        }

        let total = self.size();
        let next = {
            let pending = match cell.pending.as_mut() {
                Some(p) => p,
                None => return,
            };
            if pending.fragmented && pending.offset < total {
                let new_token = self.session.next_token();
                pending.token = new_token;
                Some((new_token, pending.offset, pending.timeout_ms))
            } else {
                None
            }
        };
        match next {
            Some((new_token, offset, timeout_ms)) => {
                match self.build_write_request(new_token, offset, timeout_ms) {
                    Ok((req, next_offset)) => {
                        if let Some(pending) = cell.pending.as_mut() {
                            pending.offset = next_offset;
                        }
                        if let Err(status) = self.session.submit(req) {
                            self.finish_locked(cell, new_token, status);
                        }
                    }
                    Err(status) => self.finish_locked(cell, new_token, status),
                }
            }
            None => self.finish_locked(cell, token, Status::Ok),
        }
    }

    // ---- request builders ----------------------------------------------

    fn ioi(&self) -> Result<&EncodedName> {
        self.encoded_name
            .as_ref()
            .ok_or(Status::Err(ERR_UNSUPPORTED))
    }

    fn addr(&self) -> Result<&FileAddress> {
        self.file_addr.as_ref().ok_or(Status::Err(ERR_UNSUPPORTED))
    }

    fn wire_request(&self, token: u64, timeout_ms: u32, cip: Vec<u8>) -> Request {
        Request {
            handle: self.id,
            token,
            kind: RequestKind::Wire,
            cip,
            deadline: deadline_of(timeout_ms),
        }
    }

    fn build_read_request(&self, token: u64, offset: usize, timeout_ms: u32) -> Result<Request> {
        let cip_bytes = if self.plc.is_pccc() {
            let addr = self.addr()?;
            let tns = Self::tns_of(token);
            let raw = if self.plc == PlcKind::Plc5 {
                pccc::plc5_read(tns, addr, self.size())?
            } else {
                pccc::slc_read(tns, addr, self.size())?
            };
            if self.is_dhp() {
                pccc::dhp_wrap(self.dhp_dest.unwrap_or(0), &raw)
            } else {
                pccc::execute(&raw)?
            }
        } else {
            let name = self.ioi()?;
            let mut data = Frame::new();
            data.u16(self.elem_count as u16);
            if offset == 0 {
                cip::mr_request(cip::SERVICE_READ_TAG, name.path(), &data.into_vec())?
            } else {
                data.u32(offset as u32);
                cip::mr_request(cip::SERVICE_READ_TAG_FRAG, name.path(), &data.into_vec())?
            }
        };
        Ok(self.wire_request(token, timeout_ms, cip_bytes))
    }

    fn build_prime_request(&self, token: u64, timeout_ms: u32) -> Result<Request> {
        let name = self.ioi()?;
        let mut data = Frame::new();
        data.u16(1);
        let cip_bytes = cip::mr_request(cip::SERVICE_READ_TAG, name.path(), &data.into_vec())?;
        Ok(self.wire_request(token, timeout_ms, cip_bytes))
    }

    /// build the next write request; returns it together with the payload
    /// offset the operation will have covered once this request is answered
    fn build_write_request(
        &self,
        token: u64,
        offset: usize,
        timeout_ms: u32,
    ) -> Result<(Request, usize)> {
        if self.plc.is_pccc() {
            let addr = self.addr()?;
            let tns = Self::tns_of(token);
            let raw = if let Some(bit) = self.bit {
                let set = self.with_payload(|p| {
                    let byte = usize::from(bit) / 8;
                    byte < p.len() && p[byte] & (1 << (bit % 8)) != 0
                });
                let mask = 1u16 << (bit % 16);
                let (and_mask, or_mask) = if set { (0xFFFF, mask) } else { (!mask, 0) };
                pccc::slc_rmw(tns, addr, and_mask, or_mask)?
            } else {
                let data = self.with_payload(|p| p.to_vec());
                if self.plc == PlcKind::Plc5 {
                    pccc::plc5_write(tns, addr, &data)?
                } else {
                    pccc::slc_write(tns, addr, &data)?
                }
            };
            let cip_bytes = if self.is_dhp() {
                pccc::dhp_wrap(self.dhp_dest.unwrap_or(0), &raw)
            } else {
                pccc::execute(&raw)?
            };
            let total = self.size();
            return Ok((self.wire_request(token, timeout_ms, cip_bytes), total));
        }

        let name = self.ioi()?;
        if let Some(bit) = self.bit {
            // single bit writes use the masked read-modify-write service
            if !matches!(self.elem_size, 1 | 2 | 4 | 8) || usize::from(bit) >= self.elem_size * 8 {
                return Err(Status::Err(ERR_UNSUPPORTED));
            }
            let set = self.with_payload(|p| {
                let byte = usize::from(bit) / 8;
                byte < p.len() && p[byte] & (1 << (bit % 8)) != 0
            });
            let mut or_mask = vec![0u8; self.elem_size];
            let mut and_mask = vec![0xFFu8; self.elem_size];
            let byte = usize::from(bit) / 8;
            if set {
                or_mask[byte] |= 1 << (bit % 8);
            } else {
                and_mask[byte] &= !(1 << (bit % 8));
            }
            let mut data = Frame::new();
            data.u16(self.elem_size as u16);
            data.bytes(&or_mask).bytes(&and_mask);
            let cip_bytes = cip::mr_request(cip::SERVICE_RMW_TAG, name.path(), &data.into_vec())?;
            let total = self.size();
            return Ok((self.wire_request(token, timeout_ms, cip_bytes), total));
        }

        let type_bytes = self.type_info.lock().clone();
        if type_bytes.is_empty() {
            return Err(Status::Err(ERR_BAD_REPLY));
        }
        let mut data = Frame::new();
        data.bytes(&type_bytes);
        data.u16(self.elem_count as u16);
        let total = self.size();
        if total > FRAG_WRITE_THRESHOLD {
            let chunk = self.with_payload(|p| {
                let start = offset.min(p.len());
                let end = (start + FRAG_CHUNK).min(p.len());
                p[start..end].to_vec()
            });
            data.u32(offset as u32);
            let covered = offset + chunk.len();
            data.bytes(&chunk);
            let req = cip::mr_request(cip::SERVICE_WRITE_TAG_FRAG, name.path(), &data.into_vec())?;
            Ok((self.wire_request(token, timeout_ms, req), covered))
        } else {
            let payload = self.with_payload(|p| p.to_vec());
            data.bytes(&payload);
            let req = cip::mr_request(cip::SERVICE_WRITE_TAG, name.path(), &data.into_vec())?;
            Ok((self.wire_request(token, timeout_ms, req), total))
        }
    }

    // ---- reply parsers -------------------------------------------------

    /// decode a CIP read (or fragmented read) reply, stash the type bytes,
    /// and return (more-fragments, data)
    fn parse_cip_read<'a>(&self, bytes: &'a [u8]) -> Result<(bool, &'a [u8])> {
        let reply = Reply::parse(bytes)?;
        if !reply.answers(cip::SERVICE_READ_TAG) && !reply.answers(cip::SERVICE_READ_TAG_FRAG) {
            return Err(Status::Err(ERR_BAD_REPLY));
        }
        let partial = match reply.general {
            cip::GEN_STATUS_OK => false,
            cip::GEN_STATUS_PARTIAL => true,
            _ => return Err(Status::Plc(reply.general, reply.extended)),
        };
        let mut r = Reader::new(reply.data);
        let ty = r.u16()?;
        let mut type_bytes = ty.to_le_bytes().to_vec();
        if ty == TYPE_IS_STRUCT {
            type_bytes.extend_from_slice(&r.u16()?.to_le_bytes());
        }
        *self.type_info.lock() = type_bytes;
        Ok((partial, r.rest()))
    }

    fn parse_cip_write(&self, bytes: &[u8]) -> Result<()> {
        let reply = Reply::parse(bytes)?;
        let expected = if self.bit.is_some() {
            reply.answers(cip::SERVICE_RMW_TAG)
        } else {
            reply.answers(cip::SERVICE_WRITE_TAG) || reply.answers(cip::SERVICE_WRITE_TAG_FRAG)
        };
        if !expected {
            return Err(Status::Err(ERR_BAD_REPLY));
        }
        reply.status().into_result()
    }

    fn parse_pccc_data<'a>(&self, token: u64, bytes: &'a [u8]) -> Result<&'a [u8]> {
        let reply = if self.is_dhp() {
            pccc::parse_dhp_reply(bytes)?
        } else {
            let mr = cip::checked_reply(bytes, cip::SERVICE_PCCC_EXECUTE)?;
            pccc::parse_execute_reply(&mr)?
        };
        if reply.tns != Self::tns_of(token) {
            log::warn!(
                "tag {}: PCCC transaction mismatch ({} != {})",
                self.id,
                reply.tns,
                Self::tns_of(token)
            );
            return Err(Status::Err(ERR_BAD_REPLY));
        }
        Ok(reply.data)
    }
}
