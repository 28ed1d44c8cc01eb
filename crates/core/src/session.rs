// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

//! ENIP session management
//!
//! Tags with the same (gateway, route, family, connected-mode) share one
//! session: one TCP connection, one registered ENIP session handle, and for
//! connected mode one CIP connection pair. A dedicated worker thread per
//! session pumps the socket and the request queue; replies are matched back
//! to requests by sender context (unconnected) or connection sequence number
//! (connected) and dispatched through the handle table, so a tag destroyed
//! mid-flight simply drops its reply.

use crate::cip::{self, ConnectionIds};
use crate::enip::{self, Header, ENIP_PORT, HEADER_LEN, MAX_BODY};
use crate::handle;
use crate::plc::PlcKind;
use crate::status::{
    Status, ERR_ABORT, ERR_BAD_CONNECTION, ERR_BAD_GATEWAY, ERR_BAD_REPLY, ERR_TIMEOUT,
};
use crate::Result;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{mpsc, Arc, Weak};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SETUP_REPLY_TIMEOUT: Duration = Duration::from_millis(2500);
const IO_POLL: Duration = Duration::from_millis(20);
const IDLE_POLL: Duration = Duration::from_millis(50);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);
const TEARDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// session lifecycle, mostly diagnostic; tags observe it indirectly through
/// the completion of their readiness requests
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum SessionState {
    Disconnected,
    Connecting,
    Registered,
    Opened,
    ShuttingDown,
    Failed,
}

/// what a queued request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestKind {
    /// completes as soon as the session is usable; carries no wire bytes
    Ready,
    /// a CIP payload to put on the wire
    Wire,
}

/// a unit of work queued on a session
#[derive(Debug)]
pub(crate) struct Request {
    pub handle: i32,
    pub token: u64,
    pub kind: RequestKind,
    pub cip: Vec<u8>,
    pub deadline: Instant,
}

enum Msg {
    Submit(Request),
    Cancel(u64),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SessionKey {
    pub gateway: String,
    pub path: Vec<u8>,
    pub plc: PlcKind,
    pub connected: bool,
    /// 0 for shared sessions; unique per tag when session sharing is off
    pub instance: u32,
}

struct Shared {
    state: Mutex<SessionState>,
    next_token: AtomicU64,
}

/// one multiplexed connection to a gateway
pub(crate) struct Session {
    key: SessionKey,
    tx: Mutex<Sender<Msg>>,
    shared: Arc<Shared>,
}

impl Session {
    /// allocate a request token, unique within this session's lifetime
    pub fn next_token(&self) -> u64 {
        self.shared.next_token.fetch_add(1, Ordering::Relaxed)
    }

    /// queue a request on the worker
    pub fn submit(&self, req: Request) -> Result<()> {
        self.tx
            .lock()
            .send(Msg::Submit(req))
            .map_err(|_| Status::Err(ERR_BAD_CONNECTION))
    }

    /// tell the worker a request no longer has an interested tag
    pub fn cancel(&self, token: u64) {
        let _ = self.tx.lock().send(Msg::Cancel(token));
    }

    #[allow(dead_code)]
    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // last referencing tag went away; the worker tears the wire down
        let _ = self.tx.lock().send(Msg::Shutdown);
        let mut registry = REGISTRY.lock();
        if let Some(weak) = registry.get(&self.key) {
            // only drop our own entry; a replacement session may already
            // have taken the key
            if weak.upgrade().is_none() {
                registry.remove(&self.key);
            }
        }
    }
}

static REGISTRY: Lazy<Mutex<HashMap<SessionKey, Weak<Session>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_INSTANCE: AtomicU32 = AtomicU32::new(1);
static NEXT_CONN_SERIAL: Lazy<AtomicU32> = Lazy::new(|| {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(1);
    AtomicU32::new(seed | 1)
});

/// allocate the instance id for a tag that opted out of session sharing
pub(crate) fn private_instance() -> u32 {
    NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed)
}

/// find or create the session for `key` and hand out a strong reference
pub(crate) fn get_or_create(key: SessionKey) -> Result<Arc<Session>> {
    let mut registry = REGISTRY.lock();
    if let Some(weak) = registry.get(&key) {
        if let Some(session) = weak.upgrade() {
            return Ok(session);
        }
    }

    let (tx, rx) = mpsc::channel();
    let shared = Arc::new(Shared {
        state: Mutex::new(SessionState::Disconnected),
        next_token: AtomicU64::new(1),
    });
    let session = Arc::new(Session {
        key: key.clone(),
        tx: Mutex::new(tx),
        shared: Arc::clone(&shared),
    });

    let worker = Worker::new(&key, Arc::downgrade(&shared), rx);
    std::thread::Builder::new()
        .name(format!("abtag-session-{}", key.gateway))
        .spawn(move || worker.run())
        .map_err(|e| {
            log::error!("session {}: worker spawn failed: {}", key.gateway, e);
            Status::Err(crate::status::ERR_CREATE)
        })?;

    registry.insert(key, Arc::downgrade(&session));
    Ok(session)
}

/// ask every live session worker to shut down; used by [`crate::plc::shutdown`]
pub(crate) fn shutdown_all() {
    let mut registry = REGISTRY.lock();
    for (_, weak) in registry.drain() {
        if let Some(session) = weak.upgrade() {
            let _ = session.tx.lock().send(Msg::Shutdown);
        }
    }
}

/// look the owning tag up and deliver a completion; a destroyed tag makes
/// this a no-op and the reply is discarded
fn complete(handle: i32, token: u64, result: std::result::Result<Vec<u8>, Status>) {
    match handle::lookup(handle) {
        Some(tag) => tag.on_reply(token, result),
        None => log::debug!("tag {}: gone, dropping completion", handle),
    }
}

struct Inflight {
    token: u64,
    handle: i32,
    context: u64,
    seq: u16,
    deadline: Instant,
    /// already timed out or cancelled; the entry only waits for its reply
    /// bytes to arrive so they can be discarded
    completed: bool,
}

enum Pump {
    Shutdown,
    ConnectionLost(Status),
}

struct Worker {
    shared: Weak<Shared>,
    rx: Receiver<Msg>,
    gateway: String,
    conn_path: Vec<u8>,
    connected: bool,
    max_inflight: usize,
    sock: Option<TcpStream>,
    rbuf: Vec<u8>,
    session_handle: u32,
    next_context: u64,
    next_seq: u16,
    conn_ids: Option<ConnectionIds>,
    conn_serial: u16,
    queue: VecDeque<Request>,
    inflight: Vec<Inflight>,
}

impl Worker {
    fn new(key: &SessionKey, shared: Weak<Shared>, rx: Receiver<Msg>) -> Worker {
        Worker {
            shared,
            rx,
            gateway: key.gateway.clone(),
            conn_path: key.path.clone(),
            connected: key.connected,
            max_inflight: key.plc.max_inflight(),
            sock: None,
            rbuf: Vec::new(),
            session_handle: 0,
            next_context: 1,
            next_seq: 0,
            conn_ids: None,
            conn_serial: 0,
            queue: VecDeque::new(),
            inflight: Vec::new(),
        }
    }

    fn set_state(&self, state: SessionState) {
        if let Some(shared) = self.shared.upgrade() {
            *shared.state.lock() = state;
        }
    }

    fn run(mut self) {
        log::debug!("session {}: worker started", self.gateway);
        loop {
            if self.sock.is_none() {
                match self.connect() {
                    Ok(()) => {}
                    Err(status) => {
                        log::warn!("session {}: setup failed: {:?}", self.gateway, status);
                        self.fail_all(status);
                        self.set_state(SessionState::Failed);
                        self.drop_socket();
                        if self.backoff() {
                            break;
                        }
                        self.set_state(SessionState::Disconnected);
                        continue;
                    }
                }
            }
            match self.pump() {
                Pump::Shutdown => break,
                Pump::ConnectionLost(status) => {
                    log::warn!("session {}: connection lost: {:?}", self.gateway, status);
                    self.fail_all(status);
                    self.set_state(SessionState::Failed);
                    self.drop_socket();
                    if self.backoff() {
                        break;
                    }
                    self.set_state(SessionState::Disconnected);
                }
            }
        }
        self.teardown();
        log::debug!("session {}: worker stopped", self.gateway);
    }

    fn drop_socket(&mut self) {
        self.sock = None;
        self.rbuf.clear();
        self.conn_ids = None;
    }

    // ---- connection setup ----------------------------------------------

    fn connect(&mut self) -> Result<()> {
        self.set_state(SessionState::Connecting);
        let target = if self.gateway.contains(':') {
            self.gateway.clone()
        } else {
            format!("{}:{}", self.gateway, ENIP_PORT)
        };
        let addrs: Vec<_> = target
            .to_socket_addrs()
            .map_err(|e| {
                log::warn!("session {}: resolve failed: {}", self.gateway, e);
                Status::Err(ERR_BAD_GATEWAY)
            })?
            .collect();
        let mut sock = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(s) => {
                    sock = Some(s);
                    break;
                }
                Err(e) => log::debug!("session {}: connect {} failed: {}", self.gateway, addr, e),
            }
        }
        let sock = sock.ok_or(Status::Err(ERR_BAD_CONNECTION))?;
        let _ = sock.set_nodelay(true);
        sock.set_read_timeout(Some(IO_POLL))
            .map_err(|_| Status::Err(ERR_BAD_CONNECTION))?;
        sock.set_write_timeout(Some(WRITE_TIMEOUT))
            .map_err(|_| Status::Err(ERR_BAD_CONNECTION))?;
        self.sock = Some(sock);

        // register the ENIP session
        self.send_frame(&enip::register_session())?;
        let (hdr, _body) = self.wait_frame(enip::CMD_REGISTER_SESSION, 0, SETUP_REPLY_TIMEOUT)?;
        if hdr.status != 0 {
            log::warn!(
                "session {}: register session refused, status {:#x}",
                self.gateway,
                hdr.status
            );
            return Err(Status::Err(ERR_BAD_GATEWAY));
        }
        self.session_handle = hdr.session;
        self.set_state(SessionState::Registered);
        log::info!(
            "session {}: registered, handle {:#010x}",
            self.gateway,
            self.session_handle
        );

        if self.connected {
            self.forward_open()?;
            self.set_state(SessionState::Opened);
        }
        Ok(())
    }

    fn forward_open(&mut self) -> Result<()> {
        self.conn_serial = (NEXT_CONN_SERIAL.fetch_add(1, Ordering::Relaxed) & 0xFFFF) as u16;
        let t_o_id = NEXT_CONN_SERIAL.fetch_add(1, Ordering::Relaxed) ^ 0x5A5A_0000;
        let req = cip::forward_open(t_o_id, self.conn_serial, &self.conn_path)?;
        let context = self.next_context;
        self.next_context += 1;
        self.send_frame(&enip::send_rr_data(self.session_handle, context, &req))?;
        let (_, body) = self.wait_frame(enip::CMD_SEND_RR_DATA, context, SETUP_REPLY_TIMEOUT)?;
        let cip_bytes = enip::parse_rr_body(&body)?;
        let reply = cip::checked_reply(cip_bytes, cip::SERVICE_FORWARD_OPEN)?;
        reply.status().into_result()?;
        let ids = cip::parse_forward_open_reply(reply.data)?;
        log::info!(
            "session {}: forward open, O->T {:#010x} T->O {:#010x}",
            self.gateway,
            ids.o_t,
            ids.t_o
        );
        self.conn_ids = Some(ids);
        Ok(())
    }

    // ---- socket helpers ------------------------------------------------

    fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        let sock = self.sock.as_mut().ok_or(Status::Err(ERR_BAD_CONNECTION))?;
        sock.write_all(frame).map_err(|e| {
            log::warn!("session {}: send failed: {}", self.gateway, e);
            Status::Err(ERR_BAD_CONNECTION)
        })
    }

    /// read whatever is available within the socket poll timeout
    fn fill_rbuf(&mut self) -> Result<()> {
        let sock = self.sock.as_mut().ok_or(Status::Err(ERR_BAD_CONNECTION))?;
        let mut tmp = [0u8; 4096];
        match sock.read(&mut tmp) {
            Ok(0) => Err(Status::Err(ERR_BAD_CONNECTION)),
            Ok(n) => {
                self.rbuf.extend_from_slice(&tmp[..n]);
                Ok(())
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(())
            }
            Err(e) => {
                log::warn!("session {}: recv failed: {}", self.gateway, e);
                Err(Status::Err(ERR_BAD_CONNECTION))
            }
        }
    }

    /// pop one complete encapsulation frame off the receive buffer
    fn take_frame(&mut self) -> Result<Option<(Header, Vec<u8>)>> {
        if self.rbuf.len() < HEADER_LEN {
            return Ok(None);
        }
        let hdr = Header::parse(&self.rbuf[..HEADER_LEN])?;
        let body_len = hdr.length as usize;
        if body_len > MAX_BODY {
            log::warn!("session {}: oversized frame ({})", self.gateway, body_len);
            return Err(Status::Err(ERR_BAD_REPLY));
        }
        if self.rbuf.len() < HEADER_LEN + body_len {
            return Ok(None);
        }
        let body = self.rbuf[HEADER_LEN..HEADER_LEN + body_len].to_vec();
        self.rbuf.drain(..HEADER_LEN + body_len);
        Ok(Some((hdr, body)))
    }

    /// block until a frame with the given command (and context, for data
    /// commands) arrives; used only during session setup and teardown
    fn wait_frame(
        &mut self,
        command: u16,
        context: u64,
        timeout: Duration,
    ) -> Result<(Header, Vec<u8>)> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some((hdr, body)) = self.take_frame()? {
                if hdr.command == command
                    && (command != enip::CMD_SEND_RR_DATA || hdr.context == context)
                {
                    return Ok((hdr, body));
                }
                log::debug!(
                    "session {}: ignoring frame {:#06x} during setup",
                    self.gateway,
                    hdr.command
                );
                continue;
            }
            if Instant::now() >= deadline {
                return Err(Status::Err(ERR_TIMEOUT));
            }
            self.fill_rbuf()?;
        }
    }

    // ---- request pump --------------------------------------------------

    fn active_inflight(&self) -> usize {
        self.inflight.iter().filter(|i| !i.completed).count()
    }

    fn pump(&mut self) -> Pump {
        loop {
            // 1. drain the mailbox
            loop {
                match self.rx.try_recv() {
                    Ok(Msg::Submit(req)) => self.queue.push_back(req),
                    Ok(Msg::Cancel(token)) => self.cancel(token),
                    Ok(Msg::Shutdown) | Err(TryRecvError::Disconnected) => return Pump::Shutdown,
                    Err(TryRecvError::Empty) => break,
                }
            }
            // 2. issue queued requests up to the in-flight cap
            if let Err(status) = self.issue_ready() {
                return Pump::ConnectionLost(status);
            }
            // 3. fire timeouts
            self.sweep_deadlines();
            // 4. pull replies off the wire
            match self.fill_rbuf() {
                Ok(()) => {}
                Err(status) => return Pump::ConnectionLost(status),
            }
            loop {
                match self.take_frame() {
                    Ok(Some((hdr, body))) => self.dispatch(hdr, body),
                    Ok(None) => break,
                    Err(status) => return Pump::ConnectionLost(status),
                }
            }
            // 5. nothing to do: block on the mailbox instead of spinning
            if self.queue.is_empty() && self.inflight.is_empty() {
                match self.rx.recv_timeout(IDLE_POLL) {
                    Ok(Msg::Submit(req)) => self.queue.push_back(req),
                    Ok(Msg::Cancel(token)) => self.cancel(token),
                    Ok(Msg::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                        return Pump::Shutdown
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }
        }
    }

    fn issue_ready(&mut self) -> Result<()> {
        loop {
            let is_ready = match self.queue.front() {
                Some(req) => req.kind == RequestKind::Ready,
                None => break,
            };
            if !is_ready && self.active_inflight() >= self.max_inflight {
                break;
            }
            let req = match self.queue.pop_front() {
                Some(req) => req,
                None => break,
            };
            if is_ready {
                complete(req.handle, req.token, Ok(Vec::new()));
            } else {
                self.issue(req)?;
            }
        }
        Ok(())
    }

    fn issue(&mut self, req: Request) -> Result<()> {
        let (frame, context, seq) = if self.connected {
            let ids = match self.conn_ids {
                Some(ids) => ids,
                None => {
                    complete(req.handle, req.token, Err(Status::Err(ERR_BAD_CONNECTION)));
                    return Ok(());
                }
            };
            self.next_seq = self.next_seq.wrapping_add(1);
            let seq = self.next_seq;
            (
                enip::send_unit_data(self.session_handle, ids.o_t, seq, &req.cip),
                0,
                seq,
            )
        } else {
            let context = self.next_context;
            self.next_context += 1;
            let cip = if self.conn_path.is_empty() {
                req.cip.clone()
            } else {
                match cip::unconnected_send(&req.cip, &self.conn_path) {
                    Ok(cip) => cip,
                    Err(status) => {
                        complete(req.handle, req.token, Err(status));
                        return Ok(());
                    }
                }
            };
            (
                enip::send_rr_data(self.session_handle, context, &cip),
                context,
                0,
            )
        };
        self.send_frame(&frame)?;
        log::trace!(
            "session {}: issued token {} for tag {}",
            self.gateway,
            req.token,
            req.handle
        );
        self.inflight.push(Inflight {
            token: req.token,
            handle: req.handle,
            context,
            seq,
            deadline: req.deadline,
            completed: false,
        });
        Ok(())
    }

    fn sweep_deadlines(&mut self) {
        let now = Instant::now();
        for inf in self.inflight.iter_mut() {
            if !inf.completed && now >= inf.deadline {
                log::debug!(
                    "session {}: token {} timed out in flight",
                    self.gateway,
                    inf.token
                );
                inf.completed = true;
                complete(inf.handle, inf.token, Err(Status::Err(ERR_TIMEOUT)));
            }
        }
        // queued requests can expire before they ever hit the wire
        let mut expired = Vec::new();
        self.queue.retain(|req| {
            if now >= req.deadline {
                expired.push((req.handle, req.token));
                false
            } else {
                true
            }
        });
        for (handle, token) in expired {
            complete(handle, token, Err(Status::Err(ERR_TIMEOUT)));
        }
    }

    fn dispatch(&mut self, hdr: Header, body: Vec<u8>) {
        match hdr.command {
            enip::CMD_SEND_RR_DATA => {
                if hdr.session != self.session_handle {
                    log::warn!("session {}: reply with foreign session handle", self.gateway);
                    return;
                }
                let idx = match self.inflight.iter().position(|i| i.context == hdr.context) {
                    Some(idx) => idx,
                    None => {
                        log::debug!(
                            "session {}: unmatched unconnected reply, context {}",
                            self.gateway,
                            hdr.context
                        );
                        return;
                    }
                };
                let inf = self.inflight.swap_remove(idx);
                if inf.completed {
                    return; // timed out or cancelled earlier; drop the bytes
                }
                let result = if hdr.status != 0 {
                    log::warn!(
                        "session {}: gateway rejected request, status {:#x}",
                        self.gateway,
                        hdr.status
                    );
                    Err(Status::Err(ERR_BAD_REPLY))
                } else {
                    enip::parse_rr_body(&body).map(|cip| cip.to_vec())
                };
                complete(inf.handle, inf.token, result);
            }
            enip::CMD_SEND_UNIT_DATA => {
                if hdr.session != self.session_handle {
                    log::warn!("session {}: reply with foreign session handle", self.gateway);
                    return;
                }
                let (conn_id, seq, cip_bytes) = match enip::parse_unit_body(&body) {
                    Ok(parts) => parts,
                    Err(status) => {
                        log::warn!(
                            "session {}: bad connected frame: {:?}",
                            self.gateway,
                            status
                        );
                        return;
                    }
                };
                if let Some(ids) = self.conn_ids {
                    if conn_id != ids.t_o {
                        log::warn!(
                            "session {}: frame for unknown connection {:#010x}",
                            self.gateway,
                            conn_id
                        );
                        return;
                    }
                }
                let idx = match self.inflight.iter().position(|i| i.seq == seq) {
                    Some(idx) => idx,
                    None => {
                        log::debug!(
                            "session {}: unmatched connected reply, seq {}",
                            self.gateway,
                            seq
                        );
                        return;
                    }
                };
                let inf = self.inflight.swap_remove(idx);
                if inf.completed {
                    return;
                }
                complete(inf.handle, inf.token, Ok(cip_bytes.to_vec()));
            }
            other => {
                log::debug!("session {}: ignoring frame {:#06x}", self.gateway, other);
            }
        }
    }

    fn cancel(&mut self, token: u64) {
        if let Some(inf) = self.inflight.iter_mut().find(|i| i.token == token) {
            inf.completed = true;
            return;
        }
        self.queue.retain(|req| req.token != token);
    }

    fn fail_all(&mut self, status: Status) {
        for inf in self.inflight.drain(..) {
            if !inf.completed {
                complete(inf.handle, inf.token, Err(status));
            }
        }
        for req in self.queue.drain(..) {
            complete(req.handle, req.token, Err(status));
        }
    }

    /// sleep out the reconnect backoff while still answering the mailbox;
    /// returns true when a shutdown arrived
    fn backoff(&mut self) -> bool {
        let deadline = Instant::now() + RECONNECT_BACKOFF;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.rx.recv_timeout(deadline - now) {
                Ok(Msg::Submit(req)) => self.queue.push_back(req),
                Ok(Msg::Cancel(token)) => self.cancel(token),
                Ok(Msg::Shutdown) | Err(RecvTimeoutError::Disconnected) => return true,
                Err(RecvTimeoutError::Timeout) => return false,
            }
        }
    }

    fn teardown(&mut self) {
        self.set_state(SessionState::ShuttingDown);
        self.fail_all(Status::Err(ERR_ABORT));
        if self.sock.is_some() {
            if let Some(_ids) = self.conn_ids {
                // best effort forward close; ignore errors, bound the wait
                if let Ok(req) = cip::forward_close(self.conn_serial, &self.conn_path) {
                    let context = self.next_context;
                    self.next_context += 1;
                    let frame = enip::send_rr_data(self.session_handle, context, &req);
                    if self.send_frame(&frame).is_ok() {
                        let _ = self.wait_frame(enip::CMD_SEND_RR_DATA, context, TEARDOWN_TIMEOUT);
                    }
                }
            }
            let frame = enip::unregister_session(self.session_handle);
            let _ = self.send_frame(&frame);
        }
        self.drop_socket();
        self.set_state(SessionState::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_identity() {
        let a = SessionKey {
            gateway: "10.0.0.2".into(),
            path: vec![1, 0],
            plc: PlcKind::ControlLogix,
            connected: true,
            instance: 0,
        };
        let mut b = a.clone();
        assert_eq!(a, b);
        b.connected = false;
        assert_ne!(a, b);
        let mut c = a.clone();
        c.instance = private_instance();
        assert_ne!(a, c);
    }
}
