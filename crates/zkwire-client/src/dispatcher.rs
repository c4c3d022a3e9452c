//! Dispatcher -- request/reply correlation over one framed connection.
//!
//! One writer guarded by the submit critical section, one read-loop task
//! started on the first queued submission. Replies complete pending slots
//! in FIFO order; watch notifications fan out without touching the queue;
//! transport failure fails the dispatcher and cancels every pending slot
//! with the root cause.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use bytes::Bytes;
use tokio::sync::oneshot;
use zkwire_proto::{
    encode_connect_frame, encode_request_frame, ConnectRequest, ConnectResponse, OpCode, Reader,
    ReplyHeader, Request, RequestHeader, ResponseBody, WatchedEvent, ZkError, NOTIFICATION_XID,
    PING_XID,
};

use crate::error::{ClientError, TransportError};
use crate::pending::{Pending, PendingQueue, ReplyReceiver};
use crate::session::{ConnState, Session};
use crate::transport::{self, ConnReader, ConnWriter, Connection};
use crate::watch::WatchManager;

/// Collaborator handles, attached once via the configuration packet and
/// treated as read-only references thereafter.
#[derive(Debug, Clone)]
pub struct Managers {
    pub session: Arc<Session>,
    pub watches: Arc<WatchManager>,
    pub conn: Arc<ConnState>,
}

impl Managers {
    pub fn new() -> Self {
        Self {
            session: Arc::new(Session::new()),
            watches: Arc::new(WatchManager::new()),
            conn: Arc::new(ConnState::new()),
        }
    }
}

impl Default for Managers {
    fn default() -> Self {
        Self::new()
    }
}

/// A submission. Configuration packets bypass the pending queue; the
/// connect packet enqueues with an absent xid.
#[derive(Debug)]
pub enum Packet {
    ConfigureManagers(Managers),
    ConfigureDone,
    Protocol {
        header: RequestHeader,
        request: Request,
    },
    Connect(ConnectRequest),
}

/// A completed reply. The header is absent only for connect replies, which
/// carry none on the wire.
#[derive(Debug)]
pub struct Reply {
    pub header: Option<ReplyHeader>,
    pub body: ResponseBody,
}

impl Reply {
    /// Server-reported error carried in the header. This is data: the
    /// request completed, the server said no.
    pub fn error(&self) -> Option<ZkError> {
        self.header.and_then(|h| ZkError::from_code(h.err))
    }

    pub fn zxid(&self) -> Option<i64> {
        self.header.map(|h| h.zxid)
    }
}

struct WriteState {
    writer: ConnWriter,
    /// Taken by the first queued submission to start the read loop.
    reader: Option<ConnReader>,
}

struct Shared {
    write: tokio::sync::Mutex<WriteState>,
    pending: PendingQueue,
    failed: AtomicBool,
    read_loop_started: AtomicBool,
    configured: AtomicBool,
    managers: OnceLock<Managers>,
    fault: Mutex<Option<Arc<ClientError>>>,
    next_xid: AtomicI32,
}

impl Shared {
    /// The error a submission receives once the dispatcher has failed.
    fn cancellation(&self) -> ClientError {
        match self.fault.lock().unwrap().as_ref() {
            Some(cause) => ClientError::cancelled(cause),
            None => ClientError::Closed,
        }
    }

    /// Terminal failure: monotonic flag, heartbeat cancelled, connection
    /// invalidated, every pending slot cancelled with the root cause.
    fn fail(&self, error: ClientError) {
        if self.failed.swap(true, Ordering::SeqCst) {
            return;
        }
        let cause = Arc::new(error);
        *self.fault.lock().unwrap() = Some(cause.clone());
        if let Some(managers) = self.managers.get() {
            managers.session.ping.cancel();
            managers.conn.invalidate();
        }
        let drained = self.pending.drain();
        tracing::warn!(cancelled = drained.len(), cause = %cause, "dispatcher failed");
        for entry in drained {
            let _ = entry.tx.send(Err(ClientError::cancelled(&cause)));
        }
    }
}

/// Client-side response dispatcher for one connection.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Take exclusive ownership of a connection. The read loop starts
    /// lazily with the first queued submission.
    pub fn new(stream: impl Connection + 'static) -> Self {
        let (reader, writer) = transport::split(stream);
        Self {
            shared: Arc::new(Shared {
                write: tokio::sync::Mutex::new(WriteState {
                    writer,
                    reader: Some(reader),
                }),
                pending: PendingQueue::new(),
                failed: AtomicBool::new(false),
                read_loop_started: AtomicBool::new(false),
                configured: AtomicBool::new(false),
                managers: OnceLock::new(),
                fault: Mutex::new(None),
                next_xid: AtomicI32::new(1),
            }),
        }
    }

    /// Allocate the next client xid.
    pub fn next_xid(&self) -> i32 {
        self.shared.next_xid.fetch_add(1, Ordering::SeqCst)
    }

    pub fn is_failed(&self) -> bool {
        self.shared.failed.load(Ordering::Acquire)
    }

    pub fn is_configured(&self) -> bool {
        self.shared.configured.load(Ordering::Acquire)
    }

    /// Outstanding request count.
    pub fn pending_len(&self) -> usize {
        self.shared.pending.len()
    }

    /// Fail the dispatcher from outside (e.g. the owner tearing down a
    /// half-dead connection). Idempotent.
    pub fn fail(&self, error: ClientError) {
        self.shared.fail(error);
    }

    /// Submit one packet. Configuration packets complete immediately;
    /// protocol and connect packets resolve when their reply arrives or
    /// the dispatcher fails.
    pub async fn submit(&self, packet: Packet) -> Result<ReplyReceiver, ClientError> {
        if self.shared.failed.load(Ordering::Acquire) {
            return Err(self.shared.cancellation());
        }
        match packet {
            Packet::ConfigureManagers(managers) => {
                if self.shared.managers.set(managers).is_err() {
                    return Err(ClientError::ProtocolViolation(
                        "managers already configured".into(),
                    ));
                }
                tracing::debug!("collaborator managers attached");
                Ok(immediate_reply())
            }
            Packet::ConfigureDone => {
                let managers = self.shared.managers.get().ok_or_else(|| {
                    ClientError::ProtocolViolation("configure_done before managers attached".into())
                })?;
                self.shared.configured.store(true, Ordering::Release);
                tracing::debug!(
                    session = managers.session.state().name(),
                    "configuration complete, adopting current session"
                );
                Ok(immediate_reply())
            }
            Packet::Protocol { header, request } => {
                let opcode = request.opcode();
                if header.opcode != opcode.as_i32() {
                    return Err(ClientError::ProtocolViolation(format!(
                        "header opcode {} does not match request {opcode}",
                        header.opcode
                    )));
                }
                let frame = encode_request_frame(&header, &request);
                self.submit_queued(opcode, Some(header.xid), frame).await
            }
            Packet::Connect(request) => {
                let frame = encode_connect_frame(&request);
                self.submit_queued(OpCode::CreateSession, None, frame).await
            }
        }
    }

    /// The critical section: enqueue and write under one lock, so a record
    /// is visible to the read loop no later than the bytes it describes,
    /// and competing submitters are serialized.
    async fn submit_queued(
        &self,
        opcode: OpCode,
        xid: Option<i32>,
        frame: Bytes,
    ) -> Result<ReplyReceiver, ClientError> {
        let shared = &self.shared;
        let mut write = shared.write.lock().await;
        if shared.failed.load(Ordering::Acquire) {
            return Err(shared.cancellation());
        }

        let (tx, rx) = oneshot::channel();
        shared.pending.push(Pending { opcode, xid, tx });
        tracing::debug!(
            opcode = %opcode,
            xid = xid.unwrap_or(0),
            pending = shared.pending.len(),
            "request enqueued"
        );

        match write.writer.send(frame).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => {
                shared.fail(ClientError::Transport(e));
                // The entry just enqueued was drained; the receiver
                // resolves immediately with the cancellation.
                return Ok(rx);
            }
            Err(e) => {
                // Non-fatal write problem: this request alone is cancelled.
                // Still under the lock, so the back entry is ours.
                if let Some(entry) = shared.pending.pop_back() {
                    let _ = entry.tx.send(Err(ClientError::Transport(e)));
                }
                return Ok(rx);
            }
        }

        if !shared.read_loop_started.swap(true, Ordering::SeqCst) {
            if let Some(reader) = write.reader.take() {
                tokio::spawn(read_loop(Arc::clone(shared), reader));
                tracing::debug!("read loop started");
            }
        }
        Ok(rx)
    }
}

fn immediate_reply() -> ReplyReceiver {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(Ok(Reply {
        header: None,
        body: ResponseBody::None,
    }));
    rx
}

/// Pull one frame at a time until the session closes or the dispatcher
/// fails. Fatal read errors and dispatch errors fail the dispatcher;
/// recoverable read errors cancel the front entry and fail conservatively.
async fn read_loop(shared: Arc<Shared>, mut reader: ConnReader) {
    loop {
        if shared.failed.load(Ordering::Acquire) {
            tracing::debug!("read loop exiting: dispatcher failed");
            break;
        }
        if let Some(managers) = shared.managers.get() {
            if managers.session.is_closing() {
                tracing::debug!("read loop exiting: session closing");
                break;
            }
        }

        let frame = match reader.next().await {
            Ok(frame) => frame,
            Err(e) if e.is_fatal() => {
                shared.fail(ClientError::Transport(e));
                break;
            }
            Err(e) => {
                // The reply that was lost belongs to the front entry.
                let msg = e.to_string();
                if let Some(entry) = shared.pending.pop() {
                    let _ = entry
                        .tx
                        .send(Err(ClientError::Transport(TransportError::Other(
                            msg.clone(),
                        ))));
                }
                shared.fail(ClientError::Transport(TransportError::Other(msg)));
                break;
            }
        };

        if let Err(e) = process_frame(&shared, frame) {
            shared.fail(e);
            break;
        }
    }
}

/// Decode one reply frame and either complete a pending slot or fan out a
/// notification. An `Err` is a dispatch error that condemns the stream.
fn process_frame(shared: &Shared, frame: Bytes) -> Result<(), ClientError> {
    let mut r = Reader::new(frame.clone());

    // Headerless connect reply: matched when the front record is the
    // session-establishment request.
    if let Some(meta) = shared.pending.front_meta() {
        if meta.xid.is_none() {
            let Some(entry) = shared.pending.pop() else {
                // Failure drained the queue between peek and pop.
                return Ok(());
            };
            match ConnectResponse::decode(&mut r) {
                Ok(resp) => {
                    if let Some(managers) = shared.managers.get() {
                        managers.session.install(&resp);
                    }
                    tracing::info!(
                        session_id = format_args!("{:#x}", resp.session_id),
                        timeout_ms = resp.timeout_ms,
                        read_only = resp.read_only,
                        "session established"
                    );
                    let _ = entry.tx.send(Ok(Reply {
                        header: None,
                        body: ResponseBody::Connect(resp),
                    }));
                }
                Err(e) => {
                    let _ = entry.tx.send(Err(ClientError::Decode(e)));
                }
            }
            return Ok(());
        }
    }

    let header = match ReplyHeader::decode(&mut r) {
        Ok(header) => header,
        // Unreadable header: re-interpret the buffer as a notification
        // before giving up.
        Err(_) => return process_notification(shared, frame),
    };

    if header.xid == NOTIFICATION_XID {
        let event = WatchedEvent::decode(&mut r)?;
        dispatch_event(shared, event);
        return Ok(());
    }

    if header.xid == PING_XID {
        return match shared.pending.front_meta() {
            Some(meta) if meta.opcode == OpCode::Ping => {
                if let Some(entry) = shared.pending.pop() {
                    tracing::debug!(zxid = header.zxid, "heartbeat reply");
                    let _ = entry.tx.send(Ok(Reply {
                        header: Some(header),
                        body: ResponseBody::None,
                    }));
                }
                Ok(())
            }
            Some(meta) => Err(ClientError::ProtocolViolation(format!(
                "heartbeat reply but head of queue is {}",
                meta.opcode
            ))),
            None => Err(ClientError::ProtocolViolation(
                "heartbeat reply with empty pending queue".into(),
            )),
        };
    }

    // Correlated reply. Verify against the front before dequeuing, so a
    // mismatch leaves the entry for the failure drain.
    let Some(meta) = shared.pending.front_meta() else {
        return Err(ClientError::ProtocolViolation(format!(
            "reply xid {} with no pending request",
            header.xid
        )));
    };
    let expected = match meta.xid {
        Some(xid) => xid,
        // Connect replies were handled above; a queued connect record can
        // only sit at the front.
        None => {
            return Err(ClientError::ProtocolViolation(
                "connect record behind protocol requests".into(),
            ))
        }
    };
    if expected != header.xid {
        return Err(ClientError::Association {
            expected,
            got: header.xid,
        });
    }

    let Some(entry) = shared.pending.pop() else {
        return Ok(());
    };
    match ResponseBody::decode(meta.opcode, header.err, &mut r) {
        Ok(body) => {
            tracing::debug!(
                xid = header.xid,
                opcode = %meta.opcode,
                err = header.err,
                "reply matched"
            );
            let _ = entry.tx.send(Ok(Reply {
                header: Some(header),
                body,
            }));
        }
        Err(e) => {
            // Decode failed after a matched header: the error belongs to
            // this slot, not the dispatcher.
            let _ = entry.tx.send(Err(ClientError::Decode(e)));
        }
    }
    Ok(())
}

/// Second chance for a frame whose header would not decode: a well-formed
/// notification is accepted, anything else is a fatal decode error.
fn process_notification(shared: &Shared, frame: Bytes) -> Result<(), ClientError> {
    let mut r = Reader::new(frame);
    let header = ReplyHeader::decode(&mut r)?;
    if header.xid != NOTIFICATION_XID {
        return Err(ClientError::ProtocolViolation(format!(
            "undecodable reply frame (xid {})",
            header.xid
        )));
    }
    let event = WatchedEvent::decode(&mut r)?;
    dispatch_event(shared, event);
    Ok(())
}

fn dispatch_event(shared: &Shared, event: WatchedEvent) {
    tracing::debug!(
        event = ?event.event_type,
        state = ?event.state,
        path = %event.path,
        "watch notification"
    );
    match shared.managers.get() {
        Some(managers) => {
            managers.session.note_watch_event(&event);
            managers.watches.process(event);
        }
        None => tracing::warn!("watch notification before managers attached, dropped"),
    }
}
