//! Pending queue -- FIFO of outstanding requests paired with result slots.
//!
//! The reply stream is ordered per connection, so correlation always works
//! against the queue front. Front inspection is non-destructive: the read
//! loop peeks before deciding between the request-shaped and
//! notification-shaped decode paths.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::oneshot;
use zkwire_proto::OpCode;

use crate::dispatcher::Reply;
use crate::error::ClientError;

pub type ReplySender = oneshot::Sender<Result<Reply, ClientError>>;
pub type ReplyReceiver = oneshot::Receiver<Result<Reply, ClientError>>;

/// An outstanding request and the slot its reply completes.
#[derive(Debug)]
pub struct Pending {
    pub opcode: OpCode,
    /// Absent only for the session-establishment request, which carries no
    /// header on the wire.
    pub xid: Option<i32>,
    pub tx: ReplySender,
}

/// Copy of a pending entry's identity, for non-destructive front checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMeta {
    pub opcode: OpCode,
    pub xid: Option<i32>,
}

/// Thread-safe FIFO of outstanding request records.
#[derive(Debug, Default)]
pub struct PendingQueue {
    inner: Mutex<VecDeque<Pending>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: Pending) {
        self.inner.lock().unwrap().push_back(entry);
    }

    /// Identity of the oldest outstanding request, without dequeuing it.
    pub fn front_meta(&self) -> Option<PendingMeta> {
        self.inner.lock().unwrap().front().map(|p| PendingMeta {
            opcode: p.opcode,
            xid: p.xid,
        })
    }

    pub fn pop(&self) -> Option<Pending> {
        self.inner.lock().unwrap().pop_front()
    }

    /// Remove the most recently enqueued entry. Used when a write fails
    /// non-fatally after its record was already enqueued.
    pub fn pop_back(&self) -> Option<Pending> {
        self.inner.lock().unwrap().pop_back()
    }

    /// Take every entry in one locked sweep, oldest first.
    pub fn drain(&self) -> Vec<Pending> {
        self.inner.lock().unwrap().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}
