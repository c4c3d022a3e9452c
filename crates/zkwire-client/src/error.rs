//! Error taxonomy for the dispatcher.
//!
//! Transport-layer errors are dispatcher-wide; decode-layer errors are
//! per-request; server-reported error codes are data and travel inside a
//! successful [`Reply`](crate::dispatcher::Reply), never through here.

use std::sync::Arc;

use zkwire_proto::DecodeError;

/// Errors surfaced by the framed transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection-level failure observed on read: the stream is gone.
    #[error("channel error: {0}")]
    Channel(#[source] std::io::Error),
    /// Write-side failure: nothing further can be sent.
    #[error("write error: {0}")]
    Write(#[source] std::io::Error),
    /// Recoverable read-side condition (the frame codec rejected a frame).
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether this error condemns the whole connection, and with it the
    /// dispatcher, rather than a single in-flight request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Channel(_) | TransportError::Write(_))
    }
}

/// Errors delivered to submitters and result slots.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("reply xid {got} does not match pending request xid {expected}")]
    Association { expected: i32, got: i32 },
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// Pending entry cancelled by dispatcher failure, carrying the root
    /// cause shared by every cancelled slot.
    #[error("request cancelled: {cause}")]
    Cancelled { cause: Arc<ClientError> },
    #[error("dispatcher is closed")]
    Closed,
}

impl ClientError {
    pub fn cancelled(cause: &Arc<ClientError>) -> Self {
        ClientError::Cancelled {
            cause: cause.clone(),
        }
    }

    /// The root cause of a cancellation chain, or the error itself.
    pub fn root_cause(&self) -> &ClientError {
        match self {
            ClientError::Cancelled { cause } => cause.root_cause(),
            other => other,
        }
    }
}
