//! Framed transport over a split duplex stream.
//!
//! The dispatcher owns exactly one connection: one reader (the read loop)
//! and one writer (the submit critical section). Framing is the 4-byte
//! length prefix from zkwire-proto; payloads stay opaque here.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};
use zkwire_proto::{FrameCodec, WireError};

use crate::error::TransportError;

/// Anything the dispatcher can run over: a TCP stream in production, an
/// in-memory duplex in tests.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Connection for T {}

pub type ConnReader = ReadHalf<tokio::io::ReadHalf<Box<dyn Connection>>>;
pub type ConnWriter = WriteHalf<tokio::io::WriteHalf<Box<dyn Connection>>>;

/// Split a connection into framed halves.
pub fn split(stream: impl Connection + 'static) -> (ConnReader, ConnWriter) {
    let boxed: Box<dyn Connection> = Box::new(stream);
    let (read, write) = tokio::io::split(boxed);
    (ReadHalf::new(read), WriteHalf::new(write))
}

/// Read side: pulls one framed payload at a time.
pub struct ReadHalf<R> {
    inner: R,
    codec: FrameCodec,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> ReadHalf<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            codec: FrameCodec,
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Pull the next framed payload, classifying failures: io errors and
    /// EOF are channel errors (the connection is gone), frame-codec
    /// rejections are recoverable `Other` conditions.
    pub async fn next(&mut self) -> Result<Bytes, TransportError> {
        loop {
            match self.codec.decode(&mut self.buf) {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => {}
                Err(WireError::Io(e)) => return Err(TransportError::Channel(e)),
                Err(e) => return Err(TransportError::Other(e.to_string())),
            }

            let n = self
                .inner
                .read_buf(&mut self.buf)
                .await
                .map_err(TransportError::Channel)?;
            if n == 0 {
                return Err(TransportError::Channel(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )));
            }
        }
    }
}

/// Write side: frames and sends one payload at a time.
pub struct WriteHalf<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> WriteHalf<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn send(&mut self, payload: Bytes) -> Result<(), TransportError> {
        let mut framed = BytesMut::with_capacity(4 + payload.len());
        FrameCodec
            .encode(payload, &mut framed)
            .map_err(|e| TransportError::Other(e.to_string()))?;
        self.inner
            .write_all(&framed)
            .await
            .map_err(TransportError::Write)?;
        self.inner.flush().await.map_err(TransportError::Write)
    }
}
