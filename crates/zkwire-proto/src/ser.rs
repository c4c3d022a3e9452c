//! Jute primitive writers, mirroring `de`.

use bytes::{BufMut, Bytes, BytesMut};

/// Append-only record writer. The result is one frame payload; the frame
/// codec adds the length prefix.
#[derive(Debug, Default)]
pub struct Writer {
    buf: BytesMut,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(cap),
        }
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.put_i64(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.put_u8(v as u8);
    }

    /// Length-prefixed buffer; `None` encodes as length -1.
    pub fn write_buffer(&mut self, v: Option<&[u8]>) {
        match v {
            Some(bytes) => {
                self.buf.put_i32(bytes.len() as i32);
                self.buf.put_slice(bytes);
            }
            None => self.buf.put_i32(-1),
        }
    }

    pub fn write_string(&mut self, v: &str) {
        self.write_buffer(Some(v.as_bytes()));
    }

    pub fn write_vec<T>(&mut self, items: &[T], mut element: impl FnMut(&mut Self, &T)) {
        self.buf.put_i32(items.len() as i32);
        for item in items {
            element(self, item);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}
