//! Jute primitive readers over a byte cursor.
//!
//! Every reader consumes exactly what it decodes and leaves the remainder
//! intact, so a record decoder can stop mid-buffer without corrupting
//! whatever follows. Integers are big-endian; buffers and strings carry an
//! i32 length prefix, with length -1 meaning "absent".

use bytes::{Buf, Bytes};

use crate::MAX_FRAME_BYTES;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated record: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("negative length {0} where a value is required")]
    NegativeLength(i32),
    #[error("length {len} exceeds ceiling {max}")]
    LengthOverCeiling { len: usize, max: usize },
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,
    #[error("unknown opcode {0}")]
    UnknownOpCode(i32),
    #[error("unknown event type {0}")]
    UnknownEventType(i32),
    #[error("unknown keeper state {0}")]
    UnknownKeeperState(i32),
    #[error("unexpected multi op {0}")]
    UnexpectedMultiOp(i32),
    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),
}

/// Cursor over a single frame's payload.
#[derive(Debug, Clone)]
pub struct Reader {
    buf: Bytes,
}

impl Reader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn need(&self, n: usize) -> Result<(), DecodeError> {
        if self.buf.remaining() < n {
            return Err(DecodeError::Truncated {
                needed: n,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.need(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.need(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        self.need(1)?;
        Ok(self.buf.get_u8() != 0)
    }

    /// Trailing bool for records that grew a field across protocol
    /// revisions: absent bytes decode as `false`.
    pub fn read_trailing_bool(&mut self) -> Result<bool, DecodeError> {
        if self.buf.is_empty() {
            return Ok(false);
        }
        self.read_bool()
    }

    /// Length-prefixed byte buffer. Length -1 denotes an absent buffer.
    pub fn read_buffer(&mut self) -> Result<Option<Bytes>, DecodeError> {
        let len = self.read_i32()?;
        if len == -1 {
            return Ok(None);
        }
        if len < 0 {
            return Err(DecodeError::NegativeLength(len));
        }
        let len = len as usize;
        if len > MAX_FRAME_BYTES {
            return Err(DecodeError::LengthOverCeiling {
                len,
                max: MAX_FRAME_BYTES,
            });
        }
        self.need(len)?;
        Ok(Some(self.buf.split_to(len)))
    }

    /// Length-prefixed UTF-8 string. An absent (-1) string is an error:
    /// no record in the protocol carries one.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let buf = self
            .read_buffer()?
            .ok_or(DecodeError::NegativeLength(-1))?;
        String::from_utf8(buf.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    /// i32 count followed by elements. Count -1 decodes as empty, the same
    /// convention as buffers.
    pub fn read_vec<T>(
        &mut self,
        mut element: impl FnMut(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<Vec<T>, DecodeError> {
        let count = self.read_i32()?;
        if count == -1 {
            return Ok(Vec::new());
        }
        if count < 0 {
            return Err(DecodeError::NegativeLength(count));
        }
        let count = count as usize;
        // Each element costs at least one byte on the wire.
        if count > MAX_FRAME_BYTES {
            return Err(DecodeError::LengthOverCeiling {
                len: count,
                max: MAX_FRAME_BYTES,
            });
        }
        let mut out = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            out.push(element(self)?);
        }
        Ok(out)
    }

    /// Assert the record consumed the whole frame.
    pub fn expect_end(&self) -> Result<(), DecodeError> {
        if !self.buf.is_empty() {
            return Err(DecodeError::TrailingBytes(self.buf.remaining()));
        }
        Ok(())
    }
}
