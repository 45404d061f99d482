//! Transfer output record returned by `queue_buffer` and `connect`.
//!
//! Fixed 16-byte layout, no length field:
//! ```text
//! ┌───────┬────────┬────────────────┬─────────────────────┐
//! │ width │ height │ transform hint │ num pending buffers │
//! │ u32   │ u32    │ u32            │ u32                 │
//! └───────┴────────┴────────────────┴─────────────────────┘
//! ```

use bytes::{Buf, BufMut};

use crate::error::Result;
use crate::protocol::flatten::ensure_remaining;

/// Encoded size in bytes.
pub const QUEUE_OUTPUT_SIZE: usize = 16;

/// Consumer-side state reported back to the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueBufferOutput {
    pub width: u32,
    pub height: u32,
    pub transform_hint: u32,
    pub num_pending_buffers: u32,
}

impl QueueBufferOutput {
    pub fn new(width: u32, height: u32, transform_hint: u32, num_pending_buffers: u32) -> Self {
        Self {
            width,
            height,
            transform_hint,
            num_pending_buffers,
        }
    }

    /// Encode to the fixed wire layout.
    pub fn encode(&self) -> [u8; QUEUE_OUTPUT_SIZE] {
        let mut buf = [0u8; QUEUE_OUTPUT_SIZE];
        let mut out = &mut buf[..];
        out.put_u32_le(self.width);
        out.put_u32_le(self.height);
        out.put_u32_le(self.transform_hint);
        out.put_u32_le(self.num_pending_buffers);
        buf
    }

    /// Decode from the fixed wire layout.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut input = buf;
        ensure_remaining(&input, QUEUE_OUTPUT_SIZE)?;
        Ok(Self {
            width: input.get_u32_le(),
            height: input.get_u32_le(),
            transform_hint: input.get_u32_le(),
            num_pending_buffers: input.get_u32_le(),
        })
    }
}
