//! Per-slot state of the reference queue.
//!
//! ```text
//!            dequeue             queue              acquire
//!   FREE ──────────────► DEQUEUED ─────► QUEUED ──────────────► ACQUIRED
//!    ▲                      │                                      │
//!    └──────── cancel ──────┘                                      │
//!    └──────────────────────────── release ────────────────────────┘
//! ```

use std::fmt;

use crate::handle::{Fence, GraphicBuffer};
use crate::types::{Rect, ScalingMode, Transform};

/// Ownership state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferState {
    /// Owned by the queue, available to dequeue.
    #[default]
    Free,
    /// Owned by the producer.
    Dequeued,
    /// Filled and waiting for the consumer.
    Queued,
    /// Owned by the consumer.
    Acquired,
}

impl fmt::Display for BufferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferState::Free => "FREE",
            BufferState::Dequeued => "DEQUEUED",
            BufferState::Queued => "QUEUED",
            BufferState::Acquired => "ACQUIRED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct BufferSlot {
    pub buffer: Option<GraphicBuffer>,
    pub state: BufferState,
    /// Fence the next owner must wait on.
    pub fence: Fence,
    /// Frame number of the last queue; orders free slots for reuse.
    pub frame_number: u64,
    /// The producer has fetched the current buffer of this slot.
    pub request_buffer_called: bool,
    pub timestamp: i64,
    pub crop: Rect,
    pub transform: Transform,
    pub scaling_mode: ScalingMode,
}

impl BufferSlot {
    /// Drop the buffer and return to a pristine free slot.
    pub fn reset(&mut self) {
        *self = BufferSlot::default();
    }
}

/// A buffer handed to the consumer by `acquire_buffer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredBuffer {
    pub slot: i32,
    pub buffer: GraphicBuffer,
    /// Producer fence to wait on before reading.
    pub fence: Fence,
    pub frame_number: u64,
    pub timestamp: i64,
    pub crop: Rect,
    pub transform: Transform,
    pub scaling_mode: ScalingMode,
}
