//! The interface contract shared by both roles.
//!
//! [`SurfaceTexture`] is implemented once per role:
//! - by [`SurfaceTextureProxy`](crate::SurfaceTextureProxy) on the producer side,
//!   which turns each call into one transaction
//! - by the buffer-queue implementation on the consumer side, which the
//!   [`Dispatcher`](crate::Dispatcher) invokes
//!
//! Absent results (no buffer bound, no fence) are `Option`/[`Fence`] values,
//! never errors. Failures carry a [`Status`](crate::Status) through
//! [`SurfaceError`](crate::SurfaceError).

use crate::codec::{QueueBufferInput, QueueBufferOutput};
use crate::error::{Result, SurfaceError};
use crate::handle::{Fence, GraphicBuffer};
use crate::types::{Api, DequeueOutput, QueryKey};

/// Producer-facing buffer queue operations.
pub trait SurfaceTexture: Send + Sync {
    /// Buffer bound to `slot`, or `None` if the slot has none.
    fn request_buffer(&self, slot: i32) -> Result<Option<GraphicBuffer>>;

    /// Renegotiate the pool size. `0` restores the default.
    fn set_buffer_count(&self, count: i32) -> Result<()>;

    /// Reserve a free slot sized and typed per the request.
    fn dequeue_buffer(
        &self,
        width: u32,
        height: u32,
        format: u32,
        usage: u32,
    ) -> Result<DequeueOutput>;

    /// Hand a filled slot to the consumer.
    fn queue_buffer(&self, slot: i32, input: QueueBufferInput) -> Result<QueueBufferOutput>;

    /// Return a dequeued slot without content.
    ///
    /// Remote callers never observe the result; implementations still
    /// report violations so local callers can.
    fn cancel_buffer(&self, slot: i32, fence: Fence) -> Result<()>;

    fn query(&self, what: QueryKey) -> Result<i32>;

    fn set_synchronous_mode(&self, enabled: bool) -> Result<()>;

    /// Claim the producer role.
    fn connect(&self, api: Api) -> Result<QueueBufferOutput>;

    /// Release the producer role.
    fn disconnect(&self, api: Api) -> Result<()>;

    // Extended set. Implementations without it keep the defaults.

    /// Latch the next queued buffer as current and return it with its slot.
    fn update_and_get_current(&self) -> Result<Option<(i32, GraphicBuffer)>> {
        Err(SurfaceError::Unsupported("updateAndGetCurrent"))
    }

    /// Bind an externally allocated buffer to a free slot.
    fn add_buffer_slot(&self, _buffer: GraphicBuffer) -> Result<i32> {
        Err(SurfaceError::Unsupported("addBufferSlot"))
    }

    fn get_id(&self) -> Result<String> {
        Err(SurfaceError::Unsupported("getId"))
    }

    /// Give a consumed slot back to the pool.
    fn release_buffer(&self, _slot: i32) -> Result<()> {
        Err(SurfaceError::Unsupported("releaseBuffer"))
    }
}
