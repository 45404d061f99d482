//! Queue module - reference consumer-side implementation.
//!
//! - [`BufferQueue`] - slot pool implementing [`SurfaceTexture`](crate::SurfaceTexture)
//!   for the producer plus acquire/release for the consumer
//! - [`BufferQueueBuilder`] / [`QueueConfig`] - configuration
//! - [`BufferAllocator`] - where buffers come from

mod allocator;
mod buffer_queue;
mod config;
mod slot;

pub use allocator::{BufferAllocator, SyntheticAllocator};
pub use buffer_queue::{BufferQueue, BufferQueueBuilder, NUM_BUFFER_SLOTS};
pub use config::{QueueConfig, DEFAULT_BUFFER_COUNT, DEFAULT_MAX_ACQUIRED};
pub use slot::{AcquiredBuffer, BufferState};
