//! Buffer allocation behind the queue.

use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use crate::error::Result;
use crate::handle::{Descriptor, GraphicBuffer};

/// Allocates graphics buffers for the queue.
pub trait BufferAllocator: Send + Sync {
    fn allocate(&self, width: u32, height: u32, format: u32, usage: u32) -> Result<GraphicBuffer>;
}

/// Allocator that hands out buffers with fresh ids and placeholder memory
/// descriptors. Nothing is mapped.
#[derive(Debug)]
pub struct SyntheticAllocator {
    next_id: AtomicU64,
    next_descriptor: AtomicI32,
}

impl SyntheticAllocator {
    /// First descriptor number handed out.
    pub const FIRST_DESCRIPTOR: i32 = 100;

    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            next_descriptor: AtomicI32::new(Self::FIRST_DESCRIPTOR),
        }
    }
}

impl Default for SyntheticAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferAllocator for SyntheticAllocator {
    fn allocate(&self, width: u32, height: u32, format: u32, usage: u32) -> Result<GraphicBuffer> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let fd = self.next_descriptor.fetch_add(1, Ordering::Relaxed);
        Ok(GraphicBuffer::new(id, width, height, format, usage).with_memory(Descriptor::new(fd)))
    }
}
