//! Fence handle.
//!
//! A fence marks the point at which a buffer becomes safe to read or write.
//! The "no fence" state is a regular value, not an error.
//!
//! Flattened form:
//! ```text
//! ┌──────────────┐   side channel
//! │ fd count u32 │   [descriptor] (only when count == 1)
//! └──────────────┘
//! ```

use bytes::{Buf, BufMut};

use super::Descriptor;
use crate::error::{Result, SurfaceError};
use crate::protocol::flatten::{ensure_capacity, ensure_remaining, Flattenable};

/// Size of a flattened fence body in bytes.
pub const FENCE_FLATTENED_SIZE: usize = 4;

/// Owned synchronization handle, valid or invalid.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fence {
    descriptor: Option<Descriptor>,
}

impl Fence {
    /// Fence backed by a wait object.
    ///
    /// An invalid descriptor yields the "no fence" value.
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor: descriptor.is_valid().then_some(descriptor),
        }
    }

    /// The "no fence" value.
    pub fn no_fence() -> Self {
        Self { descriptor: None }
    }

    /// True if a real wait object backs this fence.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.descriptor.is_some()
    }

    pub fn descriptor(&self) -> Option<Descriptor> {
        self.descriptor
    }

    /// Move the fence out, leaving "no fence" behind.
    pub fn take(&mut self) -> Fence {
        std::mem::take(self)
    }
}

impl Flattenable for Fence {
    fn flattened_size(&self) -> usize {
        FENCE_FLATTENED_SIZE
    }

    fn descriptor_count(&self) -> usize {
        usize::from(self.is_valid())
    }

    fn flatten(&self, buf: &mut [u8], fds: &mut [Descriptor]) -> Result<()> {
        let count = self.descriptor_count();
        ensure_capacity(buf, fds, FENCE_FLATTENED_SIZE, count)?;
        let mut out = &mut buf[..];
        out.put_u32_le(count as u32);
        if let Some(descriptor) = self.descriptor {
            fds[0] = descriptor;
        }
        Ok(())
    }

    fn unflatten(buf: &[u8], fds: &[Descriptor]) -> Result<Self> {
        let mut input = buf;
        ensure_remaining(&input, FENCE_FLATTENED_SIZE)?;
        let count = input.get_u32_le() as usize;
        match count {
            0 => Ok(Fence::no_fence()),
            1 => {
                let descriptor = fds.first().copied().ok_or(SurfaceError::MissingDescriptor {
                    needed: 1,
                    available: 0,
                })?;
                Ok(Fence::new(descriptor))
            }
            n => Err(SurfaceError::Malformed(format!(
                "fence carries {} descriptors, at most 1 allowed",
                n
            ))),
        }
    }
}
