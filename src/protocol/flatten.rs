//! Flattenable contract shared by buffer handles, fences and transfer records.
//!
//! A flattenable object serializes into two parts:
//! - a byte area of exactly [`Flattenable::flattened_size`] bytes
//! - [`Flattenable::descriptor_count`] descriptors for the side channel
//!
//! Callers size both areas up front, then call `flatten`. `unflatten` is the
//! exact inverse and must not read descriptors from the byte area.

use bytes::Buf;

use crate::error::{Result, SurfaceError};
use crate::handle::Descriptor;

/// Object with a two-part (bytes + descriptors) serialized form.
pub trait Flattenable: Sized {
    /// Exact number of bytes `flatten` writes.
    fn flattened_size(&self) -> usize;

    /// Exact number of descriptors `flatten` writes.
    fn descriptor_count(&self) -> usize;

    /// Write into caller-provided areas.
    ///
    /// `buf` must be at least `flattened_size()` bytes and `fds` at least
    /// `descriptor_count()` entries long.
    fn flatten(&self, buf: &mut [u8], fds: &mut [Descriptor]) -> Result<()>;

    /// Rebuild from a byte area and the matching descriptor slots.
    fn unflatten(buf: &[u8], fds: &[Descriptor]) -> Result<Self>;

    /// Flatten into freshly allocated, exactly sized areas.
    fn to_flattened(&self) -> Result<(Vec<u8>, Vec<Descriptor>)> {
        let mut buf = vec![0u8; self.flattened_size()];
        let mut fds = vec![Descriptor::INVALID; self.descriptor_count()];
        self.flatten(&mut buf, &mut fds)?;
        Ok((buf, fds))
    }
}

/// Check that a flatten target is large enough.
#[inline]
pub(crate) fn ensure_capacity(
    buf: &[u8],
    fds: &[Descriptor],
    size: usize,
    count: usize,
) -> Result<()> {
    if buf.len() < size {
        return Err(SurfaceError::NotEnoughData {
            needed: size,
            available: buf.len(),
        });
    }
    if fds.len() < count {
        return Err(SurfaceError::MissingDescriptor {
            needed: count,
            available: fds.len(),
        });
    }
    Ok(())
}

/// Check that a reader still has `needed` bytes.
#[inline]
pub(crate) fn ensure_remaining<B: Buf>(buf: &B, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(SurfaceError::NotEnoughData {
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}
