//! Graphic buffer handle.
//!
//! Flattened form (little endian, 36 bytes):
//! ```text
//! ┌───────┬───────┬────────┬────────┬────────┬───────┬───────────┬──────────┐
//! │ magic │ width │ height │ stride │ format │ usage │ id (u64)  │ fd count │
//! │ GBFR  │  u32  │  u32   │  u32   │  u32   │  u32  │ lo, hi    │   u32    │
//! └───────┴───────┴────────┴────────┴────────┴───────┴───────────┴──────────┘
//! ```
//! The memory descriptor, if any, travels in the side channel.

use bytes::{Buf, BufMut};

use super::Descriptor;
use crate::error::{Result, SurfaceError};
use crate::protocol::flatten::{ensure_capacity, ensure_remaining, Flattenable};

/// Magic tag at the start of a flattened buffer ("GBFR").
pub const GRAPHIC_BUFFER_MAGIC: u32 = u32::from_be_bytes(*b"GBFR");

/// Size of a flattened buffer body in bytes.
pub const GRAPHIC_BUFFER_FLATTENED_SIZE: usize = 36;

/// Pixel formats.
pub mod format {
    pub const RGBA_8888: u32 = 1;
    pub const RGBX_8888: u32 = 2;
    pub const RGB_888: u32 = 3;
    pub const RGB_565: u32 = 4;
    pub const BGRA_8888: u32 = 5;
}

/// Usage bits.
pub mod usage {
    pub const SW_READ_OFTEN: u32 = 0x0000_0003;
    pub const SW_WRITE_OFTEN: u32 = 0x0000_0030;
    pub const HW_TEXTURE: u32 = 0x0000_0100;
    pub const HW_RENDER: u32 = 0x0000_0200;
    pub const HW_COMPOSER: u32 = 0x0000_0800;
    pub const HW_VIDEO_ENCODER: u32 = 0x0001_0000;
}

/// Owned handle to buffer memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicBuffer {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: u32,
    pub usage: u32,
    pub memory: Option<Descriptor>,
}

impl GraphicBuffer {
    /// Create a buffer description. Stride defaults to the width.
    pub fn new(id: u64, width: u32, height: u32, format: u32, usage: u32) -> Self {
        Self {
            id,
            width,
            height,
            stride: width,
            format,
            usage,
            memory: None,
        }
    }

    /// Attach the memory descriptor.
    pub fn with_memory(mut self, memory: Descriptor) -> Self {
        self.memory = memory.is_valid().then_some(memory);
        self
    }

    /// True if this buffer cannot serve a request of the given geometry.
    ///
    /// `usage` must be a subset of the buffer's usage bits.
    pub fn needs_reallocation(&self, width: u32, height: u32, format: u32, usage: u32) -> bool {
        self.width != width
            || self.height != height
            || self.format != format
            || (self.usage & usage) != usage
    }
}

impl Flattenable for GraphicBuffer {
    fn flattened_size(&self) -> usize {
        GRAPHIC_BUFFER_FLATTENED_SIZE
    }

    fn descriptor_count(&self) -> usize {
        usize::from(self.memory.is_some())
    }

    fn flatten(&self, buf: &mut [u8], fds: &mut [Descriptor]) -> Result<()> {
        let count = self.descriptor_count();
        ensure_capacity(buf, fds, GRAPHIC_BUFFER_FLATTENED_SIZE, count)?;

        let mut out = &mut buf[..];
        out.put_u32_le(GRAPHIC_BUFFER_MAGIC);
        out.put_u32_le(self.width);
        out.put_u32_le(self.height);
        out.put_u32_le(self.stride);
        out.put_u32_le(self.format);
        out.put_u32_le(self.usage);
        out.put_u32_le(self.id as u32);
        out.put_u32_le((self.id >> 32) as u32);
        out.put_u32_le(count as u32);

        if let Some(memory) = self.memory {
            fds[0] = memory;
        }
        Ok(())
    }

    fn unflatten(buf: &[u8], fds: &[Descriptor]) -> Result<Self> {
        let mut input = buf;
        ensure_remaining(&input, GRAPHIC_BUFFER_FLATTENED_SIZE)?;

        let magic = input.get_u32_le();
        if magic != GRAPHIC_BUFFER_MAGIC {
            return Err(SurfaceError::Malformed(format!(
                "bad graphic buffer magic {:#010x}",
                magic
            )));
        }

        let width = input.get_u32_le();
        let height = input.get_u32_le();
        let stride = input.get_u32_le();
        let format = input.get_u32_le();
        let usage = input.get_u32_le();
        let id_lo = input.get_u32_le() as u64;
        let id_hi = input.get_u32_le() as u64;
        let count = input.get_u32_le() as usize;

        let memory = match count {
            0 => None,
            1 => {
                let memory = fds.first().copied().ok_or(SurfaceError::MissingDescriptor {
                    needed: 1,
                    available: 0,
                })?;
                memory.is_valid().then_some(memory)
            }
            n => {
                return Err(SurfaceError::Malformed(format!(
                    "graphic buffer carries {} descriptors, at most 1 allowed",
                    n
                )))
            }
        };

        Ok(Self {
            id: id_lo | (id_hi << 32),
            width,
            height,
            stride,
            format,
            usage,
            memory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GraphicBuffer {
        GraphicBuffer::new(0x1_0000_0002, 256, 128, format::RGBA_8888, usage::HW_TEXTURE)
            .with_memory(Descriptor::new(40))
    }

    #[test]
    fn test_flatten_layout() {
        let (buf, fds) = sample().to_flattened().unwrap();
        assert_eq!(buf.len(), GRAPHIC_BUFFER_FLATTENED_SIZE);
        assert_eq!(&buf[0..4], &GRAPHIC_BUFFER_MAGIC.to_le_bytes());
        assert_eq!(&buf[4..8], &256u32.to_le_bytes());
        assert_eq!(&buf[24..28], &2u32.to_le_bytes());
        assert_eq!(&buf[28..32], &1u32.to_le_bytes());
        assert_eq!(fds, vec![Descriptor::new(40)]);
    }

    #[test]
    fn test_unflatten_restores_buffer() {
        let original = sample();
        let (buf, fds) = original.to_flattened().unwrap();
        assert_eq!(GraphicBuffer::unflatten(&buf, &fds).unwrap(), original);
    }

    #[test]
    fn test_unflatten_drops_invalid_memory() {
        let (buf, _) = sample().to_flattened().unwrap();
        let buffer = GraphicBuffer::unflatten(&buf, &[Descriptor::new(-3)]).unwrap();
        assert_eq!(buffer.memory, None);
        assert_eq!(buffer.width, 256);
    }

    #[test]
    fn test_unflatten_bad_magic() {
        let (mut buf, fds) = sample().to_flattened().unwrap();
        buf[0] ^= 0xFF;
        let err = GraphicBuffer::unflatten(&buf, &fds).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_unflatten_short_buffer() {
        let (buf, fds) = sample().to_flattened().unwrap();
        let result = GraphicBuffer::unflatten(&buf[..20], &fds);
        assert!(matches!(result, Err(SurfaceError::NotEnoughData { .. })));
    }

    #[test]
    fn test_needs_reallocation() {
        let buffer = sample();
        assert!(!buffer.needs_reallocation(256, 128, format::RGBA_8888, usage::HW_TEXTURE));
        assert!(!buffer.needs_reallocation(256, 128, format::RGBA_8888, 0));
        assert!(buffer.needs_reallocation(256, 256, format::RGBA_8888, 0));
        assert!(buffer.needs_reallocation(256, 128, format::RGB_565, 0));
        assert!(buffer.needs_reallocation(256, 128, format::RGBA_8888, usage::HW_RENDER));
    }
}
