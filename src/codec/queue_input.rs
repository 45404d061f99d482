//! Transfer input record submitted with a filled buffer.
//!
//! Flattened form (little endian):
//! ```text
//! ┌───────────┬──────────────────┬─────────┬───────────┬──────────┬────────────┐
//! │ timestamp │ crop l, t, r, b  │ scaling │ transform │ presence │ fence body │
//! │ i64       │ 4 × i32          │ i32     │ u32       │ u8 (0/1) │ if present │
//! └───────────┴──────────────────┴─────────┴───────────┴──────────┴────────────┘
//! ```
//! The fence body is only written for a valid fence; its descriptor goes to
//! the side channel.

use bytes::{Buf, BufMut};

use crate::error::{Result, SurfaceError};
use crate::handle::{Descriptor, Fence};
use crate::protocol::flatten::{ensure_capacity, ensure_remaining, Flattenable};
use crate::types::{Rect, ScalingMode, Transform};

/// Size of the fixed part, up to and including the presence byte.
pub const QUEUE_INPUT_FIXED_SIZE: usize = 8 + 16 + 4 + 4 + 1;

/// Record handed over with `queue_buffer`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueBufferInput {
    pub timestamp: i64,
    pub crop: Rect,
    pub scaling_mode: ScalingMode,
    pub transform: Transform,
    pub fence: Fence,
}

impl QueueBufferInput {
    pub fn new(
        timestamp: i64,
        crop: Rect,
        scaling_mode: ScalingMode,
        transform: Transform,
        fence: Fence,
    ) -> Self {
        Self {
            timestamp,
            crop,
            scaling_mode,
            transform,
            fence,
        }
    }
}

impl Flattenable for QueueBufferInput {
    fn flattened_size(&self) -> usize {
        let fence_size = if self.fence.is_valid() {
            self.fence.flattened_size()
        } else {
            0
        };
        QUEUE_INPUT_FIXED_SIZE + fence_size
    }

    fn descriptor_count(&self) -> usize {
        if self.fence.is_valid() {
            self.fence.descriptor_count()
        } else {
            0
        }
    }

    fn flatten(&self, buf: &mut [u8], fds: &mut [Descriptor]) -> Result<()> {
        ensure_capacity(buf, fds, self.flattened_size(), self.descriptor_count())?;
        let has_fence = self.fence.is_valid();

        let (fixed, rest) = buf.split_at_mut(QUEUE_INPUT_FIXED_SIZE);
        let mut out = fixed;
        out.put_i64_le(self.timestamp);
        out.put_i32_le(self.crop.left);
        out.put_i32_le(self.crop.top);
        out.put_i32_le(self.crop.right);
        out.put_i32_le(self.crop.bottom);
        out.put_i32_le(self.scaling_mode.raw());
        out.put_u32_le(self.transform.bits());
        out.put_u8(u8::from(has_fence));

        if has_fence {
            self.fence.flatten(rest, fds)?;
        }
        Ok(())
    }

    fn unflatten(buf: &[u8], fds: &[Descriptor]) -> Result<Self> {
        let mut input = buf;
        ensure_remaining(&input, QUEUE_INPUT_FIXED_SIZE)?;

        let timestamp = input.get_i64_le();
        let crop = Rect::new(
            input.get_i32_le(),
            input.get_i32_le(),
            input.get_i32_le(),
            input.get_i32_le(),
        );
        let raw_scaling = input.get_i32_le();
        let scaling_mode = ScalingMode::from_raw(raw_scaling).ok_or_else(|| {
            SurfaceError::Malformed(format!("unknown scaling mode {}", raw_scaling))
        })?;
        let transform = Transform(input.get_u32_le());

        let fence = match input.get_u8() {
            0 => Fence::no_fence(),
            1 => {
                let fence = Fence::unflatten(input, fds)?;
                if !fence.is_valid() {
                    return Err(SurfaceError::Malformed(
                        "fence flagged present but has no wait object".to_string(),
                    ));
                }
                fence
            }
            flag => {
                return Err(SurfaceError::Malformed(format!(
                    "bad fence presence flag {}",
                    flag
                )))
            }
        };

        Ok(Self {
            timestamp,
            crop,
            scaling_mode,
            transform,
            fence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::FENCE_FLATTENED_SIZE;

    fn record(fence: Fence) -> QueueBufferInput {
        QueueBufferInput::new(
            1000,
            Rect::new(0, 0, 256, 256),
            ScalingMode::ScaleCrop,
            Transform::ROT_90,
            fence,
        )
    }

    #[test]
    fn test_round_trip_without_fence() {
        let original = record(Fence::no_fence());
        let (buf, fds) = original.to_flattened().unwrap();
        assert!(fds.is_empty());
        assert_eq!(QueueBufferInput::unflatten(&buf, &fds).unwrap(), original);
    }

    #[test]
    fn test_round_trip_with_fence() {
        let original = record(Fence::new(Descriptor::new(12)));
        let (buf, fds) = original.to_flattened().unwrap();
        assert_eq!(fds, vec![Descriptor::new(12)]);
        assert_eq!(QueueBufferInput::unflatten(&buf, &fds).unwrap(), original);
    }

    #[test]
    fn test_size_matches_bytes_written() {
        for fence in [Fence::no_fence(), Fence::new(Descriptor::new(3))] {
            let value = record(fence);
            let (buf, _) = value.to_flattened().unwrap();
            assert_eq!(value.flattened_size(), buf.len());
        }
        assert_eq!(record(Fence::no_fence()).flattened_size(), 33);
        assert_eq!(
            record(Fence::new(Descriptor::new(3))).flattened_size(),
            33 + FENCE_FLATTENED_SIZE
        );
    }

    #[test]
    fn test_field_layout() {
        let (buf, _) = record(Fence::no_fence()).to_flattened().unwrap();
        assert_eq!(&buf[0..8], &1000i64.to_le_bytes());
        assert_eq!(&buf[16..20], &256i32.to_le_bytes());
        assert_eq!(&buf[24..28], &2i32.to_le_bytes());
        assert_eq!(&buf[28..32], &4u32.to_le_bytes());
        assert_eq!(buf[32], 0);
    }

    #[test]
    fn test_flatten_rejects_small_buffer() {
        let value = record(Fence::new(Descriptor::new(3)));
        let mut buf = vec![0u8; QUEUE_INPUT_FIXED_SIZE];
        let mut fds = vec![Descriptor::INVALID; 1];
        assert!(matches!(
            value.flatten(&mut buf, &mut fds),
            Err(SurfaceError::NotEnoughData { .. })
        ));
    }

    #[test]
    fn test_unflatten_truncated_fence_body() {
        let value = record(Fence::new(Descriptor::new(3)));
        let (buf, fds) = value.to_flattened().unwrap();
        let result = QueueBufferInput::unflatten(&buf[..QUEUE_INPUT_FIXED_SIZE + 2], &fds);
        assert!(matches!(result, Err(SurfaceError::NotEnoughData { .. })));
    }

    #[test]
    fn test_unflatten_takes_fence_from_side_channel() {
        let value = record(Fence::new(Descriptor::new(3)));
        let (buf, _) = value.to_flattened().unwrap();
        let result = QueueBufferInput::unflatten(&buf, &[]);
        assert!(matches!(result, Err(SurfaceError::MissingDescriptor { .. })));
    }

    #[test]
    fn test_unflatten_rejects_present_but_invalid_fence() {
        let (mut buf, _) = record(Fence::no_fence()).to_flattened().unwrap();
        buf[32] = 1;
        buf.extend_from_slice(&0u32.to_le_bytes());
        let err = QueueBufferInput::unflatten(&buf, &[]).unwrap_err();
        assert!(err.to_string().contains("no wait object"));
    }

    #[test]
    fn test_unflatten_rejects_bad_presence_flag() {
        let (mut buf, _) = record(Fence::no_fence()).to_flattened().unwrap();
        buf[32] = 7;
        assert!(QueueBufferInput::unflatten(&buf, &[]).is_err());
    }

    #[test]
    fn test_unflatten_rejects_unknown_scaling_mode() {
        let (mut buf, _) = record(Fence::no_fence()).to_flattened().unwrap();
        buf[24..28].copy_from_slice(&9i32.to_le_bytes());
        let err = QueueBufferInput::unflatten(&buf, &[]).unwrap_err();
        assert!(err.to_string().contains("scaling mode"));
    }
}
