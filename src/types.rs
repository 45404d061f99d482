//! Value types used in call arguments and results.

use std::fmt;

use crate::handle::Fence;

/// Rectangle with inclusive left/top and exclusive right/bottom bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle anchored at the origin.
    pub const fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// True if the rectangle covers no area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// True if `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Rect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }
}

/// How the consumer maps buffer content onto its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(i32)]
pub enum ScalingMode {
    /// Content is not scaled; the window freezes until sizes match.
    #[default]
    Freeze = 0,
    /// Content is scaled to the window.
    ScaleToWindow = 1,
    /// Content is cropped and scaled to fill the window.
    ScaleCrop = 2,
}

impl ScalingMode {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ScalingMode::Freeze),
            1 => Some(ScalingMode::ScaleToWindow),
            2 => Some(ScalingMode::ScaleCrop),
            _ => None,
        }
    }

    #[inline]
    pub fn raw(self) -> i32 {
        self as i32
    }
}

/// Transform bitmask applied to buffer content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Transform(pub u32);

impl Transform {
    pub const IDENTITY: Transform = Transform(0);
    pub const FLIP_H: Transform = Transform(0x01);
    pub const FLIP_V: Transform = Transform(0x02);
    pub const ROT_90: Transform = Transform(0x04);
    pub const ROT_180: Transform = Transform(0x03);
    pub const ROT_270: Transform = Transform(0x07);

    /// Bits a transform may carry.
    pub const VALID_MASK: u32 = 0x07;

    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// True if no bits outside [`VALID_MASK`](Self::VALID_MASK) are set.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 & !Self::VALID_MASK == 0
    }
}

/// Producer API claiming the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Api {
    Egl = 1,
    Cpu = 2,
    Media = 3,
    Camera = 4,
}

impl Api {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(Api::Egl),
            2 => Some(Api::Cpu),
            3 => Some(Api::Media),
            4 => Some(Api::Camera),
            _ => None,
        }
    }

    #[inline]
    pub fn raw(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Api::Egl => "egl",
            Api::Cpu => "cpu",
            Api::Media => "media",
            Api::Camera => "camera",
        };
        f.write_str(name)
    }
}

/// Integer properties readable with `query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum QueryKey {
    Width = 0,
    Height = 1,
    Format = 2,
    MinUndequeuedBuffers = 3,
    DefaultWidth = 6,
    DefaultHeight = 7,
    TransformHint = 8,
    ConsumerRunningBehind = 9,
    ConsumerUsageBits = 10,
}

impl QueryKey {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(QueryKey::Width),
            1 => Some(QueryKey::Height),
            2 => Some(QueryKey::Format),
            3 => Some(QueryKey::MinUndequeuedBuffers),
            6 => Some(QueryKey::DefaultWidth),
            7 => Some(QueryKey::DefaultHeight),
            8 => Some(QueryKey::TransformHint),
            9 => Some(QueryKey::ConsumerRunningBehind),
            10 => Some(QueryKey::ConsumerUsageBits),
            _ => None,
        }
    }

    #[inline]
    pub fn raw(self) -> i32 {
        self as i32
    }
}

/// Non-negative status bits returned by a successful dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct DequeueFlags(pub u32);

impl DequeueFlags {
    pub const NONE: DequeueFlags = DequeueFlags(0);
    /// The slot's buffer changed; the producer must request it again.
    pub const BUFFER_NEEDS_REALLOCATION: DequeueFlags = DequeueFlags(0x1);
    /// The pool was reset; the producer must drop every cached buffer.
    pub const RELEASE_ALL_BUFFERS: DequeueFlags = DequeueFlags(0x2);

    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn contains(self, other: DequeueFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: DequeueFlags) {
        self.0 |= other.0;
    }
}

/// Result of a successful dequeue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DequeueOutput {
    /// Reserved slot.
    pub slot: i32,
    /// Wait on this before writing, if valid.
    pub fence: Fence,
    pub flags: DequeueFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_geometry() {
        let r = Rect::new(10, 20, 110, 70);
        assert_eq!(r.width(), 100);
        assert_eq!(r.height(), 50);
        assert!(!r.is_empty());
        assert!(Rect::default().is_empty());
    }

    #[test]
    fn test_rect_contains() {
        let bounds = Rect::from_size(256, 256);
        assert!(bounds.contains(&Rect::new(0, 0, 256, 256)));
        assert!(bounds.contains(&Rect::new(16, 16, 32, 32)));
        assert!(!bounds.contains(&Rect::new(-1, 0, 10, 10)));
        assert!(!bounds.contains(&Rect::new(0, 0, 257, 10)));
    }

    #[test]
    fn test_scaling_mode_raw() {
        assert_eq!(ScalingMode::from_raw(2), Some(ScalingMode::ScaleCrop));
        assert_eq!(ScalingMode::from_raw(3), None);
        assert_eq!(ScalingMode::ScaleToWindow.raw(), 1);
    }

    #[test]
    fn test_transform_validity() {
        assert!(Transform::ROT_270.is_valid());
        assert!(Transform::IDENTITY.is_valid());
        assert!(!Transform(0x08).is_valid());
    }

    #[test]
    fn test_api_and_query_raw() {
        assert_eq!(Api::from_raw(1), Some(Api::Egl));
        assert_eq!(Api::from_raw(0), None);
        assert_eq!(Api::Camera.raw(), 4);
        assert_eq!(QueryKey::from_raw(8), Some(QueryKey::TransformHint));
        assert_eq!(QueryKey::from_raw(4), None);
    }

    #[test]
    fn test_dequeue_flags() {
        let mut flags = DequeueFlags::NONE;
        assert!(!flags.contains(DequeueFlags::BUFFER_NEEDS_REALLOCATION));
        flags.insert(DequeueFlags::BUFFER_NEEDS_REALLOCATION);
        flags.insert(DequeueFlags::RELEASE_ALL_BUFFERS);
        assert_eq!(flags.bits(), 0x3);
        assert!(flags.contains(DequeueFlags::RELEASE_ALL_BUFFERS));
    }
}
