//! Descriptor tokens carried in a parcel's side channel.

use std::fmt;

/// Opaque token for a file/descriptor-like object.
///
/// Descriptors never travel in the byte area of a parcel; they are appended
/// to its side channel and picked up in order by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Descriptor(i32);

impl Descriptor {
    /// Placeholder used to pre-size descriptor slices.
    pub const INVALID: Descriptor = Descriptor(-1);

    pub fn new(raw: i32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> i32 {
        self.0
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity() {
        assert!(Descriptor::new(0).is_valid());
        assert!(Descriptor::new(42).is_valid());
        assert!(!Descriptor::INVALID.is_valid());
        assert!(!Descriptor::new(-7).is_valid());
    }
}
