//! Parcel - the message container for calls and replies.
//!
//! A parcel has two parts:
//! - a data area of little-endian fields, each padded to 4 bytes
//! - an ordered side channel of [`Descriptor`]s
//!
//! Writers append to both; readers consume both with independent cursors.
//!
//! Field encodings:
//! ```text
//! i32 / u32 / bool      4 bytes (bool as 0/1)
//! i64                   8 bytes
//! string                i32 byte length, UTF-8 bytes, NUL, pad to 4
//! fixed bytes           raw bytes, pad to 4
//! flattenable           i32 length, i32 descriptor count, bytes padded to 4
//!                       (+ descriptors appended to the side channel)
//! interface token       i32 strict-mode header, string descriptor
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::flatten::Flattenable;
use crate::error::{Result, SurfaceError};
use crate::handle::Descriptor;

/// Alignment of every field in the data area.
pub const PARCEL_ALIGNMENT: usize = 4;

/// Strict-mode header written before the interface descriptor.
pub const STRICT_MODE_HEADER: i32 = 0;

/// Round `len` up to the parcel alignment.
#[inline]
pub fn pad_size(len: usize) -> usize {
    (len + PARCEL_ALIGNMENT - 1) & !(PARCEL_ALIGNMENT - 1)
}

/// Message container with a data area and a descriptor side channel.
#[derive(Debug, Clone, Default)]
pub struct Parcel {
    data: BytesMut,
    read_pos: usize,
    descriptors: Vec<Descriptor>,
    next_descriptor: usize,
}

impl Parcel {
    /// Create an empty parcel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a parcel from received parts, positioned at the start.
    pub fn from_parts(data: &[u8], descriptors: Vec<Descriptor>) -> Self {
        Self {
            data: BytesMut::from(data),
            read_pos: 0,
            descriptors,
            next_descriptor: 0,
        }
    }

    /// Split into the frozen data area and the side channel.
    pub fn into_parts(self) -> (Bytes, Vec<Descriptor>) {
        (self.data.freeze(), self.descriptors)
    }

    /// The whole data area.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Bytes written so far.
    #[inline]
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// Bytes not yet read.
    #[inline]
    pub fn data_avail(&self) -> usize {
        self.data.len() - self.read_pos
    }

    /// Current read offset.
    #[inline]
    pub fn data_position(&self) -> usize {
        self.read_pos
    }

    /// The whole side channel.
    #[inline]
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Reset both read cursors to the start.
    pub fn rewind(&mut self) {
        self.read_pos = 0;
        self.next_descriptor = 0;
    }

    // ------------------------------------------------------------------
    // Writers
    // ------------------------------------------------------------------

    pub fn write_i32(&mut self, value: i32) {
        self.data.put_i32_le(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.data.put_u32_le(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.data.put_i64_le(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_i32(i32::from(value));
    }

    /// Append raw bytes, padded to the parcel alignment.
    pub fn write_fixed(&mut self, bytes: &[u8]) {
        self.data.put_slice(bytes);
        self.pad_to(pad_size(bytes.len()) - bytes.len());
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_i32(value.len() as i32);
        let len = value.len() + 1;
        self.data.put_slice(value.as_bytes());
        self.data.put_u8(0);
        self.pad_to(pad_size(len) - len);
    }

    /// Write the protocol-identity token.
    pub fn write_interface_token(&mut self, descriptor: &str) {
        self.write_i32(STRICT_MODE_HEADER);
        self.write_string(descriptor);
    }

    /// Write a flattenable object, appending its descriptors to the side channel.
    pub fn write_flattenable<T: Flattenable>(&mut self, value: &T) -> Result<()> {
        let (bytes, fds) = value.to_flattened()?;
        self.write_i32(bytes.len() as i32);
        self.write_i32(fds.len() as i32);
        self.write_fixed(&bytes);
        self.descriptors.extend(fds);
        Ok(())
    }

    /// Append a descriptor to the side channel.
    pub fn write_descriptor(&mut self, descriptor: Descriptor) {
        self.descriptors.push(descriptor);
    }

    fn pad_to(&mut self, padding: usize) {
        self.data.put_bytes(0, padding);
    }

    // ------------------------------------------------------------------
    // Readers
    // ------------------------------------------------------------------

    /// Consume `len` bytes plus their padding and return the unpadded span.
    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let padded = pad_size(len);
        let available = self.data_avail();
        if available < padded {
            return Err(SurfaceError::NotEnoughData {
                needed: padded,
                available,
            });
        }
        let start = self.read_pos;
        self.read_pos += padded;
        Ok(&self.data[start..start + len])
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let mut span = self.take(4)?;
        Ok(span.get_i32_le())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut span = self.take(4)?;
        Ok(span.get_u32_le())
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let mut span = self.take(8)?;
        Ok(span.get_i64_le())
    }

    /// Any non-zero value reads as `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_i32()? != 0)
    }

    /// Read `len` raw bytes written by [`write_fixed`](Self::write_fixed).
    pub fn read_fixed(&mut self, len: usize) -> Result<Bytes> {
        let span = self.take(len)?;
        Ok(Bytes::copy_from_slice(span))
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(SurfaceError::Malformed(format!(
                "negative string length {}",
                len
            )));
        }
        let len = len as usize;
        let span = self.take(len + 1)?;
        if span[len] != 0 {
            return Err(SurfaceError::Malformed(
                "string is not NUL terminated".to_string(),
            ));
        }
        String::from_utf8(span[..len].to_vec())
            .map_err(|e| SurfaceError::Malformed(format!("string is not UTF-8: {}", e)))
    }

    /// Read and check the protocol-identity token.
    ///
    /// Anything that does not decode to `expected` is a token mismatch;
    /// the caller must not read further fields.
    pub fn enforce_interface(&mut self, expected: &str) -> Result<()> {
        let actual = self
            .read_i32()
            .and_then(|_strict_mode| self.read_string())
            .unwrap_or_default();
        if actual != expected {
            return Err(SurfaceError::BadInterface {
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }

    /// Read a flattenable object and its descriptors.
    pub fn read_flattenable<T: Flattenable>(&mut self) -> Result<T> {
        let len = self.read_i32()?;
        let count = self.read_i32()?;
        if len < 0 || count < 0 {
            return Err(SurfaceError::Malformed(format!(
                "bad flattenable header: length {}, descriptors {}",
                len, count
            )));
        }
        let fds = self.read_descriptors(count as usize)?;
        let span = self.take(len as usize)?;
        T::unflatten(span, &fds)
    }

    /// Take the next descriptor from the side channel.
    pub fn read_descriptor(&mut self) -> Result<Descriptor> {
        let mut fds = self.read_descriptors(1)?;
        fds.pop().ok_or(SurfaceError::MissingDescriptor {
            needed: 1,
            available: 0,
        })
    }

    fn read_descriptors(&mut self, count: usize) -> Result<Vec<Descriptor>> {
        let available = self.descriptors.len() - self.next_descriptor;
        if available < count {
            return Err(SurfaceError::MissingDescriptor {
                needed: count,
                available,
            });
        }
        let start = self.next_descriptor;
        self.next_descriptor += count;
        Ok(self.descriptors[start..start + count].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{Fence, GraphicBuffer};

    #[test]
    fn test_pad_size() {
        assert_eq!(pad_size(0), 0);
        assert_eq!(pad_size(1), 4);
        assert_eq!(pad_size(4), 4);
        assert_eq!(pad_size(33), 36);
    }

    #[test]
    fn test_scalar_fields_in_order() {
        let mut parcel = Parcel::new();
        parcel.write_i32(-5);
        parcel.write_u32(7);
        parcel.write_i64(1_000_000_000_000);
        parcel.write_bool(true);
        assert_eq!(parcel.data_size(), 4 + 4 + 8 + 4);

        assert_eq!(parcel.read_i32().unwrap(), -5);
        assert_eq!(parcel.read_u32().unwrap(), 7);
        assert_eq!(parcel.read_i64().unwrap(), 1_000_000_000_000);
        assert!(parcel.read_bool().unwrap());
        assert_eq!(parcel.data_avail(), 0);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut parcel = Parcel::new();
        parcel.write_i32(0x0102_0304);
        assert_eq!(parcel.data(), &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_string_is_padded() {
        let mut parcel = Parcel::new();
        parcel.write_string("abc");
        // 4 length + "abc\0"
        assert_eq!(parcel.data_size(), 8);
        parcel.write_string("abcd");
        // 4 length + "abcd\0" padded to 8
        assert_eq!(parcel.data_size(), 8 + 12);

        assert_eq!(parcel.read_string().unwrap(), "abc");
        assert_eq!(parcel.read_string().unwrap(), "abcd");
    }

    #[test]
    fn test_fixed_bytes_are_padded() {
        let mut parcel = Parcel::new();
        parcel.write_fixed(&[1, 2, 3, 4, 5]);
        parcel.write_i32(9);
        assert_eq!(parcel.data_size(), 12);
        assert_eq!(&parcel.read_fixed(5).unwrap()[..], &[1, 2, 3, 4, 5]);
        assert_eq!(parcel.read_i32().unwrap(), 9);
    }

    #[test]
    fn test_read_past_end() {
        let mut parcel = Parcel::new();
        parcel.write_i32(1);
        parcel.read_i32().unwrap();
        let err = parcel.read_i32().unwrap_err();
        assert!(matches!(
            err,
            SurfaceError::NotEnoughData {
                needed: 4,
                available: 0
            }
        ));
    }

    #[test]
    fn test_interface_token_enforced() {
        let mut parcel = Parcel::new();
        parcel.write_interface_token("surfacewire.Test");
        parcel.write_i32(3);

        assert!(parcel.enforce_interface("surfacewire.Test").is_ok());
        assert_eq!(parcel.read_i32().unwrap(), 3);
    }

    #[test]
    fn test_interface_token_mismatch() {
        let mut parcel = Parcel::new();
        parcel.write_interface_token("other.Protocol");

        let err = parcel.enforce_interface("surfacewire.Test").unwrap_err();
        match err {
            SurfaceError::BadInterface { expected, actual } => {
                assert_eq!(expected, "surfacewire.Test");
                assert_eq!(actual, "other.Protocol");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_interface_token_garbage() {
        let mut parcel = Parcel::new();
        parcel.write_i32(0);
        parcel.write_i32(1000);

        let err = parcel.enforce_interface("surfacewire.Test").unwrap_err();
        assert!(matches!(err, SurfaceError::BadInterface { .. }));
    }

    #[test]
    fn test_flattenable_uses_side_channel() {
        let fence = Fence::new(Descriptor::new(17));
        let mut parcel = Parcel::new();
        parcel.write_flattenable(&fence).unwrap();
        parcel.write_i32(99);

        assert_eq!(parcel.descriptors(), &[Descriptor::new(17)]);
        assert!(!parcel.data().contains(&17));

        let back: Fence = parcel.read_flattenable().unwrap();
        assert_eq!(back, fence);
        assert_eq!(parcel.read_i32().unwrap(), 99);
    }

    #[test]
    fn test_descriptors_consumed_in_order() {
        let mut parcel = Parcel::new();
        let first = GraphicBuffer::new(1, 4, 4, 1, 0).with_memory(Descriptor::new(5));
        let second = Fence::new(Descriptor::new(6));
        parcel.write_flattenable(&first).unwrap();
        parcel.write_flattenable(&second).unwrap();

        let a: GraphicBuffer = parcel.read_flattenable().unwrap();
        let b: Fence = parcel.read_flattenable().unwrap();
        assert_eq!(a.memory, Some(Descriptor::new(5)));
        assert_eq!(b.descriptor(), Some(Descriptor::new(6)));
    }

    #[test]
    fn test_missing_side_channel_entry() {
        let mut parcel = Parcel::new();
        parcel.write_flattenable(&Fence::new(Descriptor::new(2))).unwrap();
        let (data, _fds) = parcel.into_parts();

        let mut received = Parcel::from_parts(&data, Vec::new());
        let result: Result<Fence> = received.read_flattenable();
        assert!(matches!(result, Err(SurfaceError::MissingDescriptor { .. })));
    }

    #[test]
    fn test_rewind() {
        let mut parcel = Parcel::new();
        parcel.write_i32(11);
        assert_eq!(parcel.read_i32().unwrap(), 11);
        parcel.rewind();
        assert_eq!(parcel.data_position(), 0);
        assert_eq!(parcel.read_i32().unwrap(), 11);
    }
}
