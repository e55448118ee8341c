//! Output buffer for the tagged stream.
//!
//! Uses `bytes::BytesMut`; multi-byte numbers honour the configured
//! [`Endianness`]. Strings and blobs carry a 7-bit variable-length byte
//! count, low groups first.

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::{Endianness, Tag};

/// Default buffer capacity (4KB).
pub const DEFAULT_WRITER_CAPACITY: usize = 4 * 1024;

macro_rules! put_number {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $le:ident, $be:ident) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(&mut self, value: $ty) {
            match self.endianness {
                Endianness::Little => self.buf.$le(value),
                Endianness::Big => self.buf.$be(value),
            }
        }
    };
}

/// Append-only writer for one serialization call.
#[derive(Debug)]
pub struct WireWriter {
    buf: BytesMut,
    endianness: Endianness,
}

impl WireWriter {
    /// Create a writer with default capacity.
    pub fn new(endianness: Endianness) -> Self {
        Self::with_capacity(endianness, DEFAULT_WRITER_CAPACITY)
    }

    /// Create a writer with a specific capacity.
    pub fn with_capacity(endianness: Endianness, capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            endianness,
        }
    }

    /// Byte order used for numbers.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// View of the bytes written so far.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Current write position, for [`truncate`](Self::truncate).
    #[inline]
    pub fn mark(&self) -> usize {
        self.buf.len()
    }

    /// Discard everything written after `mark`.
    #[inline]
    pub fn truncate(&mut self, mark: usize) {
        self.buf.truncate(mark);
    }

    /// Write a record tag.
    #[inline]
    pub fn put_tag(&mut self, tag: Tag) {
        self.buf.put_u8(tag.as_byte());
    }

    /// Write a single unsigned byte.
    #[inline]
    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Write a single signed byte.
    #[inline]
    pub fn put_i8(&mut self, value: i8) {
        self.buf.put_i8(value);
    }

    put_number!(put_u16, u16, put_u16_le, put_u16);
    put_number!(put_i16, i16, put_i16_le, put_i16);
    put_number!(put_u32, u32, put_u32_le, put_u32);
    put_number!(
        /// Write a 32-bit signed integer (resumption points, counts, temporal components).
        put_i32, i32, put_i32_le, put_i32
    );
    put_number!(put_u64, u64, put_u64_le, put_u64);
    put_number!(put_i64, i64, put_i64_le, put_i64);
    put_number!(put_f32, f32, put_f32_le, put_f32);
    put_number!(put_f64, f64, put_f64_le, put_f64);

    /// Write a 7-bit variable-length unsigned count.
    pub fn put_var_len(&mut self, len: usize) {
        let mut value = len as u64;
        while value >= 0x80 {
            self.buf.put_u8((value as u8) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn put_string(&mut self, value: &str) {
        self.put_bytes(value.as_bytes());
    }

    /// Write a length-prefixed byte blob.
    pub fn put_bytes(&mut self, data: &[u8]) {
        self.put_var_len(data.len());
        self.buf.put_slice(data);
    }

    /// Write bytes with no prefix.
    #[inline]
    pub fn put_raw(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Finish writing and hand out the buffer.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_follow_endianness() {
        let mut le = WireWriter::new(Endianness::Little);
        le.put_i32(0x0102_0304);
        assert_eq!(le.as_slice(), &[0x04, 0x03, 0x02, 0x01]);

        let mut be = WireWriter::new(Endianness::Big);
        be.put_i32(0x0102_0304);
        assert_eq!(be.as_slice(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_var_len_encoding() {
        let mut w = WireWriter::new(Endianness::Little);
        w.put_var_len(0);
        w.put_var_len(127);
        w.put_var_len(128);
        w.put_var_len(300);
        assert_eq!(w.as_slice(), &[0x00, 0x7F, 0x80, 0x01, 0xAC, 0x02]);
    }

    #[test]
    fn test_string_is_length_prefixed() {
        let mut w = WireWriter::new(Endianness::Big);
        w.put_string("abc");
        assert_eq!(w.as_slice(), &[3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_mark_and_truncate() {
        let mut w = WireWriter::new(Endianness::Little);
        w.put_tag(Tag::StateMachine);
        let mark = w.mark();
        w.put_i64(-1);
        assert_eq!(w.len(), 9);
        w.truncate(mark);
        assert_eq!(w.as_slice(), &[Tag::StateMachine.as_byte()]);
    }

    #[test]
    fn test_freeze() {
        let mut w = WireWriter::with_capacity(Endianness::Little, 8);
        assert!(w.is_empty());
        w.put_u8(7);
        let bytes = w.freeze();
        assert_eq!(&bytes[..], &[7]);
    }
}
