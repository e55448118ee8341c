//! Cursor over a tagged stream.
//!
//! Every failed read reports the byte offset where it started, so a
//! `MalformedStream` error points at the record that broke.

use super::wire_format::{Endianness, Tag};
use crate::error::{Result, TaskwireError};

/// Longest 7-bit encoded length accepted (fits in u32).
const MAX_VAR_LEN_BYTES: usize = 5;

macro_rules! read_number {
    ($name:ident, $ty:ty) => {
        #[inline]
        pub fn $name(&mut self) -> Result<$ty> {
            let bytes = self.array(stringify!($ty))?;
            Ok(match self.endianness {
                Endianness::Little => <$ty>::from_le_bytes(bytes),
                Endianness::Big => <$ty>::from_be_bytes(bytes),
            })
        }
    };
}

/// Borrowing reader for one deserialization call.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    endianness: Endianness,
}

impl<'a> WireReader<'a> {
    /// Create a reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8], endianness: Endianness) -> Self {
        Self {
            buf,
            pos: 0,
            endianness,
        }
    }

    /// Byte order used for numbers.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Current byte offset.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whether the stream is exhausted.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Skip `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n, "skip").map(|_| ())
    }

    /// Consume exactly `n` bytes.
    pub fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(TaskwireError::malformed(
                self.pos,
                what,
                format!(
                    "unexpected end of stream: need {} bytes, have {}",
                    n,
                    self.remaining()
                ),
            ));
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..self.pos])
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let bytes = self.take(N, what)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Read one unsigned byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>("u8")?[0])
    }

    /// Read one signed byte.
    #[inline]
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    read_number!(read_u16, u16);
    read_number!(read_i16, i16);
    read_number!(read_u32, u32);
    read_number!(read_i32, i32);
    read_number!(read_u64, u64);
    read_number!(read_i64, i64);
    read_number!(read_f32, f32);
    read_number!(read_f64, f64);

    /// Read a record tag. Unknown bytes are malformed.
    pub fn read_tag(&mut self) -> Result<Tag> {
        let start = self.pos;
        let byte = self.read_u8()?;
        Tag::from_byte(byte).ok_or_else(|| {
            TaskwireError::malformed(start, "tag", format!("unknown tag byte 0x{:02X}", byte))
        })
    }

    /// Read a tag and require it to be `expected`.
    pub fn expect_tag(&mut self, expected: Tag) -> Result<()> {
        let start = self.pos;
        let found = self.read_tag()?;
        if found != expected {
            return Err(TaskwireError::malformed(
                start,
                "tag",
                format!("expected {} tag, found {}", expected, found),
            ));
        }
        Ok(())
    }

    /// Read a 7-bit variable-length count.
    pub fn read_var_len(&mut self) -> Result<usize> {
        let start = self.pos;
        let mut value: u64 = 0;
        for i in 0..MAX_VAR_LEN_BYTES {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                if value > u64::from(u32::MAX) {
                    break;
                }
                return Ok(value as usize);
            }
        }
        Err(TaskwireError::malformed(
            start,
            "length prefix",
            "length does not fit in 32 bits",
        ))
    }

    /// Read a length-prefixed byte blob.
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_var_len()?;
        self.take(len, "blob")
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.pos;
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| TaskwireError::malformed(start, "string", format!("invalid UTF-8: {}", e)))
    }
}
