//! Wire format tags and the stream header.
//!
//! A serialized chain is a flat, tag-prefixed byte stream:
//! ```text
//! ┌────────┬──────────────┬──────────┬───────────────────────────┐
//! │ Endian │ StateMachine │ Identity │ Slot records (shape order) │
//! │ 1 byte │ 1 byte       │ strings  │ tag + payload ...          │
//! └────────┴──────────────┴──────────┴───────────────────────────┘
//! ```
//!
//! The continuation slot record is one of `NoStateMachine`,
//! `EndOfStateStream`, or `SubStateMachine` followed by a nested frame
//! record (without a second endianness byte). There are no length prefixes
//! at stream or frame level.

use std::fmt;

use crate::error::{Result, TaskwireError};

/// Size of the stream header in bytes.
pub const STREAM_HEADER_SIZE: usize = 1;

/// Default maximum nesting of frames in one chain.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 256;

/// Record tags.
///
/// Byte values are part of the format. 3 and 10 are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// Header: stream written little-endian.
    LittleEndian = 0,
    /// Header: stream written big-endian.
    BigEndian = 1,
    /// Resumption point follows (i32).
    StateVariable = 2,
    /// The frame is not suspended on anything.
    NoStateMachine = 4,
    /// A frame record follows.
    StateMachine = 5,
    /// The frame is suspended on something outside the capture boundary.
    EndOfStateStream = 6,
    /// A value payload follows.
    Value = 7,
    /// A nested frame record follows.
    SubStateMachine = 8,
    /// Null value, no payload.
    NullValue = 9,
}

impl Tag {
    /// Byte written on the wire.
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Map a byte back to a tag.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Tag::LittleEndian,
            1 => Tag::BigEndian,
            2 => Tag::StateVariable,
            4 => Tag::NoStateMachine,
            5 => Tag::StateMachine,
            6 => Tag::EndOfStateStream,
            7 => Tag::Value,
            8 => Tag::SubStateMachine,
            9 => Tag::NullValue,
            _ => return None,
        })
    }

    /// Whether this tag can appear in the continuation slot.
    #[inline]
    pub fn is_dependency_marker(self) -> bool {
        matches!(
            self,
            Tag::NoStateMachine | Tag::EndOfStateStream | Tag::SubStateMachine
        )
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Byte order convention of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the running target.
    #[inline]
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }

    /// Header tag for this convention.
    #[inline]
    pub fn tag(self) -> Tag {
        match self {
            Endianness::Little => Tag::LittleEndian,
            Endianness::Big => Tag::BigEndian,
        }
    }

    /// Convention named by a header tag, if it is one.
    #[inline]
    pub fn from_tag(tag: Tag) -> Option<Self> {
        match tag {
            Tag::LittleEndian => Some(Endianness::Little),
            Tag::BigEndian => Some(Endianness::Big),
            _ => None,
        }
    }
}

impl Default for Endianness {
    fn default() -> Self {
        Self::native()
    }
}

/// Encode the stream header.
#[inline]
pub fn encode_header(endianness: Endianness) -> [u8; STREAM_HEADER_SIZE] {
    [endianness.tag().as_byte()]
}

/// Check a stream header against the expected convention.
///
/// No byte swapping is attempted: the other convention is
/// `IncompatibleEncoding`. A missing header, or a byte that names no
/// convention, is `MalformedStream` at offset 0.
pub fn validate_header(buf: &[u8], expected: Endianness) -> Result<()> {
    let Some(&found) = buf.first() else {
        return Err(TaskwireError::malformed(
            0,
            "stream header",
            "empty stream",
        ));
    };
    let Some(actual) = Tag::from_byte(found).and_then(Endianness::from_tag) else {
        return Err(TaskwireError::malformed(
            0,
            "stream header",
            format!("byte {:#04x} is not an endianness marker", found),
        ));
    };
    if actual != expected {
        return Err(TaskwireError::IncompatibleEncoding {
            expected: expected.tag().as_byte(),
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_byte_values_are_fixed() {
        assert_eq!(Tag::LittleEndian.as_byte(), 0);
        assert_eq!(Tag::BigEndian.as_byte(), 1);
        assert_eq!(Tag::StateVariable.as_byte(), 2);
        assert_eq!(Tag::NoStateMachine.as_byte(), 4);
        assert_eq!(Tag::StateMachine.as_byte(), 5);
        assert_eq!(Tag::EndOfStateStream.as_byte(), 6);
        assert_eq!(Tag::Value.as_byte(), 7);
        assert_eq!(Tag::SubStateMachine.as_byte(), 8);
        assert_eq!(Tag::NullValue.as_byte(), 9);
    }

    #[test]
    fn test_reserved_bytes_are_not_tags() {
        assert_eq!(Tag::from_byte(3), None);
        assert_eq!(Tag::from_byte(10), None);
        assert_eq!(Tag::from_byte(0xFF), None);
        for byte in [0u8, 1, 2, 4, 5, 6, 7, 8, 9] {
            assert_eq!(Tag::from_byte(byte).map(Tag::as_byte), Some(byte));
        }
    }

    #[test]
    fn test_dependency_markers() {
        assert!(Tag::NoStateMachine.is_dependency_marker());
        assert!(Tag::EndOfStateStream.is_dependency_marker());
        assert!(Tag::SubStateMachine.is_dependency_marker());
        assert!(!Tag::StateVariable.is_dependency_marker());
        assert!(!Tag::Value.is_dependency_marker());
    }

    #[test]
    fn test_header_roundtrip_and_mismatch() {
        let header = encode_header(Endianness::Little);
        assert_eq!(header, [0]);
        assert!(validate_header(&header, Endianness::Little).is_ok());

        let err = validate_header(&header, Endianness::Big).unwrap_err();
        match err {
            TaskwireError::IncompatibleEncoding { expected, found } => {
                assert_eq!(expected, 1);
                assert_eq!(found, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_header_is_malformed() {
        let err = validate_header(&[], Endianness::native()).unwrap_err();
        assert_eq!(err.offset(), Some(0));
    }

    #[test]
    fn test_non_endianness_header_is_malformed() {
        for byte in [Tag::StateMachine.as_byte(), 3, 0xFF] {
            let err = validate_header(&[byte], Endianness::Little).unwrap_err();
            assert!(matches!(err, TaskwireError::MalformedStream { .. }), "byte {byte}: {err}");
            assert_eq!(err.offset(), Some(0));
        }
    }

    #[test]
    fn test_native_default_and_tags() {
        let native = Endianness::native();
        assert_eq!(Endianness::default(), native);
        for endianness in [Endianness::Little, Endianness::Big] {
            assert_eq!(Endianness::from_tag(endianness.tag()), Some(endianness));
        }
        assert_eq!(Endianness::from_tag(Tag::Value), None);
    }
}
