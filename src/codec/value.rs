//! The closed value taxonomy carried in frame slots.
//!
//! Every slot declares a [`ValueKind`]; a captured slot holds
//! `Option<Value>` where `None` is the null marker. Anything outside the
//! closed set travels as [`ValueKind::Extension`] and is handled by the
//! serializer's [`ExtensionHook`](super::ExtensionHook).

use std::fmt;

use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use super::MsgPackCodec;
use crate::error::Result;

/// Declared kind of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    String,
    /// Absolute timestamp, millisecond precision.
    DateTime,
    /// Calendar date.
    Date,
    /// Time of day, millisecond precision.
    Time,
    /// Signed duration, millisecond precision.
    Duration,
    /// Anything else, identified by name.
    Extension(String),
}

impl ValueKind {
    /// Shorthand for an extension kind.
    pub fn extension(name: impl Into<String>) -> Self {
        ValueKind::Extension(name.into())
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::U8 => "u8",
            ValueKind::U16 => "u16",
            ValueKind::U32 => "u32",
            ValueKind::U64 => "u64",
            ValueKind::I8 => "i8",
            ValueKind::I16 => "i16",
            ValueKind::I32 => "i32",
            ValueKind::I64 => "i64",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
            ValueKind::Decimal => "decimal",
            ValueKind::String => "string",
            ValueKind::DateTime => "datetime",
            ValueKind::Date => "date",
            ValueKind::Time => "time",
            ValueKind::Duration => "duration",
            ValueKind::Extension(name) => return write!(f, "extension:{}", name),
        };
        f.write_str(name)
    }
}

/// 96-bit scaled decimal.
///
/// Wire layout is four 32-bit words `lo, mid, hi, flags`, with the scale in
/// bits 16..=23 of `flags` and the sign in bit 31.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: u128,
    scale: u8,
    negative: bool,
}

impl Decimal {
    /// Largest supported scale.
    pub const MAX_SCALE: u8 = 28;

    const MANTISSA_LIMIT: u128 = 1 << 96;
    const SCALE_SHIFT: u32 = 16;
    const SIGN_BIT: u32 = 0x8000_0000;
    const FLAGS_MASK: u32 = Self::SIGN_BIT | (0xFF << Self::SCALE_SHIFT);

    /// `mantissa * 10^-scale`. `None` if out of range.
    pub fn new(mantissa: i128, scale: u8) -> Option<Self> {
        let magnitude = mantissa.unsigned_abs();
        if magnitude >= Self::MANTISSA_LIMIT || scale > Self::MAX_SCALE {
            return None;
        }
        Some(Self {
            mantissa: magnitude,
            scale,
            negative: mantissa < 0,
        })
    }

    /// Signed mantissa.
    pub fn mantissa(&self) -> i128 {
        let magnitude = self.mantissa as i128;
        if self.negative {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Number of fractional digits.
    #[inline]
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Sign flag (kept separately so negative zero survives).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Split into the four wire words `lo, mid, hi, flags`.
    pub fn to_words(&self) -> [u32; 4] {
        let lo = self.mantissa as u32;
        let mid = (self.mantissa >> 32) as u32;
        let hi = (self.mantissa >> 64) as u32;
        let mut flags = u32::from(self.scale) << Self::SCALE_SHIFT;
        if self.negative {
            flags |= Self::SIGN_BIT;
        }
        [lo, mid, hi, flags]
    }

    /// Rebuild from the four wire words. `None` if `flags` is invalid.
    pub fn from_words(words: [u32; 4]) -> Option<Self> {
        let [lo, mid, hi, flags] = words;
        if flags & !Self::FLAGS_MASK != 0 {
            return None;
        }
        let scale = ((flags >> Self::SCALE_SHIFT) & 0xFF) as u8;
        if scale > Self::MAX_SCALE {
            return None;
        }
        let mantissa = u128::from(lo) | (u128::from(mid) << 32) | (u128::from(hi) << 64);
        Some(Self {
            mantissa,
            scale,
            negative: flags & Self::SIGN_BIT != 0,
        })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.to_string();
        let scale = usize::from(self.scale);
        let sign = if self.negative { "-" } else { "" };
        if scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (int, frac) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, int, frac)
    }
}

/// Opaque payload of an extension kind.
///
/// The bytes are produced and consumed by the serializer's extension hook;
/// [`from_serde`](Self::from_serde) covers the common case of a serde type
/// encoded as MessagePack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionValue {
    kind: String,
    data: Bytes,
}

impl ExtensionValue {
    /// Wrap already-encoded bytes.
    pub fn new(kind: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            kind: kind.into(),
            data: data.into(),
        }
    }

    /// Encode a serde value as MessagePack (struct-as-map).
    pub fn from_serde<T: serde::Serialize>(kind: impl Into<String>, value: &T) -> Result<Self> {
        Ok(Self::new(kind, MsgPackCodec::encode(value)?))
    }

    /// Decode the payload as a serde value.
    pub fn to_serde<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        MsgPackCodec::decode(&self.data)
    }

    /// Extension kind name.
    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Payload bytes.
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// A non-null slot value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    String(String),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Duration(TimeDelta),
    Extension(ExtensionValue),
}

impl Value {
    /// The kind this value encodes as.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::U8(_) => ValueKind::U8,
            Value::U16(_) => ValueKind::U16,
            Value::U32(_) => ValueKind::U32,
            Value::U64(_) => ValueKind::U64,
            Value::I8(_) => ValueKind::I8,
            Value::I16(_) => ValueKind::I16,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::String(_) => ValueKind::String,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Date(_) => ValueKind::Date,
            Value::Time(_) => ValueKind::Time,
            Value::Duration(_) => ValueKind::Duration,
            Value::Extension(ext) => ValueKind::Extension(ext.kind.clone()),
        }
    }

    /// Whether this value may be stored in a slot declared as `kind`.
    pub fn matches(&self, kind: &ValueKind) -> bool {
        match (self, kind) {
            (Value::Extension(ext), ValueKind::Extension(name)) => ext.kind == *name,
            _ => self.kind() == *kind,
        }
    }

    /// The text payload, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    String => String,
    NaiveDateTime => DateTime,
    NaiveDate => Date,
    NaiveTime => Time,
    TimeDelta => Duration,
    ExtensionValue => Extension,
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}
