//! Codec module - slot values and their binary encoding.
//!
//! - [`Value`] / [`ValueKind`] - the closed value taxonomy
//! - [`ValueCodec`] - tag-prefixed encoding of one slot value
//! - [`ExtensionHook`] - the single escape hatch for other kinds
//! - [`MsgPackExtension`] - hook for serde types carried as MessagePack
//!
//! # Example
//!
//! ```
//! use taskwire::codec::{Value, ValueCodec, ValueKind};
//! use taskwire::protocol::{Endianness, WireReader, WireWriter};
//!
//! let codec = ValueCodec::new();
//! let mut out = WireWriter::new(Endianness::Little);
//! codec.encode(&mut out, &ValueKind::I32, Some(&Value::I32(5))).unwrap();
//! let bytes = out.freeze();
//!
//! let mut input = WireReader::new(&bytes, Endianness::Little);
//! assert_eq!(codec.decode(&mut input, &ValueKind::I32).unwrap(), Some(Value::I32(5)));
//! ```

mod msgpack;
mod value;
mod value_codec;

pub use msgpack::{MsgPackCodec, MsgPackExtension};
pub use value::{Decimal, ExtensionValue, Value, ValueKind};
pub use value_codec::{ExtensionHook, ValueCodec};
