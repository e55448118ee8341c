//! MessagePack support for extension kinds.
//!
//! [`MsgPackCodec`] wraps `rmp-serde` with struct-as-map output
//! (`to_vec_named`), so payloads stay readable by field name when a shape
//! gains or reorders fields. [`MsgPackExtension`] is a ready-made
//! [`ExtensionHook`] that carries such payloads as length-prefixed blobs and
//! validates them against the registered Rust type in both directions.
//!
//! # Example
//!
//! ```
//! use taskwire::codec::{ExtensionValue, MsgPackExtension};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Cursor {
//!     page: u32,
//!     token: String,
//! }
//!
//! let hook = MsgPackExtension::new().register::<Cursor>("cursor");
//! assert!(hook.accepts("cursor"));
//!
//! let value = ExtensionValue::from_serde("cursor", &Cursor { page: 3, token: "t".into() }).unwrap();
//! let back: Cursor = value.to_serde().unwrap();
//! assert_eq!(back.page, 3);
//! ```

use std::collections::HashMap;
use std::fmt;

use super::value::{ExtensionValue, Value};
use super::value_codec::{extension_from_slice, ExtensionHook};
use crate::error::{Result, TaskwireError};
use crate::protocol::{WireReader, WireWriter};

/// MessagePack codec for extension payloads.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map).
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

type Validator = Box<dyn Fn(&[u8]) -> Result<()> + Send + Sync>;

/// Extension hook for serde types carried as MessagePack.
///
/// Each accepted kind name is bound to a Rust type; payloads that do not
/// decode as that type are rejected on encode and on decode.
#[derive(Default)]
pub struct MsgPackExtension {
    kinds: HashMap<String, Validator>,
}

impl MsgPackExtension {
    /// Create a hook that accepts nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `kind`, validating payloads as `T`.
    pub fn register<T>(mut self, kind: &str) -> Self
    where
        T: serde::de::DeserializeOwned + 'static,
    {
        self.kinds.insert(
            kind.to_string(),
            Box::new(|bytes: &[u8]| MsgPackCodec::decode::<T>(bytes).map(|_| ())),
        );
        self
    }

    /// Whether `kind` is handled by this hook.
    #[inline]
    pub fn accepts(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }
}

impl fmt::Debug for MsgPackExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MsgPackExtension")
            .field("kinds", &self.kinds.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ExtensionHook for MsgPackExtension {
    fn encode(&self, kind: &str, value: &ExtensionValue, out: &mut WireWriter) -> Result<bool> {
        let Some(validate) = self.kinds.get(kind) else {
            return Ok(false);
        };
        validate(value.data())?;
        out.put_bytes(value.data());
        Ok(true)
    }

    fn decode(&self, kind: &str, input: &mut WireReader<'_>) -> Result<Option<Value>> {
        let Some(validate) = self.kinds.get(kind) else {
            return Ok(None);
        };
        let start = input.position();
        let data = input.read_bytes()?;
        validate(data).map_err(|e| {
            TaskwireError::malformed(start, format!("extension `{}`", kind), e.to_string())
        })?;
        Ok(Some(extension_from_slice(kind, data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ValueCodec, ValueKind};
    use crate::protocol::Endianness;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Owner {
        id: u32,
        name: String,
        active: bool,
    }

    fn owner_value() -> Value {
        let owner = Owner {
            id: 42,
            name: "worker".to_string(),
            active: true,
        };
        Value::Extension(ExtensionValue::from_serde("owner", &owner).unwrap())
    }

    #[test]
    fn test_encode_is_struct_as_map() {
        let encoded = MsgPackCodec::encode(&Owner {
            id: 1,
            name: "x".to_string(),
            active: false,
        })
        .unwrap();
        // fixmap with 3 entries, not fixarray
        assert_eq!(encoded[0], 0x83);
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let result: Result<Owner> = MsgPackCodec::decode(b"not valid msgpack");
        assert!(matches!(result, Err(TaskwireError::MsgPackDecode(_))));
    }

    #[test]
    fn test_hook_roundtrip_through_value_codec() {
        let hook = MsgPackExtension::new().register::<Owner>("owner");
        let codec = ValueCodec::with_hook(Some(&hook));
        let kind = ValueKind::extension("owner");
        let value = owner_value();

        let mut w = WireWriter::new(Endianness::native());
        codec.encode(&mut w, &kind, Some(&value)).unwrap();
        let bytes = w.freeze();

        let mut r = WireReader::new(&bytes, Endianness::native());
        let decoded = codec.decode(&mut r, &kind).unwrap().unwrap();
        assert_eq!(decoded, value);
        match decoded {
            Value::Extension(ext) => {
                let owner: Owner = ext.to_serde().unwrap();
                assert_eq!(owner.id, 42);
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_unregistered_kind_is_declined() {
        let hook = MsgPackExtension::new().register::<Owner>("owner");
        assert!(!hook.accepts("cursor"));

        let ext = ExtensionValue::new("cursor", vec![0xC0u8]);
        let mut w = WireWriter::new(Endianness::native());
        assert!(!hook.encode("cursor", &ext, &mut w).unwrap());
        assert!(w.is_empty());

        let bytes = [1u8, 0xC0];
        let mut r = WireReader::new(&bytes, Endianness::native());
        assert!(hook.decode("cursor", &mut r).unwrap().is_none());
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn test_payload_must_match_registered_type() {
        let hook = MsgPackExtension::new().register::<Owner>("owner");
        let wrong = ExtensionValue::from_serde("owner", &"just a string").unwrap();
        let mut w = WireWriter::new(Endianness::native());
        assert!(hook.encode("owner", &wrong, &mut w).is_err());

        let mut w = WireWriter::new(Endianness::native());
        w.put_bytes(&MsgPackCodec::encode(&7u8).unwrap());
        let bytes = w.freeze();
        let mut r = WireReader::new(&bytes, Endianness::native());
        let err = hook.decode("owner", &mut r).unwrap_err();
        assert_eq!(err.offset(), Some(0));
    }

    #[test]
    fn test_debug_lists_kinds() {
        let hook = MsgPackExtension::new().register::<u32>("counter");
        assert!(format!("{:?}", hook).contains("counter"));
    }
}
