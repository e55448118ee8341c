//! Serializer facade and configuration.
//!
//! The [`SerializerBuilder`] provides a fluent API for wiring a shape
//! resolver and an extension hook. The [`StateMachineSerializer`] runs both
//! directions:
//! 1. Encode: write the endianness header, then walk the live chain
//! 2. Decode: validate the header, then rebuild the chain shape by shape
//!
//! Every call owns its buffer and cursor; a serializer can be shared freely
//! between threads.
//!
//! # Example
//!
//! ```
//! use taskwire::codec::{Value, ValueKind};
//! use taskwire::frame::{ContinuationFrame, FrameShape, TargetIdentity};
//! use taskwire::resolver::ShapeRegistry;
//! use taskwire::StateMachineSerializer;
//!
//! let target = TargetIdentity::new("jobs::Import", "run");
//! let mut registry = ShapeRegistry::new();
//! registry.register(
//!     FrameShape::builder(target.clone())
//!         .resumption_point("state")
//!         .local("x", ValueKind::I32)
//!         .continuation("builder")
//!         .build(),
//! );
//!
//! let serializer = StateMachineSerializer::builder().resolver(registry).build();
//!
//! let frame = ContinuationFrame::new(target)
//!     .with_resumption_point(2)
//!     .with_slot("x", ValueKind::I32, Value::I32(5));
//! let bytes = serializer.serialize_frame(&frame).unwrap();
//! assert_eq!(serializer.deserialize(&bytes).unwrap(), frame);
//! ```

mod frame_builder;
mod walker;

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Bytes;

use crate::codec::{ExtensionHook, ValueCodec};
use crate::error::Result;
use crate::frame::ContinuationFrame;
use crate::live::{FrameAccessor, LiveChainAccessor};
use crate::protocol::{Endianness, WireWriter, DEFAULT_MAX_CHAIN_DEPTH, DEFAULT_WRITER_CAPACITY};
use crate::resolver::{ShapeRegistry, ShapeResolver};

use frame_builder::FrameBuilder;
use walker::FrameWalker;

/// Configuration for a serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializerConfig {
    /// Byte order written, and required when reading.
    pub endianness: Endianness,
    /// Maximum number of frames in one chain.
    pub max_chain_depth: usize,
    /// Output buffer pre-allocation.
    pub initial_capacity: usize,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            endianness: Endianness::native(),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            initial_capacity: DEFAULT_WRITER_CAPACITY,
        }
    }
}

/// Builder for configuring and creating a serializer.
pub struct SerializerBuilder {
    resolver: Option<Arc<dyn ShapeResolver>>,
    hook: Option<Arc<dyn ExtensionHook>>,
    config: SerializerConfig,
}

impl SerializerBuilder {
    /// Create a new serializer builder.
    pub fn new() -> Self {
        Self {
            resolver: None,
            hook: None,
            config: SerializerConfig::default(),
        }
    }

    /// Set the shape resolver.
    ///
    /// Without one, every target is unknown.
    pub fn resolver<R>(mut self, resolver: R) -> Self
    where
        R: ShapeResolver + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Set the hook consulted for extension kinds.
    pub fn extension_hook<H>(mut self, hook: H) -> Self
    where
        H: ExtensionHook + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Set the byte order.
    ///
    /// Default: native
    pub fn endianness(mut self, endianness: Endianness) -> Self {
        self.config.endianness = endianness;
        self
    }

    /// Set the maximum chain depth.
    ///
    /// Default: 256
    pub fn max_chain_depth(mut self, depth: usize) -> Self {
        self.config.max_chain_depth = depth;
        self
    }

    /// Set the output buffer pre-allocation.
    ///
    /// Default: 4KB
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: SerializerConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the serializer.
    pub fn build(self) -> StateMachineSerializer {
        StateMachineSerializer {
            resolver: self.resolver.unwrap_or_else(|| Arc::new(ShapeRegistry::new())),
            hook: self.hook,
            config: self.config,
        }
    }
}

impl Default for SerializerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes suspended computation chains and rebuilds them.
#[derive(Clone)]
pub struct StateMachineSerializer {
    resolver: Arc<dyn ShapeResolver>,
    hook: Option<Arc<dyn ExtensionHook>>,
    config: SerializerConfig,
}

impl StateMachineSerializer {
    /// Create a serializer with default configuration.
    pub fn new<R>(resolver: R) -> Self
    where
        R: ShapeResolver + 'static,
    {
        SerializerBuilder::new().resolver(resolver).build()
    }

    /// Create a new serializer builder.
    pub fn builder() -> SerializerBuilder {
        SerializerBuilder::new()
    }

    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    fn codec(&self) -> ValueCodec<'_> {
        ValueCodec::with_hook(self.hook.as_deref())
    }

    /// Encode the chain rooted at `handle`.
    ///
    /// On error nothing is returned; there is no partial encoding.
    pub fn serialize<A>(&self, accessor: &A, handle: &A::Handle) -> Result<Bytes>
    where
        A: LiveChainAccessor,
    {
        let walker = FrameWalker {
            resolver: self.resolver.as_ref(),
            codec: self.codec(),
            accessor,
            max_depth: self.config.max_chain_depth,
        };
        let mut out = WireWriter::with_capacity(self.config.endianness, self.config.initial_capacity);

        tracing::debug!(endianness = ?self.config.endianness, "serializing chain");
        walker.walk(handle, &mut out)?;
        tracing::debug!(bytes = out.len(), "serialized chain");

        Ok(out.freeze())
    }

    /// Encode the chain rooted at `handle` into `writer`.
    ///
    /// The writer is only touched once the whole chain has encoded. Returns
    /// the number of bytes written.
    pub fn serialize_into<A, W>(&self, accessor: &A, handle: &A::Handle, mut writer: W) -> Result<usize>
    where
        A: LiveChainAccessor,
        W: Write,
    {
        let bytes = self.serialize(accessor, handle)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(bytes.len())
    }

    /// Encode an already captured frame chain.
    pub fn serialize_frame(&self, frame: &ContinuationFrame) -> Result<Bytes> {
        self.serialize(&FrameAccessor::new(), &frame)
    }

    /// Rebuild a frame chain from `bytes`.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<ContinuationFrame> {
        let builder = FrameBuilder {
            resolver: self.resolver.as_ref(),
            codec: self.codec(),
            max_depth: self.config.max_chain_depth,
        };

        tracing::debug!(bytes = bytes.len(), "deserializing chain");
        let frame = builder.build(bytes, self.config.endianness)?;
        tracing::debug!(target_id = %frame.target(), depth = frame.depth(), "deserialized chain");

        Ok(frame)
    }

    /// Read `reader` to its end and rebuild the frame chain.
    pub fn deserialize_from<R: Read>(&self, mut reader: R) -> Result<ContinuationFrame> {
        let mut bytes = Vec::with_capacity(self.config.initial_capacity);
        reader.read_to_end(&mut bytes)?;
        self.deserialize(&bytes)
    }
}

impl fmt::Debug for StateMachineSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachineSerializer")
            .field("config", &self.config)
            .field("extension_hook", &self.hook.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Value, ValueKind};
    use crate::error::TaskwireError;
    use crate::frame::{Dependency, FrameShape, TargetIdentity};

    fn target() -> TargetIdentity {
        TargetIdentity::new("demo::Flow", "run")
    }

    fn registry() -> ShapeRegistry {
        let mut registry = ShapeRegistry::new();
        registry.register(
            FrameShape::builder(target())
                .continuation("builder")
                .resumption_point("state")
                .local("x", ValueKind::I32)
                .build(),
        );
        registry
    }

    fn frame() -> ContinuationFrame {
        ContinuationFrame::new(target())
            .with_resumption_point(4)
            .with_slot("x", ValueKind::I32, Value::I32(11))
            .with_dependency(Dependency::Opaque)
    }

    #[test]
    fn test_default_config() {
        let config = SerializerConfig::default();
        assert_eq!(config.endianness, Endianness::native());
        assert_eq!(config.max_chain_depth, 256);
        assert_eq!(config.initial_capacity, 4096);
    }

    #[test]
    fn test_builder_sets_config() {
        let serializer = StateMachineSerializer::builder()
            .endianness(Endianness::Big)
            .max_chain_depth(3)
            .initial_capacity(64)
            .build();
        assert_eq!(serializer.config().endianness, Endianness::Big);
        assert_eq!(serializer.config().max_chain_depth, 3);
        assert_eq!(serializer.config().initial_capacity, 64);
        assert!(format!("{:?}", serializer).contains("extension_hook: false"));
    }

    #[test]
    fn test_roundtrip_both_endiannesses() {
        for endianness in [Endianness::Little, Endianness::Big] {
            let serializer = StateMachineSerializer::builder()
                .resolver(registry())
                .endianness(endianness)
                .build();
            let bytes = serializer.serialize_frame(&frame()).unwrap();
            assert_eq!(bytes[0], endianness.tag().as_byte());
            assert_eq!(serializer.deserialize(&bytes).unwrap(), frame());
        }
    }

    #[test]
    fn test_io_variants() {
        let serializer = StateMachineSerializer::new(registry());
        let mut sink = Vec::new();
        let written = serializer
            .serialize_into(&FrameAccessor::new(), &&frame(), &mut sink)
            .unwrap();
        assert_eq!(written, sink.len());

        let decoded = serializer.deserialize_from(std::io::Cursor::new(sink)).unwrap();
        assert_eq!(decoded, frame());
    }

    #[test]
    fn test_failed_encode_leaves_writer_untouched() {
        let serializer = StateMachineSerializer::new(registry());
        let bad = ContinuationFrame::new(target()).with_slot("x", ValueKind::String, Value::from("no"));
        let mut sink = Vec::new();
        let err = serializer
            .serialize_into(&FrameAccessor::new(), &&bad, &mut sink)
            .unwrap_err();
        assert!(matches!(err, TaskwireError::UnsupportedValueKind { .. }));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_without_resolver_every_target_is_unknown() {
        let serializer = StateMachineSerializer::builder().build();
        assert!(matches!(
            serializer.serialize_frame(&frame()),
            Err(TaskwireError::UnclassifiableSlot { .. })
        ));
    }

    #[test]
    fn test_empty_input() {
        let serializer = StateMachineSerializer::new(registry());
        assert_eq!(serializer.deserialize(&[]).unwrap_err().offset(), Some(0));
    }
}
