//! Encode side: walks a live chain into the tagged stream.
//!
//! Per frame:
//! ```text
//! StateMachine | identity | slot records in shape order
//! ```
//! The continuation slot becomes `NoStateMachine`, `EndOfStateStream` or
//! `SubStateMachine` followed by the nested frame record.

use crate::codec::{Value, ValueCodec};
use crate::error::{Result, TaskwireError};
use crate::frame::{FrameShape, SlotRole};
use crate::live::{LiveChainAccessor, LiveDependency, LiveFrame};
use crate::protocol::{encode_header, Tag, WireWriter};
use crate::resolver::ShapeResolver;

/// One serialize call over a live chain.
pub(crate) struct FrameWalker<'s, A: LiveChainAccessor> {
    pub(crate) resolver: &'s dyn ShapeResolver,
    pub(crate) codec: ValueCodec<'s>,
    pub(crate) accessor: &'s A,
    pub(crate) max_depth: usize,
}

impl<'s, A: LiveChainAccessor> FrameWalker<'s, A> {
    /// Write the stream header, then the whole chain rooted at `handle`.
    pub(crate) fn walk(&self, handle: &A::Handle, out: &mut WireWriter) -> Result<()> {
        out.put_raw(&encode_header(out.endianness()));
        self.write_frame(handle, out, 1)
    }

    fn write_frame(&self, handle: &A::Handle, out: &mut WireWriter, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(TaskwireError::ChainTooDeep {
                limit: self.max_depth,
            });
        }

        let live = self.accessor.capture(handle)?;
        let resolved = self.resolver.resolve(&live.target).ok_or_else(|| {
            TaskwireError::unclassifiable(&live.target, "<shape>", "no shape registered for target")
        })?;
        let shape = resolved.shape.as_ref();
        shape.classify()?;
        let values = bind_slots(shape, &live)?;

        tracing::trace!(target_id = %live.target, depth, state = live.resumption_point, "writing frame");

        out.put_tag(Tag::StateMachine);
        live.target.encode(out)?;

        let mut values = values.into_iter();
        for slot in shape.slots().iter().filter(|s| !s.role().is_skipped()) {
            match slot.role() {
                SlotRole::Continuation => self.write_dependency(&live.dependency, out, depth)?,
                SlotRole::ResumptionPoint => {
                    out.put_tag(Tag::StateVariable);
                    out.put_i32(live.resumption_point);
                }
                // owner or local
                _ => {
                    let value = values.next().flatten();
                    let kind = slot.kind().ok_or_else(|| {
                        TaskwireError::unclassifiable(&live.target, slot.name(), "value slot has no declared kind")
                    })?;
                    self.codec
                        .encode(out, kind, value)
                        .map_err(|e| e.for_slot(&live.target, slot.name()))?;
                }
            }
        }
        Ok(())
    }

    fn write_dependency(
        &self,
        dependency: &LiveDependency<A::Handle>,
        out: &mut WireWriter,
        depth: usize,
    ) -> Result<()> {
        match dependency {
            LiveDependency::None => {
                tracing::trace!(depth, "no dependency");
                out.put_tag(Tag::NoStateMachine);
            }
            LiveDependency::Opaque => {
                tracing::trace!(depth, "opaque dependency, chain ends");
                out.put_tag(Tag::EndOfStateStream);
            }
            LiveDependency::Nested(next) => {
                out.put_tag(Tag::SubStateMachine);
                self.write_frame(next, out, depth + 1)?;
            }
        }
        Ok(())
    }
}

/// Match the physical slots of `live` against the shape's value slots.
///
/// Returns one entry per owner/local slot, in shape order. Every physical
/// slot must be a declared owner or local, and every declared one must be
/// present.
fn bind_slots<'l, H>(shape: &FrameShape, live: &'l LiveFrame<H>) -> Result<Vec<Option<&'l Value>>> {
    for (i, physical) in live.slots.iter().enumerate() {
        let reason = match shape.slot(&physical.name) {
            None => Some("slot is not declared in the shape"),
            Some(declared) if !declared.role().carries_value() => {
                Some("slot is declared without a value")
            }
            Some(_) if live.slots[..i].iter().any(|s| s.name == physical.name) => {
                Some("slot reported twice")
            }
            Some(_) => None,
        };
        if let Some(reason) = reason {
            return Err(TaskwireError::unclassifiable(&live.target, physical.name.as_str(), reason));
        }
    }

    shape
        .value_slots()
        .map(|declared| {
            live.slots
                .iter()
                .find(|s| s.name == declared.name())
                .map(|s| s.value.as_ref())
                .ok_or_else(|| {
                    TaskwireError::unclassifiable(
                        &live.target,
                        declared.name(),
                        format!("declared {} slot is missing from the frame", declared.role()),
                    )
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ValueKind;
    use crate::frame::{ContinuationFrame, Dependency, TargetIdentity};
    use crate::live::FrameAccessor;
    use crate::protocol::Endianness;
    use crate::resolver::ShapeRegistry;

    fn target(member: &str) -> TargetIdentity {
        TargetIdentity::new("T", member)
    }

    fn registry() -> ShapeRegistry {
        let mut registry = ShapeRegistry::new();
        for member in ["a", "b"] {
            registry.register(
                FrameShape::builder(target(member))
                    .continuation("builder")
                    .resumption_point("state")
                    .local("x", ValueKind::I32)
                    .build(),
            );
        }
        registry
    }

    fn walk(registry: &ShapeRegistry, frame: &ContinuationFrame, max_depth: usize) -> Result<Vec<u8>> {
        let accessor = FrameAccessor::new();
        let walker = FrameWalker {
            resolver: registry,
            codec: ValueCodec::new(),
            accessor: &accessor,
            max_depth,
        };
        let mut out = WireWriter::new(Endianness::Little);
        walker.walk(&frame, &mut out)?;
        Ok(out.as_slice().to_vec())
    }

    #[test]
    fn test_single_frame_layout() {
        let frame = ContinuationFrame::new(target("a"))
            .with_resumption_point(1)
            .with_slot("x", ValueKind::I32, Value::I32(-1));
        let bytes = walk(&registry(), &frame, 8).unwrap();
        assert_eq!(
            bytes,
            vec![
                0, // little endian
                5, 1, b'T', 1, b'a', 0, 0, 0, 0, // StateMachine + identity
                4, // NoStateMachine
                2, 1, 0, 0, 0, // StateVariable 1
                7, 0xFF, 0xFF, 0xFF, 0xFF, // Value -1
            ]
        );
    }

    #[test]
    fn test_nested_frame_follows_marker() {
        let frame = ContinuationFrame::new(target("a"))
            .with_slot("x", ValueKind::I32, None::<Value>)
            .awaiting(
                ContinuationFrame::new(target("b"))
                    .with_slot("x", ValueKind::I32, Value::I32(0))
                    .with_dependency(Dependency::Opaque),
            );
        let bytes = walk(&registry(), &frame, 8).unwrap();
        // header, StateMachine and identity take 10 bytes
        assert_eq!(bytes[10], Tag::SubStateMachine.as_byte());
        assert_eq!(bytes[11], Tag::StateMachine.as_byte());
        assert!(bytes.contains(&Tag::EndOfStateStream.as_byte()));
        assert_eq!(*bytes.last().unwrap(), Tag::NullValue.as_byte());
    }

    #[test]
    fn test_depth_limit() {
        let frame = ContinuationFrame::new(target("a"))
            .with_slot("x", ValueKind::I32, Value::I32(0))
            .awaiting(ContinuationFrame::new(target("b")).with_slot("x", ValueKind::I32, Value::I32(0)));
        assert!(walk(&registry(), &frame, 2).is_ok());
        let err = walk(&registry(), &frame, 1).unwrap_err();
        assert!(matches!(err, TaskwireError::ChainTooDeep { limit: 1 }));
    }

    #[test]
    fn test_unknown_target() {
        let frame = ContinuationFrame::new(target("zzz"));
        let err = walk(&registry(), &frame, 8).unwrap_err();
        assert!(matches!(err, TaskwireError::UnclassifiableSlot { ref slot, .. } if slot == "<shape>"));
    }

    #[test]
    fn test_undeclared_physical_slot() {
        let frame = ContinuationFrame::new(target("a"))
            .with_slot("x", ValueKind::I32, Value::I32(0))
            .with_slot("ghost", ValueKind::I32, Value::I32(0));
        let err = walk(&registry(), &frame, 8).unwrap_err();
        assert!(matches!(err, TaskwireError::UnclassifiableSlot { ref slot, .. } if slot == "ghost"));
    }

    #[test]
    fn test_missing_declared_slot() {
        let frame = ContinuationFrame::new(target("a"));
        let err = walk(&registry(), &frame, 8).unwrap_err();
        match err {
            TaskwireError::UnclassifiableSlot { slot, reason, .. } => {
                assert_eq!(slot, "x");
                assert!(reason.contains("missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_kind_mismatch_names_slot() {
        let frame = ContinuationFrame::new(target("a")).with_slot("x", ValueKind::I64, Value::I64(1));
        let err = walk(&registry(), &frame, 8).unwrap_err();
        match err {
            TaskwireError::UnsupportedValueKind { target, slot, .. } => {
                assert_eq!(target, "T::a()");
                assert_eq!(slot, "x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
