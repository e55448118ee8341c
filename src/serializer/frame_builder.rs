//! Decode side: rebuilds a frame chain from the tagged stream.
//!
//! Mirrors [`FrameWalker`](super::walker::FrameWalker): the shape resolved
//! from each identity record decides what the next record must be.

use crate::codec::ValueCodec;
use crate::error::{Result, TaskwireError};
use crate::frame::{CapturedSlot, ContinuationFrame, Dependency, SlotRole, TargetIdentity};
use crate::protocol::{validate_header, Endianness, Tag, WireReader, STREAM_HEADER_SIZE};
use crate::resolver::ShapeResolver;

/// One deserialize call over a byte slice.
pub(crate) struct FrameBuilder<'s> {
    pub(crate) resolver: &'s dyn ShapeResolver,
    pub(crate) codec: ValueCodec<'s>,
    pub(crate) max_depth: usize,
}

impl<'s> FrameBuilder<'s> {
    /// Validate the header of `bytes` and rebuild the chain.
    ///
    /// Trailing bytes after the outermost frame are malformed.
    pub(crate) fn build(&self, bytes: &[u8], endianness: Endianness) -> Result<ContinuationFrame> {
        validate_header(bytes, endianness)?;
        let mut input = WireReader::new(bytes, endianness);
        input.skip(STREAM_HEADER_SIZE)?;

        let frame = self.read_frame(&mut input, 1)?;
        if !input.is_empty() {
            return Err(TaskwireError::malformed(
                input.position(),
                frame.target().to_string(),
                format!("{} trailing bytes after frame chain", input.remaining()),
            ));
        }
        Ok(frame)
    }

    fn read_frame(&self, input: &mut WireReader<'_>, depth: usize) -> Result<ContinuationFrame> {
        if depth > self.max_depth {
            return Err(TaskwireError::ChainTooDeep {
                limit: self.max_depth,
            });
        }

        let start = input.position();
        input
            .expect_tag(Tag::StateMachine)
            .map_err(|e| e.in_context(|| "frame record".to_string()))?;
        let target = TargetIdentity::decode(input)?;

        let resolved = self.resolver.resolve(&target).ok_or_else(|| {
            TaskwireError::malformed(start, target.to_string(), "no shape registered for target")
        })?;
        let factory = resolved.factory.as_ref().ok_or_else(|| {
            TaskwireError::malformed(start, target.to_string(), "shape has no frame factory")
        })?;
        let shape = resolved.shape.as_ref();
        shape.classify()?;

        tracing::trace!(target_id = %target, depth, offset = start, "reading frame");

        let mut frame = factory.instantiate(shape);
        for slot in shape.slots().iter().filter(|s| !s.role().is_skipped()) {
            let in_slot = |e: TaskwireError| e.for_slot(&target, slot.name());
            match slot.role() {
                SlotRole::Continuation => {
                    let at = input.position();
                    let marker = input.read_tag().map_err(in_slot)?;
                    if !marker.is_dependency_marker() {
                        return Err(in_slot(TaskwireError::malformed(
                            at,
                            "",
                            format!("expected dependency marker, found {} tag", marker),
                        )));
                    }
                    let dependency = match marker {
                        Tag::NoStateMachine => Dependency::None,
                        Tag::EndOfStateStream => Dependency::Opaque,
                        _ => Dependency::Nested(Box::new(self.read_frame(input, depth + 1)?)),
                    };
                    frame.set_dependency(dependency);
                }
                SlotRole::ResumptionPoint => {
                    input.expect_tag(Tag::StateVariable).map_err(in_slot)?;
                    frame.set_resumption_point(input.read_i32().map_err(in_slot)?);
                }
                // owner or local
                _ => {
                    let kind = slot.kind().ok_or_else(|| {
                        TaskwireError::unclassifiable(&target, slot.name(), "value slot has no declared kind")
                    })?;
                    let value = self.codec.decode(input, kind).map_err(in_slot)?;
                    frame.push_slot(CapturedSlot::new(slot.name(), kind.clone(), value));
                }
            }
        }
        Ok(frame)
    }
}
