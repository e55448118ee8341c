//! Captured state of one suspension level.

use super::identity::TargetIdentity;
use crate::codec::{Value, ValueKind};

/// Resumption point of a routine that has not started running.
pub const NOT_STARTED: i32 = -1;

/// Resumption point of a routine that ran to completion.
pub const FINISHED: i32 = -2;

/// One captured local: `(name, declared kind, value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedSlot {
    name: String,
    kind: ValueKind,
    value: Option<Value>,
}

impl CapturedSlot {
    pub fn new(name: impl Into<String>, kind: ValueKind, value: Option<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// Captured value; `None` is the null marker.
    #[inline]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}

/// What a frame is suspended on.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Dependency {
    /// Nothing further to capture.
    #[default]
    None,
    /// A wait outside the capture boundary. The chain stops here.
    Opaque,
    /// Another captured frame.
    Nested(Box<ContinuationFrame>),
}

impl Dependency {
    /// The nested frame, if any.
    pub fn nested(&self) -> Option<&ContinuationFrame> {
        match self {
            Dependency::Nested(frame) => Some(frame.as_ref()),
            _ => None,
        }
    }

    #[inline]
    pub fn is_opaque(&self) -> bool {
        matches!(self, Dependency::Opaque)
    }
}

/// One level of a captured suspension chain.
///
/// Slots keep their storage order. Encode and decode are positional, so two
/// frames are only interchangeable when their slot order matches.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuationFrame {
    target: TargetIdentity,
    resumption_point: i32,
    slots: Vec<CapturedSlot>,
    dependency: Dependency,
}

impl ContinuationFrame {
    /// An empty, not-yet-started frame for `target`.
    pub fn new(target: TargetIdentity) -> Self {
        Self {
            target,
            resumption_point: NOT_STARTED,
            slots: Vec::new(),
            dependency: Dependency::None,
        }
    }

    pub fn with_resumption_point(mut self, point: i32) -> Self {
        self.resumption_point = point;
        self
    }

    /// Append a captured local.
    pub fn with_slot(mut self, name: &str, kind: ValueKind, value: impl Into<Option<Value>>) -> Self {
        self.push_slot(CapturedSlot::new(name, kind, value.into()));
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependency = dependency;
        self
    }

    /// Suspend this frame on `inner`.
    pub fn awaiting(self, inner: ContinuationFrame) -> Self {
        self.with_dependency(Dependency::Nested(Box::new(inner)))
    }

    #[inline]
    pub fn target(&self) -> &TargetIdentity {
        &self.target
    }

    #[inline]
    pub fn resumption_point(&self) -> i32 {
        self.resumption_point
    }

    #[inline]
    pub fn slots(&self) -> &[CapturedSlot] {
        &self.slots
    }

    #[inline]
    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    /// Look up a slot by name.
    pub fn slot(&self, name: &str) -> Option<&CapturedSlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Value of a named slot; `None` when absent or null.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.slot(name).and_then(CapturedSlot::value)
    }

    pub fn set_resumption_point(&mut self, point: i32) {
        self.resumption_point = point;
    }

    pub fn set_dependency(&mut self, dependency: Dependency) {
        self.dependency = dependency;
    }

    /// Append a slot, or overwrite the value of an existing one.
    pub fn push_slot(&mut self, slot: CapturedSlot) {
        match self.slots.iter_mut().find(|s| s.name == slot.name) {
            Some(existing) => *existing = slot,
            None => self.slots.push(slot),
        }
    }

    /// Iterate this frame and every nested frame, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &ContinuationFrame> {
        std::iter::successors(Some(self), |frame| frame.dependency.nested())
    }

    /// Number of frames in the chain, including this one.
    pub fn depth(&self) -> usize {
        self.chain().count()
    }

    /// The deepest frame of the chain.
    pub fn innermost(&self) -> &ContinuationFrame {
        let mut frame = self;
        while let Some(next) = frame.dependency.nested() {
            frame = next;
        }
        frame
    }
}
