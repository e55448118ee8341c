//! Access to live, parked computations.
//!
//! The serializer never inspects a running computation itself. A
//! [`LiveChainAccessor`] captures one level at a time: its target, resumption
//! point, physical slot values and what it is waiting on. The accessor must
//! only be used while the computation is parked (see [`crate::pause`]).
//!
//! [`FrameAccessor`] serves an already captured [`ContinuationFrame`] chain
//! through the same interface.

use std::marker::PhantomData;

use crate::codec::Value;
use crate::error::Result;
use crate::frame::{ContinuationFrame, Dependency, TargetIdentity};

/// One physical slot of a live frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSlot {
    pub name: String,
    /// `None` is the null marker.
    pub value: Option<Value>,
}

impl LiveSlot {
    pub fn new(name: impl Into<String>, value: impl Into<Option<Value>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// What a live frame is waiting on, in terms of accessor handles.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveDependency<H> {
    None,
    Opaque,
    Nested(H),
}

/// Raw wait state as seen on a parked computation.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitState<H> {
    /// Not waiting on anything.
    Idle,
    /// Waiting on `awaited`, which resumes `continuation` when done.
    Waiting { awaited: H, continuation: Option<H> },
}

impl<H: PartialEq> LiveDependency<H> {
    /// Classify a raw wait state.
    ///
    /// A wait with no continuation, or whose continuation is the awaited
    /// object itself, is the edge of what can be captured.
    pub fn from_wait(wait: WaitState<H>) -> Self {
        match wait {
            WaitState::Idle => LiveDependency::None,
            WaitState::Waiting {
                awaited,
                continuation: Some(next),
            } if next != awaited => LiveDependency::Nested(next),
            WaitState::Waiting { .. } => LiveDependency::Opaque,
        }
    }
}

/// One captured level of a live chain.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveFrame<H> {
    pub target: TargetIdentity,
    pub resumption_point: i32,
    /// Owner and local slots, in any order.
    pub slots: Vec<LiveSlot>,
    pub dependency: LiveDependency<H>,
}

/// Reads the state of parked computations.
pub trait LiveChainAccessor {
    /// Reference to one computation.
    type Handle;

    /// Capture the current state of `handle`.
    fn capture(&self, handle: &Self::Handle) -> Result<LiveFrame<Self::Handle>>;
}

/// Accessor over an already captured frame chain.
///
/// ```
/// use taskwire::frame::{ContinuationFrame, TargetIdentity};
/// use taskwire::live::{FrameAccessor, LiveChainAccessor, LiveDependency};
///
/// let frame = ContinuationFrame::new(TargetIdentity::new("demo::Flow", "run"));
/// let live = FrameAccessor::new().capture(&&frame).unwrap();
/// assert_eq!(live.dependency, LiveDependency::None);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameAccessor<'a> {
    _chain: PhantomData<&'a ContinuationFrame>,
}

impl<'a> FrameAccessor<'a> {
    pub fn new() -> Self {
        Self {
            _chain: PhantomData,
        }
    }
}

impl<'a> LiveChainAccessor for FrameAccessor<'a> {
    type Handle = &'a ContinuationFrame;

    fn capture(&self, handle: &Self::Handle) -> Result<LiveFrame<Self::Handle>> {
        let frame: &'a ContinuationFrame = *handle;
        let dependency = match frame.dependency() {
            Dependency::None => LiveDependency::None,
            Dependency::Opaque => LiveDependency::Opaque,
            Dependency::Nested(inner) => LiveDependency::Nested(inner.as_ref()),
        };
        Ok(LiveFrame {
            target: frame.target().clone(),
            resumption_point: frame.resumption_point(),
            slots: frame
                .slots()
                .iter()
                .map(|s| LiveSlot::new(s.name(), s.value().cloned()))
                .collect(),
            dependency,
        })
    }
}
