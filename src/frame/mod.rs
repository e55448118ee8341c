//! Frame model - what one suspension level looks like in memory.
//!
//! - [`TargetIdentity`] - which routine a frame belongs to
//! - [`FrameShape`] - ordered, classified slot description of that routine
//! - [`ContinuationFrame`] - captured resumption point, slots and dependency

mod continuation;
mod identity;
mod shape;

pub use continuation::{CapturedSlot, ContinuationFrame, Dependency, FINISHED, NOT_STARTED};
pub use identity::TargetIdentity;
pub use shape::{FrameShape, ShapeBuilder, SlotRole, SlotShape};
