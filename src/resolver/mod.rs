//! Resolver module - from target identity to frame shape.
//!
//! Provides:
//! - [`ShapeResolver`] - looks up the shape of a routine by its identity
//! - [`FrameFactory`] - instantiates an empty frame of a shape
//! - [`ShapeRegistry`] - in-memory resolver
//!
//! # Example
//!
//! ```
//! use taskwire::codec::ValueKind;
//! use taskwire::frame::{FrameShape, TargetIdentity};
//! use taskwire::resolver::{ShapeRegistry, ShapeResolver};
//!
//! let target = TargetIdentity::new("jobs::Import", "run");
//! let mut registry = ShapeRegistry::new();
//! registry.register(
//!     FrameShape::builder(target.clone())
//!         .continuation("builder")
//!         .resumption_point("state")
//!         .local("rows", ValueKind::U64)
//!         .build(),
//! );
//!
//! let resolved = registry.resolve(&target).unwrap();
//! assert_eq!(resolved.shape.slots().len(), 3);
//! assert!(resolved.factory.is_some());
//! ```

mod registry;

use std::fmt;
use std::sync::Arc;

use crate::frame::{ContinuationFrame, FrameShape, TargetIdentity};

pub use registry::ShapeRegistry;

/// Produces an empty frame for a shape during reconstruction.
///
/// Implemented for any `Fn(&FrameShape) -> ContinuationFrame`.
pub trait FrameFactory: Send + Sync {
    fn instantiate(&self, shape: &FrameShape) -> ContinuationFrame;
}

impl<F> FrameFactory for F
where
    F: Fn(&FrameShape) -> ContinuationFrame + Send + Sync,
{
    fn instantiate(&self, shape: &FrameShape) -> ContinuationFrame {
        self(shape)
    }
}

/// Factory producing a bare frame for the shape's target.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFrameFactory;

impl FrameFactory for DefaultFrameFactory {
    fn instantiate(&self, shape: &FrameShape) -> ContinuationFrame {
        ContinuationFrame::new(shape.target().clone())
    }
}

/// A shape together with its reconstruction factory.
#[derive(Clone)]
pub struct ResolvedShape {
    pub shape: Arc<FrameShape>,
    /// `None` when the shape can be encoded but not rebuilt.
    pub factory: Option<Arc<dyn FrameFactory>>,
}

impl fmt::Debug for ResolvedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedShape")
            .field("shape", &self.shape)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

/// Maps a target identity to its shape.
pub trait ShapeResolver: Send + Sync {
    fn resolve(&self, target: &TargetIdentity) -> Option<ResolvedShape>;
}

impl<R: ShapeResolver + ?Sized> ShapeResolver for Arc<R> {
    fn resolve(&self, target: &TargetIdentity) -> Option<ResolvedShape> {
        (**self).resolve(target)
    }
}
