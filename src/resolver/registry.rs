//! Shape registry for resolving frames by target identity.
//!
//! The registry maps each routine's identity to its shape and, unless
//! registered shape-only, to the factory that rebuilds it.

use std::collections::HashMap;
use std::sync::Arc;

use super::{DefaultFrameFactory, FrameFactory, ResolvedShape, ShapeResolver};
use crate::frame::{FrameShape, TargetIdentity};

/// Registry mapping target identities to shapes.
#[derive(Default)]
pub struct ShapeRegistry {
    /// Shapes by target.
    entries: HashMap<TargetIdentity, ResolvedShape>,
}

impl ShapeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a shape rebuilt with [`DefaultFrameFactory`].
    pub fn register(&mut self, shape: FrameShape) {
        self.register_with_factory(shape, DefaultFrameFactory);
    }

    /// Register a shape with its own factory.
    pub fn register_with_factory<F>(&mut self, shape: FrameShape, factory: F)
    where
        F: FrameFactory + 'static,
    {
        self.insert(shape, Some(Arc::new(factory)));
    }

    /// Register a shape that can be encoded but not rebuilt.
    ///
    /// Decoding a stream that names this target fails with `MalformedStream`.
    pub fn register_shape_only(&mut self, shape: FrameShape) {
        self.insert(shape, None);
    }

    fn insert(&mut self, shape: FrameShape, factory: Option<Arc<dyn FrameFactory>>) {
        let target = shape.target().clone();
        if self.entries.contains_key(&target) {
            tracing::debug!(%target, "replacing registered shape");
        }
        self.entries.insert(
            target,
            ResolvedShape {
                shape: Arc::new(shape),
                factory,
            },
        );
    }

    /// Get a shape by target.
    pub fn shape(&self, target: &TargetIdentity) -> Option<&FrameShape> {
        self.entries.get(target).map(|e| e.shape.as_ref())
    }

    /// Whether `target` is registered.
    pub fn contains(&self, target: &TargetIdentity) -> bool {
        self.entries.contains_key(target)
    }

    /// Number of registered shapes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ShapeResolver for ShapeRegistry {
    fn resolve(&self, target: &TargetIdentity) -> Option<ResolvedShape> {
        self.entries.get(target).cloned()
    }
}
