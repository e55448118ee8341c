//! Explicit slot shapes of resumable routines.
//!
//! A [`FrameShape`] lists a routine's slots in storage order, each with a
//! declared [`SlotRole`] and (for value-bearing roles) a [`ValueKind`]. Both
//! directions of the codec walk this list; the stream itself carries no slot
//! names.
//!
//! # Example
//!
//! ```
//! use taskwire::codec::ValueKind;
//! use taskwire::frame::{FrameShape, TargetIdentity};
//!
//! let shape = FrameShape::builder(TargetIdentity::new("jobs::Import", "run"))
//!     .continuation("builder")
//!     .resumption_point("state")
//!     .local("x", ValueKind::I32)
//!     .build();
//!
//! assert!(shape.classify().is_ok());
//! assert_eq!(shape.slots().len(), 3);
//! ```

use std::collections::HashSet;
use std::fmt;

use super::identity::TargetIdentity;
use crate::codec::ValueKind;
use crate::error::{Result, TaskwireError};

/// Classification of a slot, in matching priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotRole {
    /// Holds what the frame is suspended on. Exactly one per frame.
    Continuation,
    /// Wait objects; folded into the continuation slot, never encoded.
    DependencyWait,
    /// The i32 resumption point. Exactly one per frame.
    ResumptionPoint,
    /// Reference to the owning object. At most one.
    Owner,
    /// Ordinary captured local.
    Local,
    /// Pause primitive bookkeeping; skipped.
    PauseAdmin,
}

impl SlotRole {
    /// Whether slots of this role carry an encoded value.
    #[inline]
    pub fn carries_value(self) -> bool {
        matches!(self, SlotRole::Owner | SlotRole::Local)
    }

    /// Whether slots of this role leave no record in the stream.
    #[inline]
    pub fn is_skipped(self) -> bool {
        matches!(self, SlotRole::DependencyWait | SlotRole::PauseAdmin)
    }
}

impl fmt::Display for SlotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotRole::Continuation => "continuation",
            SlotRole::DependencyWait => "dependency wait",
            SlotRole::ResumptionPoint => "resumption point",
            SlotRole::Owner => "owner",
            SlotRole::Local => "local",
            SlotRole::PauseAdmin => "pause admin",
        };
        f.write_str(name)
    }
}

/// One declared slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotShape {
    name: String,
    role: SlotRole,
    kind: Option<ValueKind>,
}

impl SlotShape {
    /// Declare a slot.
    pub fn new(name: impl Into<String>, role: SlotRole, kind: Option<ValueKind>) -> Self {
        Self {
            name: name.into(),
            role,
            kind,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn role(&self) -> SlotRole {
        self.role
    }

    #[inline]
    pub fn kind(&self) -> Option<&ValueKind> {
        self.kind.as_ref()
    }
}

/// Ordered, classified slot description of one routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameShape {
    target: TargetIdentity,
    slots: Vec<SlotShape>,
}

impl FrameShape {
    /// Build a shape from raw slot declarations.
    pub fn new(target: TargetIdentity, slots: Vec<SlotShape>) -> Self {
        Self { target, slots }
    }

    /// Start declaring a shape.
    pub fn builder(target: TargetIdentity) -> ShapeBuilder {
        ShapeBuilder {
            target,
            slots: Vec::new(),
        }
    }

    #[inline]
    pub fn target(&self) -> &TargetIdentity {
        &self.target
    }

    /// Slots in storage order.
    #[inline]
    pub fn slots(&self) -> &[SlotShape] {
        &self.slots
    }

    /// Look up a slot by name.
    pub fn slot(&self, name: &str) -> Option<&SlotShape> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Slots that carry encoded values (owner and locals), in order.
    pub fn value_slots(&self) -> impl Iterator<Item = &SlotShape> {
        self.slots.iter().filter(|s| s.role.carries_value())
    }

    /// Check every slot against the classification rules.
    ///
    /// Exactly one continuation slot, exactly one i32 resumption point, at
    /// most one owner, and a declared kind on every value-bearing slot. Names
    /// must be non-empty and unique. The first violation is returned as
    /// `UnclassifiableSlot`.
    pub fn classify(&self) -> Result<()> {
        let mut names = HashSet::new();
        let mut continuation = false;
        let mut resumption = false;
        let mut owner = false;

        for slot in &self.slots {
            let reject = |reason: &str| -> Result<()> {
                Err(TaskwireError::unclassifiable(&self.target, slot.name.as_str(), reason))
            };
            if slot.name.is_empty() {
                return reject("slot name is empty");
            }
            if !names.insert(slot.name.as_str()) {
                return reject("duplicate slot name");
            }
            match slot.role {
                SlotRole::Continuation => {
                    if std::mem::replace(&mut continuation, true) {
                        return reject("second continuation slot");
                    }
                }
                SlotRole::ResumptionPoint => {
                    if std::mem::replace(&mut resumption, true) {
                        return reject("second resumption point slot");
                    }
                    if slot.kind.as_ref() != Some(&ValueKind::I32) {
                        return reject("resumption point must be declared i32");
                    }
                }
                SlotRole::Owner => {
                    if std::mem::replace(&mut owner, true) {
                        return reject("second owner slot");
                    }
                    if slot.kind.is_none() {
                        return reject("owner slot has no declared kind");
                    }
                }
                SlotRole::Local => {
                    if slot.kind.is_none() {
                        return reject("local slot has no declared kind");
                    }
                }
                SlotRole::DependencyWait | SlotRole::PauseAdmin => {}
            }
        }

        if !continuation {
            return Err(TaskwireError::unclassifiable(
                &self.target,
                "<continuation>",
                "shape declares no continuation slot",
            ));
        }
        if !resumption {
            return Err(TaskwireError::unclassifiable(
                &self.target,
                "<resumption point>",
                "shape declares no resumption point slot",
            ));
        }
        Ok(())
    }
}

/// Fluent declaration of a [`FrameShape`].
#[derive(Debug, Clone)]
pub struct ShapeBuilder {
    target: TargetIdentity,
    slots: Vec<SlotShape>,
}

impl ShapeBuilder {
    /// Declare the continuation slot.
    pub fn continuation(self, name: &str) -> Self {
        self.slot(SlotShape::new(name, SlotRole::Continuation, None))
    }

    /// Declare a wait slot (not encoded).
    pub fn dependency_wait(self, name: &str) -> Self {
        self.slot(SlotShape::new(name, SlotRole::DependencyWait, None))
    }

    /// Declare the i32 resumption point slot.
    pub fn resumption_point(self, name: &str) -> Self {
        self.slot(SlotShape::new(name, SlotRole::ResumptionPoint, Some(ValueKind::I32)))
    }

    /// Declare the owning-object slot.
    pub fn owner(self, name: &str, kind: ValueKind) -> Self {
        self.slot(SlotShape::new(name, SlotRole::Owner, Some(kind)))
    }

    /// Declare an ordinary captured local.
    pub fn local(self, name: &str, kind: ValueKind) -> Self {
        self.slot(SlotShape::new(name, SlotRole::Local, Some(kind)))
    }

    /// Declare a pause bookkeeping slot (not encoded).
    pub fn pause_admin(self, name: &str) -> Self {
        self.slot(SlotShape::new(name, SlotRole::PauseAdmin, None))
    }

    /// Append a raw declaration.
    pub fn slot(mut self, slot: SlotShape) -> Self {
        self.slots.push(slot);
        self
    }

    /// Finish the shape. Classification runs when the shape is used.
    pub fn build(self) -> FrameShape {
        FrameShape::new(self.target, self.slots)
    }
}
