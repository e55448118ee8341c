//! # taskwire
//!
//! Binary capture and reconstruction of chained suspended computations.
//!
//! A suspended computation is captured one level at a time as a
//! [`ContinuationFrame`](frame::ContinuationFrame): its resumption point,
//! its captured locals, and what it is waiting on. That may be nothing, an
//! opaque external wait, or another suspended computation whose frame is
//! captured recursively.
//!
//! ## Architecture
//!
//! - **Wire format** ([`protocol`]): one endianness header byte, then
//!   tag-prefixed records, no length prefixes at stream level
//! - **Values** ([`codec`]): closed value taxonomy plus one extension hook
//! - **Shapes** ([`frame`], [`resolver`]): explicit, classified slot
//!   descriptors drive both directions
//! - **Live chains** ([`live`]): the accessor boundary to running code
//! - **Pause** ([`pause`]): single-shot handle that keeps a computation parked
//!   while it is captured
//!
//! ## Example
//!
//! ```
//! use taskwire::codec::{Value, ValueKind};
//! use taskwire::frame::{ContinuationFrame, Dependency, FrameShape, TargetIdentity};
//! use taskwire::resolver::ShapeRegistry;
//! use taskwire::StateMachineSerializer;
//!
//! let outer = TargetIdentity::new("jobs::Import", "run");
//! let inner = TargetIdentity::new("jobs::Import", "fetch_page").with_parameters(["u32"]);
//!
//! let mut registry = ShapeRegistry::new();
//! for target in [&outer, &inner] {
//!     registry.register(
//!         FrameShape::builder(target.clone())
//!             .continuation("builder")
//!             .resumption_point("state")
//!             .local("page", ValueKind::U32)
//!             .build(),
//!     );
//! }
//! let serializer = StateMachineSerializer::new(registry);
//!
//! let chain = ContinuationFrame::new(outer)
//!     .with_resumption_point(0)
//!     .with_slot("page", ValueKind::U32, Value::U32(1))
//!     .awaiting(
//!         ContinuationFrame::new(inner)
//!             .with_resumption_point(1)
//!             .with_slot("page", ValueKind::U32, Value::U32(1))
//!             .with_dependency(Dependency::Opaque),
//!     );
//!
//! let bytes = serializer.serialize_frame(&chain).unwrap();
//! let restored = serializer.deserialize(&bytes).unwrap();
//! assert_eq!(restored.depth(), 2);
//! assert!(restored.innermost().dependency().is_opaque());
//! ```

pub mod codec;
pub mod error;
pub mod frame;
pub mod live;
pub mod pause;
pub mod protocol;
pub mod resolver;
pub mod serializer;

pub use error::{Result, TaskwireError};
pub use serializer::{SerializerBuilder, SerializerConfig, StateMachineSerializer};
