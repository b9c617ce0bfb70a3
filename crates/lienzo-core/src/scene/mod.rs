//! Scene graph: shape nodes, generational handles, dirty propagation.
//!
//! Responsibilities:
//! - own the shape hierarchy (ordered children, non-owning parent handles)
//! - track per-node dirty flags so the frame pipeline recomputes only what
//!   changed
//! - provide the mutation API (insert, remove, reparent, attribute setters);
//!   structural changes become visible at the next frame's traversal start

mod geometry;
mod graph;
mod handle;
mod key;
mod node;

pub use geometry::{Geometry, GeometryKind};
pub use graph::SceneGraph;
pub use handle::NodeId;
pub use key::SortKey;
pub use node::{
    DirtyFlags, DropShadow, PointerEvents, ShapeFlags, ShapeNode, StrokeAlignment,
};
