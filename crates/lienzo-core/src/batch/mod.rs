//! Batch and drawcall management.
//!
//! Shapes map to drawcalls through a fixed table on geometry kind and
//! styling. Batchable shapes share instanced drawcalls with compatible
//! peers; non-batchable shapes get private drawcalls cached per shape.
//! Geometry rebuilds are deferred and coalesced: mutate as often as you
//! like, buffers are rewritten once at flush.

mod common;
mod drawcall;
mod manager;
mod rough_mesh;
mod sdf_fill;
mod sdf_text;
mod shadow_rect;
mod smooth_stroke;

pub use manager::{BatchManager, BatchStats};

pub(crate) use common::QuadVertex;
pub(crate) use rough_mesh::MeshVertex;
pub(crate) use sdf_fill::SdfInstance;
pub(crate) use sdf_text::GlyphInstance;
pub(crate) use shadow_rect::ShadowInstance;
pub(crate) use smooth_stroke::StrokeInstance;
