//! Spatial index over committed world AABBs.
//!
//! A uniform grid keyed by cell coordinates; each indexed shape records the
//! cells it covers so updates and removals touch only those. The index is
//! synchronized from frame output, so it always reflects the last completed
//! frame, never mid-mutation state.

mod grid;
mod spatial;

pub use spatial::SpatialIndex;

pub(crate) use grid::UniformGrid;
