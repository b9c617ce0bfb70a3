//! Hit testing over the spatial index.
//!
//! AABB precision: hits are judged against committed world boxes, not exact
//! geometry, which is what an editor's marquee and hover affordances want.

mod picker;

pub use picker::Picker;
