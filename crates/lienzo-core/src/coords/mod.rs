//! 2D coordinate types shared by every subsystem.
//!
//! Conventions:
//! - Canvas space is in logical pixels, top-left origin, +Y down.
//! - AABBs are min/max corners with inclusive edges (picking on an edge hits).

mod aabb;
mod transform;
mod vec2;
mod viewport;

pub use aabb::Aabb;
pub use transform::Transform2D;
pub use vec2::Vec2;
pub use viewport::Viewport;
