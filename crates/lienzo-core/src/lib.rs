//! Lienzo core — retained rendering engine for an infinite canvas.
//!
//! A [`Canvas`] owns a dirty-flag [`SceneGraph`](scene::SceneGraph), a frame
//! pipeline that recomputes only what changed, a uniform-grid spatial index
//! for picking, and a batch manager that folds compatible shapes into
//! instanced drawcalls. Rendering goes through the [`Device`](device::Device)
//! trait; [`WgpuDevice`](device::WgpuDevice) is the GPU implementation and
//! [`NullDevice`](device::NullDevice) a counting stub for tests.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use lienzo_core::prelude::*;
//!
//! let device = WgpuDevice::new(800, 600)?;
//! let mut canvas: Canvas<WgpuDevice> = Canvas::new(Viewport::new(800.0, 600.0));
//!
//! let circle = canvas.graph_mut().append(
//!     None,
//!     Geometry::Circle { center: Vec2::zero(), radius: 40.0 },
//! )?;
//! canvas.graph_mut().node_mut(circle).unwrap()
//!     .set_fill(Color::from_srgb_u8(0xE0, 0x60, 0x30, 0xFF));
//!
//! // Each frame:
//! canvas.render(&device, None);
//!
//! // Hit testing in viewport pixels:
//! let hit = canvas.element_from_point(Vec2::new(400.0, 300.0));
//! ```

pub mod batch;
pub mod camera;
pub mod canvas;
pub mod coords;
pub mod device;
pub mod frame;
pub mod index;
pub mod logging;
pub mod paint;
pub mod picking;
pub mod scene;
pub mod text;

pub use batch::{BatchManager, BatchStats};
pub use camera::{Camera, SceneUniforms};
pub use canvas::Canvas;
pub use coords::{Aabb, Transform2D, Vec2, Viewport};
pub use frame::{FrameObserver, FrameOutput, FramePipeline};
pub use index::SpatialIndex;
pub use paint::Color;
pub use picking::Picker;
pub use scene::{
    DropShadow, Geometry, GeometryKind, NodeId, PointerEvents, SceneGraph, ShapeNode,
    StrokeAlignment,
};
pub use text::{FontShaper, GlyphShaper};

/// One-stop imports for embedders.
pub mod prelude {
    pub use crate::camera::Camera;
    pub use crate::canvas::Canvas;
    pub use crate::coords::{Aabb, Transform2D, Vec2, Viewport};
    pub use crate::device::{Device, NullDevice, WgpuDevice};
    pub use crate::frame::{FrameObserver, FrameOutput};
    pub use crate::paint::Color;
    pub use crate::scene::{
        DropShadow, Geometry, GeometryKind, NodeId, PointerEvents, SceneGraph,
        StrokeAlignment,
    };
    pub use crate::text::{FontShaper, GlyphShaper};
}
