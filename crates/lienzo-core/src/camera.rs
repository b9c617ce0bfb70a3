//! Camera: canvas <-> viewport mapping and the per-frame uniform block.

use bytemuck::{Pod, Zeroable};

use crate::coords::{Transform2D, Vec2, Viewport};

const MIN_ZOOM: f32 = 0.01;
const MAX_ZOOM: f32 = 64.0;

/// Viewing transform over the infinite canvas.
///
/// `position` is the canvas point shown at the viewport center; `zoom` is
/// viewport pixels per canvas unit.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec2,
    zoom: f32,
    rotation: f32,
    viewport: Viewport,
}

impl Camera {
    pub fn new(viewport: Viewport) -> Self {
        Self { position: Vec2::zero(), zoom: 1.0, rotation: 0.0, viewport }
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        if position.is_finite() {
            self.position = position;
        }
    }

    #[inline]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    #[inline]
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn set_rotation(&mut self, radians: f32) {
        if radians.is_finite() {
            self.rotation = radians;
        }
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Canvas space to viewport pixels: recenter on `position`, rotate,
    /// scale by zoom, then shift to the viewport center.
    pub fn canvas_to_viewport(&self) -> Transform2D {
        let center = Vec2::new(self.viewport.width * 0.5, self.viewport.height * 0.5);
        Transform2D::from_trs(center, -self.rotation, Vec2::splat(self.zoom))
            .then(Transform2D::from_translation(-self.position))
    }

    pub fn viewport_to_canvas(&self) -> Transform2D {
        // Invertible for any clamped zoom.
        self.canvas_to_viewport().inverse().unwrap_or(Transform2D::IDENTITY)
    }

    /// Canvas-space box currently visible, for the external culling pass.
    pub fn visible_rect(&self) -> crate::coords::Aabb {
        let inv = self.viewport_to_canvas();
        inv.transform_aabb(crate::coords::Aabb::from_xywh(
            0.0,
            0.0,
            self.viewport.width,
            self.viewport.height,
        ))
    }

    pub fn uniforms(&self) -> SceneUniforms {
        SceneUniforms::new(self)
    }
}

/// Per-frame uniform block shared by every pipeline.
///
/// Matrices are 3x3, column-major, each column padded to a vec4 to satisfy
/// WGSL uniform layout.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct SceneUniforms {
    pub projection: [f32; 12],
    pub view: [f32; 12],
    pub zoom: f32,
    pub _pad: [f32; 3],
}

impl SceneUniforms {
    fn new(camera: &Camera) -> Self {
        let w = camera.viewport.width.max(1.0);
        let h = camera.viewport.height.max(1.0);
        // Viewport pixels to clip space, +Y down on screen.
        let projection = [
            2.0 / w, 0.0, 0.0, 0.0,
            0.0, -2.0 / h, 0.0, 0.0,
            -1.0, 1.0, 1.0, 0.0,
        ];
        let v = camera.canvas_to_viewport();
        let view = [
            v.a, v.b, 0.0, 0.0,
            v.c, v.d, 0.0, 0.0,
            v.tx, v.ty, 1.0, 0.0,
        ];
        Self { projection, view, zoom: camera.zoom, _pad: [0.0; 3] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec2, b: Vec2) {
        assert!((a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3, "{a:?} != {b:?}");
    }

    #[test]
    fn camera_position_maps_to_viewport_center() {
        let mut cam = Camera::new(Viewport::new(800.0, 600.0));
        cam.set_position(Vec2::new(1234.0, -500.0));
        cam.set_zoom(2.0);
        let p = cam.canvas_to_viewport().transform_point(cam.position());
        close(p, Vec2::new(400.0, 300.0));
    }

    #[test]
    fn round_trip_through_the_inverse() {
        let mut cam = Camera::new(Viewport::new(1920.0, 1080.0));
        cam.set_position(Vec2::new(50.0, 75.0));
        cam.set_zoom(0.5);
        cam.set_rotation(0.4);

        let p = Vec2::new(321.0, 654.0);
        let canvas = cam.viewport_to_canvas().transform_point(p);
        let back = cam.canvas_to_viewport().transform_point(canvas);
        close(back, p);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut cam = Camera::new(Viewport::new(100.0, 100.0));
        cam.set_zoom(0.0);
        assert_eq!(cam.zoom(), MIN_ZOOM);
        cam.set_zoom(1.0e9);
        assert_eq!(cam.zoom(), MAX_ZOOM);
        cam.set_zoom(f32::NAN);
        assert_eq!(cam.zoom(), MAX_ZOOM);
    }

    #[test]
    fn uniform_block_layout_is_pod() {
        let cam = Camera::new(Viewport::new(640.0, 480.0));
        let u = cam.uniforms();
        let bytes: &[u8] = bytemuck::bytes_of(&u);
        assert_eq!(bytes.len(), core::mem::size_of::<SceneUniforms>());
        assert_eq!(core::mem::size_of::<SceneUniforms>(), (12 + 12 + 4) * 4);
    }
}
