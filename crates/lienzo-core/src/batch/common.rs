use bytemuck::{Pod, Zeroable};

use crate::coords::Transform2D;

/// Unit quad in [0, 1]^2; instances position and size it.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct QuadVertex {
    pub position: [f32; 2],
}

pub(crate) const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { position: [0.0, 0.0] },
    QuadVertex { position: [1.0, 0.0] },
    QuadVertex { position: [1.0, 1.0] },
    QuadVertex { position: [0.0, 1.0] },
];

pub(crate) const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

impl QuadVertex {
    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: core::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRS,
        }
    }
}

/// Depth from global render order; later shapes land nearer the camera.
/// The divisor caps scenes at 65536 drawables per frame before depth
/// collapses, far beyond editor scale.
#[inline]
pub(crate) fn depth_for_order(order: u32) -> f32 {
    order as f32 / 65536.0
}

/// Packs a 2D affine transform into the two instance attributes the
/// shaders expect: the linear part and the translation.
#[inline]
pub(crate) fn pack_transform(t: Transform2D) -> ([f32; 4], [f32; 2]) {
    ([t.a, t.b, t.c, t.d], [t.tx, t.ty])
}

/// Instance buffer capacity for `required` instances.
#[inline]
pub(crate) fn instance_capacity(required: usize) -> usize {
    required.next_power_of_two().max(16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_is_monotonic_in_render_order() {
        assert!(depth_for_order(1) < depth_for_order(2));
        assert!(depth_for_order(65535) < 1.0);
    }

    #[test]
    fn capacity_grows_in_powers_of_two() {
        assert_eq!(instance_capacity(1), 16);
        assert_eq!(instance_capacity(17), 32);
        assert_eq!(instance_capacity(64), 64);
    }
}
