use bytemuck::{Pod, Zeroable};

use crate::device::{Device, PipelineKind};
use crate::scene::{Geometry, GeometryKind, NodeId, SceneGraph, ShapeNode};

use super::common::{depth_for_order, pack_transform};
use super::drawcall::QuadBatch;

/// Analytic fill instance. `shape` selects the distance function in the
/// fragment shader: 0 = circle, 1 = ellipse, 2 = rect.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct SdfInstance {
    /// Circle/ellipse: center + radii. Rect: origin + extent.
    pub position_size: [f32; 4],
    pub color: [f32; 4],
    /// depth, shape selector, opacity, unused.
    pub z_shape: [f32; 4],
    pub transform0: [f32; 4],
    pub transform1: [f32; 2],
}

impl SdfInstance {
    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
            1 => Float32x4,
            2 => Float32x4,
            3 => Float32x4,
            4 => Float32x4,
            5 => Float32x2,
        ];
        wgpu::VertexBufferLayout {
            array_stride: core::mem::size_of::<SdfInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRS,
        }
    }
}

/// Instanced fill for circles, ellipses and rects rendered as signed
/// distance fields on a unit quad.
pub(crate) struct SdfFillDrawcall<D: Device> {
    shapes: Vec<NodeId>,
    geometry_dirty: bool,
    batch: QuadBatch<D>,
}

impl<D: Device> SdfFillDrawcall<D> {
    pub(crate) fn new() -> Self {
        Self { shapes: Vec::new(), geometry_dirty: true, batch: QuadBatch::new() }
    }

    #[inline]
    pub(crate) fn shapes(&self) -> &[NodeId] {
        &self.shapes
    }

    pub(crate) fn validate(&self, graph: &SceneGraph, id: NodeId) -> bool {
        graph.node(id).is_some_and(|n| {
            !n.rough()
                && matches!(
                    n.geometry().kind(),
                    GeometryKind::Circle | GeometryKind::Ellipse | GeometryKind::Rect
                )
        })
    }

    pub(crate) fn add_shape(&mut self, id: NodeId) {
        if !self.shapes.contains(&id) {
            self.shapes.push(id);
        }
        self.geometry_dirty = true;
    }

    pub(crate) fn remove_shape(&mut self, id: NodeId) {
        self.shapes.retain(|&s| s != id);
        self.geometry_dirty = true;
    }

    pub(crate) fn mark_geometry_dirty(&mut self) {
        self.geometry_dirty = true;
    }

    pub(crate) fn flush(
        &mut self,
        device: &D,
        graph: &SceneGraph,
        pass: &mut D::Pass,
        uniforms: &D::Buffer,
    ) {
        if self.geometry_dirty {
            let instances: Vec<SdfInstance> = self
                .shapes
                .iter()
                .filter_map(|&id| graph.node(id).and_then(instance_for))
                .collect();
            self.batch.upload(device, "sdf fill instances", &instances);
            self.geometry_dirty = false;
        }
        self.batch.render(device, pass, PipelineKind::SdfFill, uniforms, None);
    }

    pub(crate) fn destroy(mut self, device: &D) {
        self.batch.destroy(device);
    }
}

fn instance_for(node: &ShapeNode) -> Option<SdfInstance> {
    let (position_size, shape) = match node.geometry() {
        Geometry::Circle { center, radius } => ([center.x, center.y, *radius, *radius], 0.0),
        Geometry::Ellipse { center, rx, ry } => ([center.x, center.y, *rx, *ry], 1.0),
        Geometry::Rect { origin, size } => ([origin.x, origin.y, size.x, size.y], 2.0),
        _ => return None,
    };
    let (transform0, transform1) = pack_transform(node.world_transform());
    Some(SdfInstance {
        position_size,
        color: node.fill().to_array(),
        z_shape: [depth_for_order(node.global_render_order()), shape, node.opacity(), 0.0],
        transform0,
        transform1,
    })
}
