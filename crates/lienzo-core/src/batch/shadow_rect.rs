use bytemuck::{Pod, Zeroable};

use crate::device::{Device, PipelineKind};
use crate::scene::{Geometry, NodeId, SceneGraph, ShapeNode};

use super::common::{depth_for_order, pack_transform};
use super::drawcall::QuadBatch;

/// Gaussian-approximation drop shadow under a rect, drawn on an inflated
/// quad before the body fill.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct ShadowInstance {
    pub position_size: [f32; 4],
    pub color: [f32; 4],
    /// offset.xy, blur radius, depth.
    pub shadow: [f32; 4],
    pub transform0: [f32; 4],
    pub transform1: [f32; 2],
}

impl ShadowInstance {
    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
            1 => Float32x4,
            2 => Float32x4,
            3 => Float32x4,
            4 => Float32x4,
            5 => Float32x2,
        ];
        wgpu::VertexBufferLayout {
            array_stride: core::mem::size_of::<ShadowInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRS,
        }
    }
}

/// Drop shadows batch only among rects sharing one blur radius; the blur
/// becomes the drawcall signature on first add.
pub(crate) struct ShadowRectDrawcall<D: Device> {
    shapes: Vec<NodeId>,
    geometry_dirty: bool,
    blur_bits: Option<u32>,
    batch: QuadBatch<D>,
}

impl<D: Device> ShadowRectDrawcall<D> {
    pub(crate) fn new() -> Self {
        Self { shapes: Vec::new(), geometry_dirty: true, blur_bits: None, batch: QuadBatch::new() }
    }

    #[inline]
    pub(crate) fn shapes(&self) -> &[NodeId] {
        &self.shapes
    }

    pub(crate) fn validate(&self, graph: &SceneGraph, id: NodeId) -> bool {
        graph.node(id).is_some_and(|n| {
            matches!(n.geometry(), Geometry::Rect { .. })
                && n.shadow().blur_radius > 0.0
                && self
                    .blur_bits
                    .is_none_or(|bits| bits == n.shadow().blur_radius.to_bits())
        })
    }

    pub(crate) fn add_shape(&mut self, graph: &SceneGraph, id: NodeId) {
        if self.blur_bits.is_none() {
            self.blur_bits = graph.node(id).map(|n| n.shadow().blur_radius.to_bits());
        }
        if !self.shapes.contains(&id) {
            self.shapes.push(id);
        }
        self.geometry_dirty = true;
    }

    pub(crate) fn remove_shape(&mut self, id: NodeId) {
        self.shapes.retain(|&s| s != id);
        if self.shapes.is_empty() {
            // Pooled groups take their next signature from the first joiner.
            self.blur_bits = None;
        }
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
            let instances: Vec<ShadowInstance> = self
                .shapes
                .iter()
                .filter_map(|&id| graph.node(id).and_then(instance_for))
                .collect();
            self.batch.upload(device, "shadow instances", &instances);
            self.geometry_dirty = false;
        }
        self.batch.render(device, pass, PipelineKind::ShadowRect, uniforms, None);
    }

    pub(crate) fn destroy(mut self, device: &D) {
        self.batch.destroy(device);
    }
}

fn instance_for(node: &ShapeNode) -> Option<ShadowInstance> {
    let Geometry::Rect { origin, size } = node.geometry() else { return None };
    let shadow = node.shadow();
    if shadow.blur_radius <= 0.0 {
        return None;
    }
    let (transform0, transform1) = pack_transform(node.world_transform());
    Some(ShadowInstance {
        position_size: [origin.x, origin.y, size.x, size.y],
        color: shadow.color.to_array(),
        shadow: [
            shadow.offset.x,
            shadow.offset.y,
            shadow.blur_radius,
            depth_for_order(node.global_render_order()),
        ],
        transform0,
        transform1,
    })
}
