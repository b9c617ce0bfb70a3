use bytemuck::{Pod, Zeroable};

use crate::device::{Device, PipelineKind};
use crate::scene::{GeometryKind, NodeId, SceneGraph, ShapeNode};

use super::common::{depth_for_order, pack_transform};
use super::drawcall::QuadBatch;

/// One stroked outline segment, expanded to a screen-facing quad in the
/// vertex shader.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct StrokeInstance {
    /// Segment endpoints in local space: p0.xy, p1.xy.
    pub segment: [f32; 4],
    pub color: [f32; 4],
    /// width, depth, opacity, unused.
    pub params: [f32; 4],
    pub transform0: [f32; 4],
    pub transform1: [f32; 2],
}

impl StrokeInstance {
    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
            1 => Float32x4,
            2 => Float32x4,
            3 => Float32x4,
            4 => Float32x4,
            5 => Float32x2,
        ];
        wgpu::VertexBufferLayout {
            array_stride: core::mem::size_of::<StrokeInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRS,
        }
    }
}

/// Instanced anti-aliased stroke over sampled outlines. Shapes of any
/// outline-bearing kind share one drawcall; each contributes one instance
/// per segment.
pub(crate) struct SmoothStrokeDrawcall<D: Device> {
    shapes: Vec<NodeId>,
    geometry_dirty: bool,
    batch: QuadBatch<D>,
}

impl<D: Device> SmoothStrokeDrawcall<D> {
    pub(crate) fn new() -> Self {
        Self { shapes: Vec::new(), geometry_dirty: true, batch: QuadBatch::new() }
    }

    #[inline]
    pub(crate) fn shapes(&self) -> &[NodeId] {
        &self.shapes
    }

    pub(crate) fn validate(&self, graph: &SceneGraph, id: NodeId) -> bool {
        graph.node(id).is_some_and(|n| {
            n.stroke_width() > 0.0
                && !n.stroke().is_transparent()
                && !matches!(n.geometry().kind(), GeometryKind::Group | GeometryKind::Text)
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
            let mut instances = Vec::new();
            for &id in &self.shapes {
                if let Some(node) = graph.node(id) {
                    push_segments(node, &mut instances);
                }
            }
            self.batch.upload(device, "stroke instances", &instances);
            self.geometry_dirty = false;
        }
        self.batch.render(device, pass, PipelineKind::SmoothStroke, uniforms, None);
    }

    pub(crate) fn destroy(mut self, device: &D) {
        self.batch.destroy(device);
    }
}

fn push_segments(node: &ShapeNode, out: &mut Vec<StrokeInstance>) {
    let outline = node.geometry().outline();
    if outline.len() < 2 {
        return;
    }
    let (transform0, transform1) = pack_transform(node.world_transform());
    let color = node.stroke().to_array();
    let params = [
        node.stroke_width(),
        depth_for_order(node.global_render_order()),
        node.opacity(),
        0.0,
    ];
    for pair in outline.windows(2) {
        out.push(StrokeInstance {
            segment: [pair[0].x, pair[0].y, pair[1].x, pair[1].y],
            color,
            params,
            transform0,
            transform1,
        });
    }
}
