use bytemuck::{Pod, Zeroable};

use crate::coords::Vec2;
use crate::device::{BufferDesc, BufferUsage, Device, Draw, PipelineKind};
use crate::scene::{GeometryKind, NodeId, SceneGraph, ShapeNode};

use super::common::depth_for_order;

/// Pre-transformed triangle-list vertex. Mesh fills carry world-space
/// positions directly instead of an instance transform.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct MeshVertex {
    /// x, y in world space, depth.
    pub position_depth: [f32; 3],
    pub color: [f32; 4],
}

impl MeshVertex {
    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
            0 => Float32x3,
            1 => Float32x4,
        ];
        wgpu::VertexBufferLayout {
            array_stride: core::mem::size_of::<MeshVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRS,
        }
    }
}

/// Concatenated mesh fill for sketchy shapes and arbitrary closed paths.
///
/// Outlines are fan-triangulated around their first point; good for the
/// convex and star-convex outlines the sampler produces. Every member
/// shape's triangles share one growable vertex buffer and one draw.
pub(crate) struct RoughMeshDrawcall<D: Device> {
    shapes: Vec<NodeId>,
    geometry_dirty: bool,
    vbo: Option<D::Buffer>,
    capacity: usize,
    vertex_count: u32,
}

impl<D: Device> RoughMeshDrawcall<D> {
    pub(crate) fn new() -> Self {
        Self {
            shapes: Vec::new(),
            geometry_dirty: true,
            vbo: None,
            capacity: 0,
            vertex_count: 0,
        }
    }

    #[inline]
    pub(crate) fn shapes(&self) -> &[NodeId] {
        &self.shapes
    }

    pub(crate) fn validate(&self, graph: &SceneGraph, id: NodeId) -> bool {
        graph.node(id).is_some_and(|n| match n.geometry().kind() {
            GeometryKind::Path => true,
            GeometryKind::Circle | GeometryKind::Ellipse | GeometryKind::Rect => n.rough(),
            _ => false,
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
            let mut vertices = Vec::new();
            for &id in &self.shapes {
                if let Some(node) = graph.node(id) {
                    push_fan(node, &mut vertices);
                }
            }
            self.upload(device, &vertices);
            self.geometry_dirty = false;
        }
        if self.vertex_count == 0 {
            return;
        }
        let Some(vbo) = self.vbo.as_ref() else { return };
        device.draw(pass, Draw {
            pipeline: PipelineKind::RoughMesh,
            vertex_buffers: &[vbo],
            index_buffer: None,
            element_count: self.vertex_count,
            instances: 0..1,
            uniforms,
            atlas: None,
        });
    }

    fn upload(&mut self, device: &D, vertices: &[MeshVertex]) {
        let required = vertices.len();
        if required > self.capacity || self.vbo.is_none() {
            if let Some(old) = self.vbo.take() {
                device.destroy_buffer(old);
            }
            self.capacity = required.next_power_of_two().max(64);
            self.vbo = Some(device.create_buffer(&BufferDesc {
                label: "mesh vertices",
                usage: BufferUsage::Vertex,
                size: (self.capacity * core::mem::size_of::<MeshVertex>()) as u64,
            }));
        }
        if required > 0
            && let Some(vbo) = self.vbo.as_ref()
        {
            device.write_buffer(vbo, 0, bytemuck::cast_slice(vertices));
        }
        self.vertex_count = required as u32;
    }

    pub(crate) fn destroy(mut self, device: &D) {
        if let Some(vbo) = self.vbo.take() {
            device.destroy_buffer(vbo);
        }
    }
}

fn push_fan(node: &ShapeNode, out: &mut Vec<MeshVertex>) {
    let outline = node.geometry().outline();
    // Closed outline: first == last, so a fan needs at least 4 entries.
    if outline.len() < 4 {
        return;
    }
    let world = node.world_transform();
    let depth = depth_for_order(node.global_render_order());
    let mut color = node.fill().to_array();
    for c in &mut color {
        *c *= node.opacity();
    }
    let vertex = |p: Vec2| {
        let w = world.transform_point(p);
        MeshVertex { position_depth: [w.x, w.y, depth], color }
    };
    let anchor = outline[0];
    for pair in outline[1..outline.len() - 1].windows(2) {
        out.push(vertex(anchor));
        out.push(vertex(pair[0]));
        out.push(vertex(pair[1]));
    }
}
