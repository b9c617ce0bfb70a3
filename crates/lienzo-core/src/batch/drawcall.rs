use bytemuck::Pod;

use crate::device::{BufferDesc, BufferUsage, Device, Draw, PipelineKind};
use crate::scene::{NodeId, SceneGraph};
use crate::text::GlyphShaper;

use super::common::{instance_capacity, QUAD_INDICES, QUAD_VERTICES};
use super::rough_mesh::RoughMeshDrawcall;
use super::sdf_fill::SdfFillDrawcall;
use super::sdf_text::SdfTextDrawcall;
use super::shadow_rect::ShadowRectDrawcall;
use super::smooth_stroke::SmoothStrokeDrawcall;

/// One drawcall: a pipeline plus the shapes currently feeding it.
///
/// A closed enum rather than a trait object: the pipeline set is fixed, and
/// matching keeps instance building free of dynamic dispatch and object-safe
/// contortions around generic devices.
pub(crate) enum Drawcall<D: Device> {
    SdfFill(SdfFillDrawcall<D>),
    SmoothStroke(SmoothStrokeDrawcall<D>),
    ShadowRect(ShadowRectDrawcall<D>),
    SdfText(SdfTextDrawcall<D>),
    RoughMesh(RoughMeshDrawcall<D>),
}

impl<D: Device> Drawcall<D> {
    pub(crate) fn new(kind: PipelineKind) -> Self {
        match kind {
            PipelineKind::SdfFill => Self::SdfFill(SdfFillDrawcall::new()),
            PipelineKind::SmoothStroke => Self::SmoothStroke(SmoothStrokeDrawcall::new()),
            PipelineKind::ShadowRect => Self::ShadowRect(ShadowRectDrawcall::new()),
            PipelineKind::SdfText => Self::SdfText(SdfTextDrawcall::new()),
            PipelineKind::RoughMesh => Self::RoughMesh(RoughMeshDrawcall::new()),
        }
    }

    pub(crate) fn kind(&self) -> PipelineKind {
        match self {
            Self::SdfFill(_) => PipelineKind::SdfFill,
            Self::SmoothStroke(_) => PipelineKind::SmoothStroke,
            Self::ShadowRect(_) => PipelineKind::ShadowRect,
            Self::SdfText(_) => PipelineKind::SdfText,
            Self::RoughMesh(_) => PipelineKind::RoughMesh,
        }
    }

    pub(crate) fn shapes(&self) -> &[NodeId] {
        match self {
            Self::SdfFill(d) => d.shapes(),
            Self::SmoothStroke(d) => d.shapes(),
            Self::ShadowRect(d) => d.shapes(),
            Self::SdfText(d) => d.shapes(),
            Self::RoughMesh(d) => d.shapes(),
        }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.shapes().is_empty()
    }

    /// Whether the shape can join this drawcall as it stands.
    pub(crate) fn validate(&self, graph: &SceneGraph, id: NodeId) -> bool {
        match self {
            Self::SdfFill(d) => d.validate(graph, id),
            Self::SmoothStroke(d) => d.validate(graph, id),
            Self::ShadowRect(d) => d.validate(graph, id),
            Self::SdfText(d) => d.validate(graph, id),
            Self::RoughMesh(d) => d.validate(graph, id),
        }
    }

    pub(crate) fn add_shape(&mut self, graph: &SceneGraph, id: NodeId) {
        match self {
            Self::SdfFill(d) => d.add_shape(id),
            Self::SmoothStroke(d) => d.add_shape(id),
            Self::ShadowRect(d) => d.add_shape(graph, id),
            Self::SdfText(d) => d.add_shape(graph, id),
            Self::RoughMesh(d) => d.add_shape(id),
        }
    }

    pub(crate) fn remove_shape(&mut self, id: NodeId) {
        match self {
            Self::SdfFill(d) => d.remove_shape(id),
            Self::SmoothStroke(d) => d.remove_shape(id),
            Self::ShadowRect(d) => d.remove_shape(id),
            Self::SdfText(d) => d.remove_shape(id),
            Self::RoughMesh(d) => d.remove_shape(id),
        }
    }

    pub(crate) fn mark_geometry_dirty(&mut self) {
        match self {
            Self::SdfFill(d) => d.mark_geometry_dirty(),
            Self::SmoothStroke(d) => d.mark_geometry_dirty(),
            Self::ShadowRect(d) => d.mark_geometry_dirty(),
            Self::SdfText(d) => d.mark_geometry_dirty(),
            Self::RoughMesh(d) => d.mark_geometry_dirty(),
        }
    }

    /// Rebuilds stale buffers, then records the draw.
    pub(crate) fn flush(
        &mut self,
        device: &D,
        graph: &SceneGraph,
        pass: &mut D::Pass,
        uniforms: &D::Buffer,
        shaper: Option<&mut dyn GlyphShaper>,
    ) {
        match self {
            Self::SdfFill(d) => d.flush(device, graph, pass, uniforms),
            Self::SmoothStroke(d) => d.flush(device, graph, pass, uniforms),
            Self::ShadowRect(d) => d.flush(device, graph, pass, uniforms),
            Self::SdfText(d) => d.flush(device, graph, pass, uniforms, shaper),
            Self::RoughMesh(d) => d.flush(device, graph, pass, uniforms),
        }
    }

    /// Releases every owned device resource.
    pub(crate) fn destroy(self, device: &D) {
        match self {
            Self::SdfFill(d) => d.destroy(device),
            Self::SmoothStroke(d) => d.destroy(device),
            Self::ShadowRect(d) => d.destroy(device),
            Self::SdfText(d) => d.destroy(device),
            Self::RoughMesh(d) => d.destroy(device),
        }
    }
}

/// Shared buffer state for instanced-quad drawcalls: the unit quad, its
/// indices, and a growable instance buffer.
pub(crate) struct QuadBatch<D: Device> {
    quad_vbo: Option<D::Buffer>,
    quad_ibo: Option<D::Buffer>,
    instance_vbo: Option<D::Buffer>,
    capacity: usize,
    count: u32,
}

impl<D: Device> QuadBatch<D> {
    pub(crate) fn new() -> Self {
        Self {
            quad_vbo: None,
            quad_ibo: None,
            instance_vbo: None,
            capacity: 0,
            count: 0,
        }
    }

    /// Uploads instance data, growing the instance buffer as needed.
    pub(crate) fn upload<T: Pod>(&mut self, device: &D, label: &str, instances: &[T]) {
        if self.quad_vbo.is_none() {
            let vbo = device.create_buffer(&BufferDesc {
                label,
                usage: BufferUsage::Vertex,
                size: core::mem::size_of_val(&QUAD_VERTICES) as u64,
            });
            device.write_buffer(&vbo, 0, bytemuck::cast_slice(&QUAD_VERTICES));
            self.quad_vbo = Some(vbo);

            let ibo = device.create_buffer(&BufferDesc {
                label,
                usage: BufferUsage::Index,
                size: core::mem::size_of_val(&QUAD_INDICES) as u64,
            });
            device.write_buffer(&ibo, 0, bytemuck::cast_slice(&QUAD_INDICES));
            self.quad_ibo = Some(ibo);
        }

        let required = instances.len();
        if required > self.capacity || self.instance_vbo.is_none() {
            if let Some(old) = self.instance_vbo.take() {
                device.destroy_buffer(old);
            }
            self.capacity = instance_capacity(required);
            self.instance_vbo = Some(device.create_buffer(&BufferDesc {
                label,
                usage: BufferUsage::Vertex,
                size: (self.capacity * core::mem::size_of::<T>()) as u64,
            }));
        }
        if required > 0
            && let Some(vbo) = self.instance_vbo.as_ref()
        {
            device.write_buffer(vbo, 0, bytemuck::cast_slice(instances));
        }
        self.count = required as u32;
    }

    pub(crate) fn render(
        &self,
        device: &D,
        pass: &mut D::Pass,
        pipeline: PipelineKind,
        uniforms: &D::Buffer,
        atlas: Option<&D::Texture>,
    ) {
        if self.count == 0 {
            return;
        }
        let (Some(quad), Some(ibo), Some(inst)) =
            (self.quad_vbo.as_ref(), self.quad_ibo.as_ref(), self.instance_vbo.as_ref())
        else {
            return;
        };
        device.draw(pass, Draw {
            pipeline,
            vertex_buffers: &[quad, inst],
            index_buffer: Some(ibo),
            element_count: QUAD_INDICES.len() as u32,
            instances: 0..self.count,
            uniforms,
            atlas,
        });
    }

    pub(crate) fn destroy(&mut self, device: &D) {
        for buffer in [
            self.quad_vbo.take(),
            self.quad_ibo.take(),
            self.instance_vbo.take(),
        ]
        .into_iter()
        .flatten()
        {
            device.destroy_buffer(buffer);
        }
        self.capacity = 0;
        self.count = 0;
    }
}
