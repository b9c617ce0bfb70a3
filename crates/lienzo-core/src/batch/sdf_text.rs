use bytemuck::{Pod, Zeroable};

use crate::device::{Device, PipelineKind, TextureDesc};
use crate::scene::{Geometry, NodeId, SceneGraph};
use crate::text::GlyphShaper;

use super::common::{depth_for_order, pack_transform};
use super::drawcall::QuadBatch;

/// One glyph quad sampling the shared R8 atlas.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct GlyphInstance {
    /// Glyph box in local space: origin.xy, extent.xy.
    pub position_size: [f32; 4],
    /// Atlas rect: uv_min.xy, uv_max.xy.
    pub uv: [f32; 4],
    pub color: [f32; 4],
    /// depth, opacity, unused, unused.
    pub params: [f32; 4],
    pub transform0: [f32; 4],
    pub transform1: [f32; 2],
}

impl GlyphInstance {
    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRS: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
            1 => Float32x4,
            2 => Float32x4,
            3 => Float32x4,
            4 => Float32x4,
            5 => Float32x4,
            6 => Float32x2,
        ];
        wgpu::VertexBufferLayout {
            array_stride: core::mem::size_of::<GlyphInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRS,
        }
    }
}

/// Glyph rendering against a shaper-owned atlas.
///
/// Text only batches with text of the same pixel size (the signature locks
/// on first add), keeping atlas pressure predictable. Without a shaper the
/// drawcall draws nothing and keeps its shapes; glyphs appear once the font
/// is available.
pub(crate) struct SdfTextDrawcall<D: Device> {
    shapes: Vec<NodeId>,
    geometry_dirty: bool,
    font_bits: Option<u32>,
    batch: QuadBatch<D>,
    atlas: Option<D::Texture>,
    atlas_version: u64,
    shaped_once: bool,
}

impl<D: Device> SdfTextDrawcall<D> {
    pub(crate) fn new() -> Self {
        Self {
            shapes: Vec::new(),
            geometry_dirty: true,
            font_bits: None,
            batch: QuadBatch::new(),
            atlas: None,
            atlas_version: 0,
            shaped_once: false,
        }
    }

    #[inline]
    pub(crate) fn shapes(&self) -> &[NodeId] {
        &self.shapes
    }

    pub(crate) fn validate(&self, graph: &SceneGraph, id: NodeId) -> bool {
        graph.node(id).is_some_and(|n| match n.geometry() {
            Geometry::Text { font_size, .. } => {
                self.font_bits.is_none_or(|bits| bits == font_size.to_bits())
            }
            _ => false,
        })
    }

    pub(crate) fn add_shape(&mut self, graph: &SceneGraph, id: NodeId) {
        if self.font_bits.is_none() {
            self.font_bits = graph.node(id).and_then(|n| match n.geometry() {
                Geometry::Text { font_size, .. } => Some(font_size.to_bits()),
                _ => None,
            });
        }
        if !self.shapes.contains(&id) {
            self.shapes.push(id);
        }
        self.geometry_dirty = true;
    }

    pub(crate) fn remove_shape(&mut self, id: NodeId) {
        self.shapes.retain(|&s| s != id);
        if self.shapes.is_empty() {
            self.font_bits = None;
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
        shaper: Option<&mut dyn GlyphShaper>,
    ) {
        let Some(shaper) = shaper else {
            // Font still loading; draw nothing, try again next flush.
            self.geometry_dirty = true;
            return;
        };

        if self.geometry_dirty || !self.shaped_once {
            let mut instances = Vec::new();
            for &id in &self.shapes {
                let Some(node) = graph.node(id) else { continue };
                let Geometry::Text { content, font_size } = node.geometry() else { continue };
                let Some(run) = shaper.shape(content, *font_size) else { continue };

                let (transform0, transform1) = pack_transform(node.world_transform());
                let color = node.fill().to_array();
                let params = [
                    depth_for_order(node.global_render_order()),
                    node.opacity(),
                    0.0,
                    0.0,
                ];
                for quad in &run.quads {
                    instances.push(GlyphInstance {
                        position_size: [quad.offset.x, quad.offset.y, quad.size.x, quad.size.y],
                        uv: [quad.uv_min.x, quad.uv_min.y, quad.uv_max.x, quad.uv_max.y],
                        color,
                        params,
                        transform0,
                        transform1,
                    });
                }
            }
            self.batch.upload(device, "glyph instances", &instances);
            self.geometry_dirty = false;
            self.shaped_once = true;
        }

        self.sync_atlas(device, shaper);
        if let Some(atlas) = self.atlas.as_ref() {
            self.batch.render(device, pass, PipelineKind::SdfText, uniforms, Some(atlas));
        }
    }

    /// Re-uploads the atlas when the shaper rasterized new glyphs.
    fn sync_atlas(&mut self, device: &D, shaper: &dyn GlyphShaper) {
        let version = shaper.atlas_version();
        if self.atlas.is_some() && version == self.atlas_version {
            return;
        }
        if self.atlas.is_none() {
            let (width, height) = shaper.atlas_size();
            self.atlas = Some(device.create_texture(&TextureDesc {
                label: "glyph atlas",
                width,
                height,
            }));
        }
        if let Some(atlas) = self.atlas.as_ref() {
            device.write_texture(atlas, shaper.atlas_data());
        }
        self.atlas_version = version;
    }

    pub(crate) fn destroy(mut self, device: &D) {
        self.batch.destroy(device);
        if let Some(atlas) = self.atlas.take() {
            device.destroy_texture(atlas);
        }
    }
}
