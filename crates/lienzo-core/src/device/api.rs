use std::ops::Range;

/// What a buffer is bound as. The device maps this to backend usage flags.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
}

#[derive(Debug, Clone)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub usage: BufferUsage,
    pub size: u64,
}

/// Single-channel (R8) texture description; the glyph atlas is the only
/// texture the core uploads.
#[derive(Debug, Clone)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
}

/// The closed set of render pipelines.
///
/// Adding a drawcall variant means adding a kind here plus its shader and
/// vertex layout in the wgpu backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    SdfFill,
    SmoothStroke,
    ShadowRect,
    SdfText,
    RoughMesh,
}

/// One draw: a pipeline, its buffers, and an instance range.
///
/// `element_count` is indices when `index_buffer` is set, vertices
/// otherwise.
pub struct Draw<'a, D: Device + ?Sized> {
    pub pipeline: PipelineKind,
    pub vertex_buffers: &'a [&'a D::Buffer],
    pub index_buffer: Option<&'a D::Buffer>,
    pub element_count: u32,
    pub instances: Range<u32>,
    pub uniforms: &'a D::Buffer,
    pub atlas: Option<&'a D::Texture>,
}

/// Rendering backend seam.
///
/// Resource lifetime is explicit: whoever calls `create_*` must eventually
/// pass the resource back to `destroy_*`. [`outstanding_resources`] exposes
/// the live count so teardown paths can verify they released everything.
///
/// [`outstanding_resources`]: Device::outstanding_resources
pub trait Device {
    type Buffer;
    type Texture;
    type Pass;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Self::Buffer;
    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]);
    fn destroy_buffer(&self, buffer: Self::Buffer);

    fn create_texture(&self, desc: &TextureDesc<'_>) -> Self::Texture;
    /// Uploads the full R8 payload; `data.len()` must equal `width * height`.
    fn write_texture(&self, texture: &Self::Texture, data: &[u8]);
    fn destroy_texture(&self, texture: Self::Texture);

    fn begin_pass(&self, label: &str) -> Self::Pass;
    fn draw(&self, pass: &mut Self::Pass, draw: Draw<'_, Self>);
    fn submit_pass(&self, pass: Self::Pass);

    /// Live buffers plus textures created through this device.
    fn outstanding_resources(&self) -> usize;
}
