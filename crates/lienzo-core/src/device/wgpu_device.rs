use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::batch::{GlyphInstance, MeshVertex, QuadVertex, SdfInstance, ShadowInstance, StrokeInstance};
use crate::camera::SceneUniforms;

use super::api::{BufferDesc, BufferUsage, Device, Draw, PipelineKind, TextureDesc};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Headless wgpu backend rendering into an offscreen color + depth target.
///
/// The embedding shell owns presentation; this device only needs a queue and
/// a render target, so the same code path serves windowed hosts (blit the
/// target) and tests (read it back).
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,

    pipelines: RefCell<HashMap<PipelineKind, Arc<wgpu::RenderPipeline>>>,
    uniform_bgl: wgpu::BindGroupLayout,
    atlas_bgl: wgpu::BindGroupLayout,
    atlas_sampler: wgpu::Sampler,
    // Bind groups are cheap to cache and rebuilding them per draw defeats
    // instancing; keyed by resource id.
    uniform_groups: RefCell<HashMap<u64, Arc<wgpu::BindGroup>>>,
    atlas_groups: RefCell<HashMap<u64, Arc<wgpu::BindGroup>>>,

    next_id: Cell<u64>,
    live: Cell<usize>,
}

pub struct WgpuBuffer {
    id: u64,
    raw: wgpu::Buffer,
}

pub struct WgpuTexture {
    id: u64,
    raw: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// One recording render pass. `rpass` is lifetime-erased; it must be dropped
/// before the encoder finishes, which `submit_pass` guarantees.
pub struct WgpuPass {
    encoder: wgpu::CommandEncoder,
    rpass: wgpu::RenderPass<'static>,
}

impl WgpuDevice {
    /// Creates a headless device with a `width` x `height` target.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        anyhow::ensure!(width > 0 && height > 0, "render target has zero size");

        // Use all backends to allow wgpu to select the optimal platform backend.
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("lienzo-core device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .context("failed to create wgpu device/queue")?;

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lienzo color target"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lienzo depth target"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lienzo scene bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(
                        std::mem::size_of::<SceneUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });
        let atlas_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lienzo atlas bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let atlas_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lienzo atlas sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            target_view: target.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            device,
            queue,
            pipelines: RefCell::new(HashMap::new()),
            uniform_bgl,
            atlas_bgl,
            atlas_sampler,
            uniform_groups: RefCell::new(HashMap::new()),
            atlas_groups: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
            live: Cell::new(0),
        })
    }

    fn bump_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn ensure_pipeline(&self, kind: PipelineKind) -> Arc<wgpu::RenderPipeline> {
        if let Some(p) = self.pipelines.borrow().get(&kind) {
            return p.clone();
        }

        let (label, source, buffers): (_, _, Vec<wgpu::VertexBufferLayout<'static>>) = match kind {
            PipelineKind::SdfFill => (
                "lienzo sdf fill",
                include_str!("shaders/sdf_fill.wgsl"),
                vec![QuadVertex::layout(), SdfInstance::layout()],
            ),
            PipelineKind::SmoothStroke => (
                "lienzo smooth stroke",
                include_str!("shaders/smooth_stroke.wgsl"),
                vec![QuadVertex::layout(), StrokeInstance::layout()],
            ),
            PipelineKind::ShadowRect => (
                "lienzo shadow rect",
                include_str!("shaders/shadow_rect.wgsl"),
                vec![QuadVertex::layout(), ShadowInstance::layout()],
            ),
            PipelineKind::SdfText => (
                "lienzo sdf text",
                include_str!("shaders/sdf_text.wgsl"),
                vec![QuadVertex::layout(), GlyphInstance::layout()],
            ),
            PipelineKind::RoughMesh => (
                "lienzo rough mesh",
                include_str!("shaders/rough_mesh.wgsl"),
                vec![MeshVertex::layout()],
            ),
        };

        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let mut bgls = vec![&self.uniform_bgl];
        if kind == PipelineKind::SdfText {
            bgls.push(&self.atlas_bgl);
        }
        let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &bgls,
            immediate_size: 0,
        });

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),

            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &buffers,
            },

            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: Some(premul_alpha_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            // Depth comes from global render order; Greater because larger
            // order means nearer.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Greater,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let pipeline = Arc::new(pipeline);
        self.pipelines.borrow_mut().insert(kind, pipeline.clone());
        pipeline
    }

    fn uniform_group(&self, buffer: &WgpuBuffer) -> Arc<wgpu::BindGroup> {
        if let Some(g) = self.uniform_groups.borrow().get(&buffer.id) {
            return g.clone();
        }
        let group = Arc::new(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lienzo scene bind group"),
            layout: &self.uniform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.raw.as_entire_binding(),
            }],
        }));
        self.uniform_groups.borrow_mut().insert(buffer.id, group.clone());
        group
    }

    fn atlas_group(&self, texture: &WgpuTexture) -> Arc<wgpu::BindGroup> {
        if let Some(g) = self.atlas_groups.borrow().get(&texture.id) {
            return g.clone();
        }
        let group = Arc::new(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lienzo atlas bind group"),
            layout: &self.atlas_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.atlas_sampler),
                },
            ],
        }));
        self.atlas_groups.borrow_mut().insert(texture.id, group.clone());
        group
    }
}

impl Device for WgpuDevice {
    type Buffer = WgpuBuffer;
    type Texture = WgpuTexture;
    type Pass = WgpuPass;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> WgpuBuffer {
        let usage = match desc.usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM,
        } | wgpu::BufferUsages::COPY_DST;
        let raw = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: desc.size,
            usage,
            mapped_at_creation: false,
        });
        self.live.set(self.live.get() + 1);
        WgpuBuffer { id: self.bump_id(), raw }
    }

    fn write_buffer(&self, buffer: &WgpuBuffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(&buffer.raw, offset, data);
    }

    fn destroy_buffer(&self, buffer: WgpuBuffer) {
        self.uniform_groups.borrow_mut().remove(&buffer.id);
        buffer.raw.destroy();
        self.live.set(self.live.get() - 1);
    }

    fn create_texture(&self, desc: &TextureDesc<'_>) -> WgpuTexture {
        let raw = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.live.set(self.live.get() + 1);
        WgpuTexture {
            id: self.bump_id(),
            view: raw.create_view(&wgpu::TextureViewDescriptor::default()),
            raw,
            width: desc.width,
            height: desc.height,
        }
    }

    fn write_texture(&self, texture: &WgpuTexture, data: &[u8]) {
        debug_assert_eq!(data.len() as u32, texture.width * texture.height);
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.raw,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(texture.width),
                rows_per_image: Some(texture.height),
            },
            wgpu::Extent3d {
                width: texture.width,
                height: texture.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn destroy_texture(&self, texture: WgpuTexture) {
        self.atlas_groups.borrow_mut().remove(&texture.id);
        texture.raw.destroy();
        self.live.set(self.live.get() - 1);
    }

    fn begin_pass(&self, label: &str) -> WgpuPass {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        let rpass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            })
            .forget_lifetime();
        WgpuPass { encoder, rpass }
    }

    fn draw(&self, pass: &mut WgpuPass, draw: Draw<'_, Self>) {
        let pipeline = self.ensure_pipeline(draw.pipeline);
        pass.rpass.set_pipeline(&pipeline);
        pass.rpass.set_bind_group(0, self.uniform_group(draw.uniforms).as_ref(), &[]);
        if let Some(atlas) = draw.atlas {
            pass.rpass.set_bind_group(1, self.atlas_group(atlas).as_ref(), &[]);
        }
        for (slot, buffer) in draw.vertex_buffers.iter().enumerate() {
            pass.rpass.set_vertex_buffer(slot as u32, buffer.raw.slice(..));
        }
        match draw.index_buffer {
            Some(index) => {
                pass.rpass.set_index_buffer(index.raw.slice(..), wgpu::IndexFormat::Uint16);
                pass.rpass.draw_indexed(0..draw.element_count, 0, draw.instances);
            }
            None => pass.rpass.draw(0..draw.element_count, draw.instances),
        }
    }

    fn submit_pass(&self, pass: WgpuPass) {
        let WgpuPass { encoder, rpass } = pass;
        drop(rpass);
        self.queue.submit(Some(encoder.finish()));
    }

    fn outstanding_resources(&self) -> usize {
        self.live.get()
    }
}

/// Standard premultiplied-alpha blending.
fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}
