//! Top-level facade tying the scene graph, frame pipeline, spatial index,
//! batch manager and camera together.

use crate::batch::{BatchManager, BatchStats};
use crate::camera::Camera;
use crate::coords::{Aabb, Vec2, Viewport};
use crate::device::Device;
use crate::frame::{FrameObserver, FrameOutput, FramePipeline};
use crate::index::SpatialIndex;
use crate::picking::Picker;
use crate::scene::{NodeId, SceneGraph};
use crate::text::GlyphShaper;

/// An infinite-canvas scene with retained rendering state.
///
/// The device is injected per call rather than owned: embedding shells
/// decide when a GPU exists and may drive several canvases through one
/// device. A clean canvas renders for free; [`render`](Canvas::render)
/// returns with `rendered == false` and performs no device work at all.
pub struct Canvas<D: Device> {
    graph: SceneGraph,
    pipeline: FramePipeline,
    index: SpatialIndex,
    camera: Camera,
    batch: BatchManager<D>,
    observers: Vec<Box<dyn FrameObserver>>,
    uniforms: Option<D::Buffer>,
    camera_dirty: bool,
    destroyed: bool,
}

impl<D: Device> Canvas<D> {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            graph: SceneGraph::new(),
            pipeline: FramePipeline::new(),
            index: SpatialIndex::new(),
            camera: Camera::new(viewport),
            batch: BatchManager::new(),
            observers: Vec::new(),
            uniforms: None,
            camera_dirty: true,
            destroyed: false,
        }
    }

    #[inline]
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    #[inline]
    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Mutable camera access; conservatively schedules a redraw.
    pub fn camera_mut(&mut self) -> &mut Camera {
        self.camera_dirty = true;
        &mut self.camera
    }

    pub fn add_observer(&mut self, observer: Box<dyn FrameObserver>) {
        self.observers.push(observer);
    }

    pub fn batch_stats(&self) -> BatchStats {
        self.batch.stats()
    }

    /// Runs one frame: dirty recomputation, drawcall maintenance, and a
    /// single render pass when anything changed.
    ///
    /// `shaper` may be `None` while fonts load; text shapes draw nothing
    /// until one is supplied.
    pub fn render(
        &mut self,
        device: &D,
        shaper: Option<&mut dyn GlyphShaper>,
    ) -> FrameOutput {
        if self.destroyed {
            log::warn!("render on a destroyed canvas ignored");
            return FrameOutput::default();
        }

        let mut output = self.pipeline.run(&mut self.graph, &mut self.observers);
        let redraw = output.rendered || self.camera_dirty;

        if redraw {
            if self.uniforms.is_none() {
                self.uniforms = Some(device.create_buffer(&crate::device::BufferDesc {
                    label: "scene uniforms",
                    usage: crate::device::BufferUsage::Uniform,
                    size: std::mem::size_of::<crate::camera::SceneUniforms>() as u64,
                }));
            }
            let uniforms = self.uniforms.as_ref().expect("created above");
            device.write_buffer(uniforms, 0, bytemuck::bytes_of(&self.camera.uniforms()));

            // Membership first: adds re-resolve restyled shapes, removals
            // cover deletions and shapes that left the drawable set. A shape
            // under a hidden ancestor is not drawable even when visible itself.
            for &id in &output.all {
                let drawable = self
                    .graph
                    .node(id)
                    .is_some_and(|n| n.renderable() && !n.culled())
                    && self.graph.visible_through_ancestors(id);
                if drawable {
                    self.batch.add(device, &self.graph, id);
                } else {
                    self.batch.remove(device, id);
                }
            }
            for &id in &output.modified {
                self.batch.mark_modified(id);
            }
            for &id in &output.removed {
                self.batch.remove(device, id);
            }

            let mut pass = device.begin_pass("lienzo frame");
            self.batch.flush(device, &self.graph, &mut pass, uniforms, shaper);
            device.submit_pass(pass);
        }

        self.camera_dirty = false;
        self.index.sync(&self.graph, &output);
        output.rendered = redraw;
        output
    }

    // ── picking ───────────────────────────────────────────────────────────

    /// Shapes intersecting a canvas-space box, back to front.
    pub fn elements_from_bbox(&self, aabb: Aabb) -> Vec<NodeId> {
        Picker::new(&self.graph, &self.index, &self.camera).elements_from_bbox(aabb)
    }

    /// Shapes under a viewport-space point, back to front.
    pub fn elements_from_point(&self, point: Vec2) -> Vec<NodeId> {
        Picker::new(&self.graph, &self.index, &self.camera).elements_from_point(point)
    }

    /// Topmost shape under a viewport-space point.
    pub fn element_from_point(&self, point: Vec2) -> Option<NodeId> {
        Picker::new(&self.graph, &self.index, &self.camera).element_from_point(point)
    }

    // ── teardown ──────────────────────────────────────────────────────────

    /// Releases every device resource this canvas created. Idempotent; the
    /// canvas refuses further rendering afterwards.
    pub fn destroy(&mut self, device: &D) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.batch.destroy(device);
        if let Some(uniforms) = self.uniforms.take() {
            device.destroy_buffer(uniforms);
        }
        let leaked = device.outstanding_resources();
        if leaked > 0 {
            log::warn!("{leaked} device resources still alive after canvas teardown");
        }
    }
}
