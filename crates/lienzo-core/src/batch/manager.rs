use std::collections::HashMap;

use smallvec::SmallVec;

use crate::device::{Device, PipelineKind};
use crate::scene::{GeometryKind, NodeId, SceneGraph, ShapeNode};
use crate::text::GlyphShaper;

use super::drawcall::Drawcall;

/// Drawcall slots for one shape, in draw order (shadow under fill under
/// stroke).
type Slots = SmallVec<[usize; 3]>;

/// Maps shapes to drawcalls and owns every drawcall's GPU resources.
///
/// Caching tiers:
/// - batchable shapes share instanced drawcall groups found by geometry
///   kind, roughness, and each drawcall's own signature check
/// - non-batchable shapes get private drawcalls, cached per shape
/// - emptied shared groups stay pooled for the next compatible shape
pub struct BatchManager<D: Device> {
    drawcalls: Vec<Option<Drawcall<D>>>,
    free: Vec<usize>,
    batchable: HashMap<NodeId, Slots>,
    non_batchable: HashMap<NodeId, Slots>,
    groups: HashMap<(GeometryKind, bool), Vec<Slots>>,
    destroyed: bool,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BatchStats {
    /// Drawcalls currently feeding at least one shape.
    pub live_drawcalls: usize,
    /// Emptied shared drawcalls waiting for reuse.
    pub pooled_drawcalls: usize,
    pub batched_shapes: usize,
    pub private_shapes: usize,
}

impl<D: Device> BatchManager<D> {
    pub fn new() -> Self {
        Self {
            drawcalls: Vec::new(),
            free: Vec::new(),
            batchable: HashMap::new(),
            non_batchable: HashMap::new(),
            groups: HashMap::new(),
            destroyed: false,
        }
    }

    /// Routes a shape to drawcalls. Idempotent for unchanged shapes; a shape
    /// whose styling moved it to a different drawcall set is detached and
    /// re-resolved.
    pub fn add(&mut self, device: &D, graph: &SceneGraph, id: NodeId) {
        if self.destroyed {
            return;
        }
        let Some(node) = graph.node(id) else { return };
        let wanted = wanted_kinds(node);

        if let Some(slots) = self.batchable.get(&id) {
            if self.slots_accept(graph, id, slots, &wanted) {
                return;
            }
            let slots = self.batchable.remove(&id).expect("present above");
            for &slot in &slots {
                if let Some(dc) = self.drawcalls[slot].as_mut() {
                    dc.remove_shape(id);
                }
            }
            // The emptied or shrunk group stays pooled under its bucket.
        }
        if let Some(slots) = self.non_batchable.get(&id) {
            if self.slots_accept(graph, id, slots, &wanted) {
                return;
            }
            let slots = self.non_batchable.remove(&id).expect("present above");
            self.release_slots(device, slots);
        }

        if wanted.is_empty() {
            return;
        }

        if node.batchable() {
            let bucket = (node.geometry().kind(), node.rough());
            let group = self
                .groups
                .get(&bucket)
                .and_then(|groups| {
                    groups
                        .iter()
                        .find(|g| self.slots_accept(graph, id, g, &wanted))
                        .cloned()
                })
                .unwrap_or_else(|| {
                    let group: Slots = wanted.iter().map(|&k| self.alloc(k)).collect();
                    self.groups.entry(bucket).or_default().push(group.clone());
                    log::debug!(
                        "batch: new {:?} group of {} drawcalls",
                        bucket.0,
                        group.len()
                    );
                    group
                });
            for &slot in &group {
                if let Some(dc) = self.drawcalls[slot].as_mut() {
                    dc.add_shape(graph, id);
                }
            }
            self.batchable.insert(id, group);
        } else {
            let slots: Slots = wanted.iter().map(|&k| self.alloc(k)).collect();
            for &slot in &slots {
                if let Some(dc) = self.drawcalls[slot].as_mut() {
                    dc.add_shape(graph, id);
                }
            }
            self.non_batchable.insert(id, slots);
        }
    }

    /// Detaches a shape. Works on stale handles: only caches are consulted,
    /// never the graph.
    pub fn remove(&mut self, device: &D, id: NodeId) {
        if self.destroyed {
            return;
        }
        if let Some(slots) = self.batchable.remove(&id) {
            for &slot in &slots {
                if let Some(dc) = self.drawcalls[slot].as_mut() {
                    dc.remove_shape(id);
                }
            }
        }
        if let Some(slots) = self.non_batchable.remove(&id) {
            self.release_slots(device, slots);
        }
    }

    /// Marks a shape's drawcalls for rebuild at the next flush.
    pub fn mark_modified(&mut self, id: NodeId) {
        for cache in [&self.batchable, &self.non_batchable] {
            if let Some(slots) = cache.get(&id) {
                for &slot in slots.iter() {
                    if let Some(dc) = self.drawcalls[slot].as_mut() {
                        dc.mark_geometry_dirty();
                    }
                }
                // A shape lives in exactly one cache.
                break;
            }
        }
    }

    /// Rebuilds stale buffers and records one draw per live drawcall.
    pub fn flush(
        &mut self,
        device: &D,
        graph: &SceneGraph,
        pass: &mut D::Pass,
        uniforms: &D::Buffer,
        mut shaper: Option<&mut dyn GlyphShaper>,
    ) {
        if self.destroyed {
            return;
        }
        for slot in self.drawcalls.iter_mut() {
            if let Some(dc) = slot.as_mut()
                && !dc.is_empty()
            {
                // Reborrow so the shaper outlives one iteration only.
                let shaper = shaper.as_mut().map(|s| &mut **s as &mut dyn GlyphShaper);
                dc.flush(device, graph, pass, uniforms, shaper);
            }
        }
    }

    /// Releases every drawcall, pooled ones included. Safe to call twice.
    pub fn destroy(&mut self, device: &D) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        let mut released = 0usize;
        for slot in self.drawcalls.iter_mut() {
            if let Some(dc) = slot.take() {
                dc.destroy(device);
                released += 1;
            }
        }
        self.batchable.clear();
        self.non_batchable.clear();
        self.groups.clear();
        self.free.clear();
        log::debug!("batch: destroyed {released} drawcalls");
    }

    pub fn stats(&self) -> BatchStats {
        let mut stats = BatchStats {
            batched_shapes: self.batchable.len(),
            private_shapes: self.non_batchable.len(),
            ..BatchStats::default()
        };
        for dc in self.drawcalls.iter().flatten() {
            if dc.is_empty() {
                stats.pooled_drawcalls += 1;
            } else {
                stats.live_drawcalls += 1;
            }
        }
        stats
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn alloc(&mut self, kind: PipelineKind) -> usize {
        let dc = Drawcall::new(kind);
        match self.free.pop() {
            Some(slot) => {
                self.drawcalls[slot] = Some(dc);
                slot
            }
            None => {
                self.drawcalls.push(Some(dc));
                self.drawcalls.len() - 1
            }
        }
    }

    fn release_slots(&mut self, device: &D, slots: Slots) {
        for slot in slots {
            if let Some(dc) = self.drawcalls[slot].take() {
                dc.destroy(device);
                self.free.push(slot);
            }
        }
    }

    /// Compatibility: same drawcall kinds in the same order, and every
    /// drawcall's signature accepts the shape.
    fn slots_accept(
        &self,
        graph: &SceneGraph,
        id: NodeId,
        slots: &Slots,
        wanted: &[PipelineKind],
    ) -> bool {
        slots.len() == wanted.len()
            && slots.iter().zip(wanted).all(|(&slot, &kind)| {
                self.drawcalls[slot]
                    .as_ref()
                    .is_some_and(|dc| dc.kind() == kind && dc.validate(graph, id))
            })
    }
}

impl<D: Device> Default for BatchManager<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// The drawcall table: which pipelines a shape needs, in draw order.
fn wanted_kinds(node: &ShapeNode) -> SmallVec<[PipelineKind; 3]> {
    let mut kinds = SmallVec::new();
    let stroked = node.stroke_width() > 0.0 && !node.stroke().is_transparent();
    match node.geometry().kind() {
        GeometryKind::Group => {}
        GeometryKind::Circle | GeometryKind::Ellipse => {
            kinds.push(fill_kind(node));
            if stroked {
                kinds.push(PipelineKind::SmoothStroke);
            }
        }
        GeometryKind::Rect => {
            if node.shadow().blur_radius > 0.0 {
                kinds.push(PipelineKind::ShadowRect);
            }
            kinds.push(fill_kind(node));
            if stroked {
                kinds.push(PipelineKind::SmoothStroke);
            }
        }
        GeometryKind::Polyline => {
            if stroked {
                kinds.push(PipelineKind::SmoothStroke);
            }
        }
        GeometryKind::Path => {
            kinds.push(PipelineKind::RoughMesh);
            if stroked {
                kinds.push(PipelineKind::SmoothStroke);
            }
        }
        GeometryKind::Text => kinds.push(PipelineKind::SdfText),
    }
    kinds
}

#[inline]
fn fill_kind(node: &ShapeNode) -> PipelineKind {
    if node.rough() {
        PipelineKind::RoughMesh
    } else {
        PipelineKind::SdfFill
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use crate::device::{BufferDesc, BufferUsage, NullDevice};
    use crate::paint::Color;
    use crate::scene::{DropShadow, Geometry};

    struct Fixture {
        graph: SceneGraph,
        device: NullDevice,
        manager: BatchManager<NullDevice>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                graph: SceneGraph::new(),
                device: NullDevice::new(),
                manager: BatchManager::new(),
            }
        }

        fn circle(&mut self) -> NodeId {
            self.graph
                .append(None, Geometry::Circle { center: Vec2::zero(), radius: 10.0 })
                .unwrap()
        }

        fn shadowed_rect(&mut self, blur: f32) -> NodeId {
            let id = self
                .graph
                .append(None, Geometry::Rect {
                    origin: Vec2::zero(),
                    size: Vec2::new(10.0, 10.0),
                })
                .unwrap();
            self.graph.node_mut(id).unwrap().set_shadow(DropShadow {
                color: Color::BLACK,
                offset: Vec2::new(2.0, 2.0),
                blur_radius: blur,
            });
            id
        }

        fn flush(&mut self) -> usize {
            let uniforms = self.device.create_buffer(&BufferDesc {
                label: "uniforms",
                usage: BufferUsage::Uniform,
                size: 16,
            });
            let mut pass = self.device.begin_pass("test");
            self.manager.flush(&self.device, &self.graph, &mut pass, &uniforms, None);
            let draws = pass.draws;
            self.device.submit_pass(pass);
            self.device.destroy_buffer(uniforms);
            draws
        }
    }

    #[test]
    fn same_kind_shapes_share_one_drawcall() {
        let mut fx = Fixture::new();
        let a = fx.circle();
        let b = fx.circle();
        let c = fx.circle();
        for id in [a, b, c] {
            fx.manager.add(&fx.device, &fx.graph, id);
        }
        assert_eq!(fx.manager.stats().live_drawcalls, 1);
        assert_eq!(fx.flush(), 1);
    }

    #[test]
    fn stroke_presence_splits_batch_groups() {
        let mut fx = Fixture::new();
        let plain = fx.circle();
        let stroked = fx.circle();
        fx.graph
            .node_mut(stroked)
            .unwrap()
            .set_stroke(Color::from_straight(1.0, 0.0, 0.0, 1.0));
        fx.manager.add(&fx.device, &fx.graph, plain);
        fx.manager.add(&fx.device, &fx.graph, stroked);

        // [fill] and [fill, stroke] are different drawcall sets.
        assert_eq!(fx.manager.stats().live_drawcalls, 3);
        assert_eq!(fx.flush(), 3);
    }

    #[test]
    fn shadow_blur_is_a_group_signature() {
        let mut fx = Fixture::new();
        let a = fx.shadowed_rect(4.0);
        let b = fx.shadowed_rect(4.0);
        fx.manager.add(&fx.device, &fx.graph, a);
        fx.manager.add(&fx.device, &fx.graph, b);
        // Shared shadow + shared fill.
        assert_eq!(fx.flush(), 2);

        let c = fx.shadowed_rect(9.0);
        fx.manager.add(&fx.device, &fx.graph, c);
        // c fails the blur signature: its own shadow + fill group.
        assert_eq!(fx.flush(), 4);
    }

    #[test]
    fn restyled_shape_is_regrouped_on_add() {
        let mut fx = Fixture::new();
        let a = fx.shadowed_rect(4.0);
        let b = fx.shadowed_rect(4.0);
        fx.manager.add(&fx.device, &fx.graph, a);
        fx.manager.add(&fx.device, &fx.graph, b);
        assert_eq!(fx.flush(), 2);

        fx.graph.node_mut(b).unwrap().set_shadow(DropShadow {
            color: Color::BLACK,
            offset: Vec2::new(2.0, 2.0),
            blur_radius: 12.0,
        });
        fx.manager.add(&fx.device, &fx.graph, b);
        assert_eq!(fx.flush(), 4);
    }

    #[test]
    fn non_batchable_shapes_draw_privately() {
        let mut fx = Fixture::new();
        let a = fx.circle();
        let b = fx.circle();
        fx.graph.node_mut(a).unwrap().set_batchable(false);
        fx.graph.node_mut(b).unwrap().set_batchable(false);
        fx.manager.add(&fx.device, &fx.graph, a);
        fx.manager.add(&fx.device, &fx.graph, b);

        let stats = fx.manager.stats();
        assert_eq!(stats.private_shapes, 2);
        assert_eq!(fx.flush(), 2);
    }

    #[test]
    fn removing_the_last_member_pools_the_group() {
        let mut fx = Fixture::new();
        let a = fx.circle();
        fx.manager.add(&fx.device, &fx.graph, a);
        assert_eq!(fx.flush(), 1);

        fx.manager.remove(&fx.device, a);
        assert_eq!(fx.flush(), 0);
        let stats = fx.manager.stats();
        assert_eq!(stats.live_drawcalls, 0);
        assert_eq!(stats.pooled_drawcalls, 1);

        // Next compatible shape reuses the pooled group.
        let b = fx.circle();
        fx.manager.add(&fx.device, &fx.graph, b);
        assert_eq!(fx.manager.stats().pooled_drawcalls, 0);
        assert_eq!(fx.flush(), 1);
    }

    #[test]
    fn private_removal_releases_resources() {
        let mut fx = Fixture::new();
        let baseline = fx.device.outstanding_resources();
        let a = fx.circle();
        fx.graph.node_mut(a).unwrap().set_batchable(false);
        fx.manager.add(&fx.device, &fx.graph, a);
        fx.flush();
        assert!(fx.device.outstanding_resources() > baseline);

        fx.manager.remove(&fx.device, a);
        assert_eq!(fx.device.outstanding_resources(), baseline);
    }

    #[test]
    fn destroy_is_idempotent_and_releases_everything() {
        let mut fx = Fixture::new();
        let a = fx.circle();
        let b = fx.shadowed_rect(3.0);
        fx.manager.add(&fx.device, &fx.graph, a);
        fx.manager.add(&fx.device, &fx.graph, b);
        fx.flush();

        fx.manager.destroy(&fx.device);
        assert_eq!(fx.device.outstanding_resources(), 0);
        fx.manager.destroy(&fx.device);
        assert_eq!(fx.device.outstanding_resources(), 0);
        // A destroyed manager rejects further work instead of panicking.
        fx.manager.add(&fx.device, &fx.graph, a);
        assert_eq!(fx.flush(), 0);
    }

    #[test]
    fn unchanged_readds_do_not_dirty_buffers() {
        let mut fx = Fixture::new();
        let a = fx.circle();
        fx.manager.add(&fx.device, &fx.graph, a);
        fx.flush();
        let writes = fx.device.write_count();

        // Same shape, same styling: no rebuild on the next frame.
        fx.manager.add(&fx.device, &fx.graph, a);
        fx.flush();
        assert_eq!(fx.device.write_count(), writes);

        // An explicit modification does rebuild.
        fx.manager.mark_modified(a);
        fx.flush();
        assert!(fx.device.write_count() > writes);
    }
}
