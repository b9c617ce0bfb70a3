use std::collections::HashMap;

use crate::coords::{Aabb, Vec2};
use crate::frame::FrameOutput;
use crate::scene::{NodeId, SceneGraph};

use super::UniformGrid;

/// Spatial index over the scene, synchronized from frame output.
///
/// Entry condition: visible, renderable, not culled, and carrying a
/// committed world AABB. Structural groups and hidden shapes never appear
/// here. Queries are pure candidate generation; the picker applies
/// pointer-events and visibility filtering on top.
pub struct SpatialIndex {
    grid: UniformGrid,
    by_node: HashMap<NodeId, usize>,
    by_slot: Vec<Option<NodeId>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            grid: UniformGrid::new(),
            by_node: HashMap::new(),
            by_slot: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.grid.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.grid.len() == 0
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.by_node.contains_key(&id)
    }

    /// Applies one frame's changes. Skipped frames carry empty sets, making
    /// this a no-op.
    pub fn sync(&mut self, graph: &SceneGraph, output: &FrameOutput) {
        for &id in &output.modified {
            let entry = graph
                .node(id)
                .filter(|n| n.visible() && n.renderable() && !n.culled())
                .and_then(|n| n.committed_aabb());
            match entry {
                Some(aabb) => self.upsert(id, aabb),
                None => self.evict(id),
            }
        }
        for &id in &output.removed {
            self.evict(id);
        }
    }

    fn upsert(&mut self, id: NodeId, aabb: Aabb) {
        if let Some(&slot) = self.by_node.get(&id) {
            self.grid.update(slot, aabb);
        } else {
            let slot = self.grid.insert(aabb);
            self.by_node.insert(id, slot);
            if slot >= self.by_slot.len() {
                self.by_slot.resize(slot + 1, None);
            }
            self.by_slot[slot] = Some(id);
        }
    }

    fn evict(&mut self, id: NodeId) {
        if let Some(slot) = self.by_node.remove(&id) {
            self.grid.remove(slot);
            self.by_slot[slot] = None;
        }
    }

    /// Indexed shapes whose committed AABB contains the canvas-space point.
    pub fn query_point(&self, p: Vec2) -> Vec<NodeId> {
        self.resolve(self.grid.query_point(p))
    }

    /// Indexed shapes whose committed AABB overlaps the canvas-space box.
    pub fn query_rect(&self, aabb: Aabb) -> Vec<NodeId> {
        self.resolve(self.grid.query_rect(aabb))
    }

    fn resolve(&self, slots: Vec<usize>) -> Vec<NodeId> {
        slots
            .into_iter()
            .filter_map(|s| self.by_slot.get(s).copied().flatten())
            .collect()
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FramePipeline;
    use crate::scene::Geometry;

    fn rect_at(x: f32, y: f32) -> Geometry {
        Geometry::Rect { origin: Vec2::new(x, y), size: Vec2::new(100.0, 100.0) }
    }

    fn frame(graph: &mut SceneGraph, pipeline: &mut FramePipeline, index: &mut SpatialIndex) {
        let out = pipeline.run(graph, &mut []);
        index.sync(graph, &out);
    }

    #[test]
    fn disjoint_shapes_query_exactly() {
        let mut graph = SceneGraph::new();
        let mut pipeline = FramePipeline::new();
        let mut index = SpatialIndex::new();

        let mut ids = Vec::new();
        for i in 0..10 {
            ids.push(graph.append(None, rect_at(i as f32 * 1000.0, 0.0)).unwrap());
        }
        frame(&mut graph, &mut pipeline, &mut index);
        assert_eq!(index.len(), 10);

        for (i, &id) in ids.iter().enumerate() {
            let hits = index.query_rect(Aabb::from_xywh(i as f32 * 1000.0 + 10.0, 10.0, 20.0, 20.0));
            assert_eq!(hits, vec![id]);
        }
    }

    #[test]
    fn queries_reflect_the_committed_frame_only() {
        let mut graph = SceneGraph::new();
        let mut pipeline = FramePipeline::new();
        let mut index = SpatialIndex::new();

        let a = graph.append(None, rect_at(0.0, 0.0)).unwrap();
        // Not yet committed by a frame.
        assert!(index.query_point(Vec2::new(50.0, 50.0)).is_empty());

        frame(&mut graph, &mut pipeline, &mut index);
        assert_eq!(index.query_point(Vec2::new(50.0, 50.0)), vec![a]);

        // Move it; the index keeps the old position until the next frame.
        graph.node_mut(a).unwrap().set_translation(Vec2::new(5000.0, 0.0));
        assert_eq!(index.query_point(Vec2::new(50.0, 50.0)), vec![a]);

        frame(&mut graph, &mut pipeline, &mut index);
        assert!(index.query_point(Vec2::new(50.0, 50.0)).is_empty());
        assert_eq!(index.query_point(Vec2::new(5050.0, 50.0)), vec![a]);
    }

    #[test]
    fn hidden_and_removed_shapes_leave_the_index() {
        let mut graph = SceneGraph::new();
        let mut pipeline = FramePipeline::new();
        let mut index = SpatialIndex::new();

        let a = graph.append(None, rect_at(0.0, 0.0)).unwrap();
        let b = graph.append(None, rect_at(500.0, 0.0)).unwrap();
        frame(&mut graph, &mut pipeline, &mut index);
        assert_eq!(index.len(), 2);

        graph.node_mut(a).unwrap().set_visible(false);
        frame(&mut graph, &mut pipeline, &mut index);
        assert!(!index.contains(a));

        graph.remove(b).unwrap();
        frame(&mut graph, &mut pipeline, &mut index);
        assert!(index.is_empty());
    }

    #[test]
    fn culled_shapes_leave_the_index() {
        let mut graph = SceneGraph::new();
        let mut pipeline = FramePipeline::new();
        let mut index = SpatialIndex::new();

        let a = graph.append(None, rect_at(0.0, 0.0)).unwrap();
        frame(&mut graph, &mut pipeline, &mut index);
        assert!(index.contains(a));

        graph.node_mut(a).unwrap().set_culled(true);
        frame(&mut graph, &mut pipeline, &mut index);
        assert!(!index.contains(a));
        assert!(index.is_empty());

        graph.node_mut(a).unwrap().set_culled(false);
        frame(&mut graph, &mut pipeline, &mut index);
        assert!(index.contains(a));
    }

    #[test]
    fn groups_are_never_indexed() {
        let mut graph = SceneGraph::new();
        let mut pipeline = FramePipeline::new();
        let mut index = SpatialIndex::new();

        let group = graph.append(None, Geometry::Group).unwrap();
        graph.append(Some(group), rect_at(0.0, 0.0)).unwrap();
        frame(&mut graph, &mut pipeline, &mut index);
        assert_eq!(index.len(), 1);
        assert!(!index.contains(group));
    }
}
