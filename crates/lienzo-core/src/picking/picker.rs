use crate::camera::Camera;
use crate::coords::{Aabb, Vec2};
use crate::index::SpatialIndex;
use crate::scene::{NodeId, SceneGraph};

/// Borrowing view that answers hit-test queries for one frame.
///
/// Candidate generation comes from the index; this layer applies
/// pointer-events and the visibility cascade, then sorts bottom-to-top by
/// global render order.
pub struct Picker<'a> {
    graph: &'a SceneGraph,
    index: &'a SpatialIndex,
    camera: &'a Camera,
}

impl<'a> Picker<'a> {
    pub fn new(graph: &'a SceneGraph, index: &'a SpatialIndex, camera: &'a Camera) -> Self {
        Self { graph, index, camera }
    }

    /// Shapes hit by a canvas-space box, back to front.
    pub fn elements_from_bbox(&self, aabb: Aabb) -> Vec<NodeId> {
        self.filter_and_sort(self.index.query_rect(aabb))
    }

    /// Shapes hit by a viewport-space point, back to front.
    pub fn elements_from_point(&self, viewport_point: Vec2) -> Vec<NodeId> {
        let canvas = self.camera.viewport_to_canvas().transform_point(viewport_point);
        self.filter_and_sort(self.index.query_point(canvas))
    }

    /// Topmost shape under a viewport-space point.
    pub fn element_from_point(&self, viewport_point: Vec2) -> Option<NodeId> {
        self.elements_from_point(viewport_point).pop()
    }

    fn filter_and_sort(&self, candidates: Vec<NodeId>) -> Vec<NodeId> {
        let mut hits: Vec<(u32, NodeId)> = candidates
            .into_iter()
            .filter(|&id| self.accepts(id))
            .map(|id| {
                let order = self.graph.node(id).map(|n| n.global_render_order()).unwrap_or(0);
                (order, id)
            })
            .collect();
        hits.sort_by_key(|&(order, _)| order);
        hits.into_iter().map(|(_, id)| id).collect()
    }

    fn accepts(&self, id: NodeId) -> bool {
        let Some(node) = self.graph.node(id) else { return false };
        if node.culled() || !node.selectable() {
            return false;
        }
        let pe = node.pointer_events();
        if pe == crate::scene::PointerEvents::None {
            return false;
        }
        if pe.visibility_affected() && !self.graph.visible_through_ancestors(id) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Viewport;
    use crate::frame::FramePipeline;
    use crate::scene::{Geometry, PointerEvents};

    struct Fixture {
        graph: SceneGraph,
        pipeline: FramePipeline,
        index: SpatialIndex,
        camera: Camera,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                graph: SceneGraph::new(),
                pipeline: FramePipeline::new(),
                index: SpatialIndex::new(),
                camera: Camera::new(Viewport::new(800.0, 600.0)),
            }
        }

        fn rect(&mut self, parent: Option<NodeId>, x: f32, y: f32) -> NodeId {
            self.graph
                .append(parent, Geometry::Rect {
                    origin: Vec2::new(x, y),
                    size: Vec2::new(100.0, 100.0),
                })
                .unwrap()
        }

        fn frame(&mut self) {
            let out = self.pipeline.run(&mut self.graph, &mut []);
            self.index.sync(&self.graph, &out);
        }

        fn picker(&self) -> Picker<'_> {
            Picker::new(&self.graph, &self.index, &self.camera)
        }
    }

    #[test]
    fn bbox_returns_hits_back_to_front() {
        let mut fx = Fixture::new();
        let a = fx.rect(None, 0.0, 0.0);
        let b = fx.rect(None, 50.0, 50.0);
        let c = fx.rect(None, 25.0, 25.0);
        fx.graph.set_z_index(c, 10);
        fx.frame();

        let hits = fx.picker().elements_from_bbox(Aabb::from_xywh(40.0, 40.0, 30.0, 30.0));
        // a, b in insertion order; c lifted on top by z.
        assert_eq!(hits, vec![a, b, c]);
    }

    #[test]
    fn topmost_wins_the_point_query() {
        let mut fx = Fixture::new();
        let _under = fx.rect(None, 0.0, 0.0);
        let over = fx.rect(None, 0.0, 0.0);
        fx.frame();

        // Camera at origin: viewport center maps to canvas (0, 0).
        let hit = fx.picker().element_from_point(Vec2::new(400.0 + 50.0, 300.0 + 50.0));
        assert_eq!(hit, Some(over));
    }

    #[test]
    fn pointer_events_none_is_transparent_to_hits() {
        let mut fx = Fixture::new();
        let under = fx.rect(None, 0.0, 0.0);
        let over = fx.rect(None, 0.0, 0.0);
        fx.graph.node_mut(over).unwrap().set_pointer_events(PointerEvents::None);
        fx.frame();

        let hit = fx.picker().element_from_point(Vec2::new(450.0, 350.0));
        assert_eq!(hit, Some(under));
    }

    #[test]
    fn hidden_ancestor_blocks_visibility_affected_modes() {
        let mut fx = Fixture::new();
        let group = fx.graph.append(None, Geometry::Group).unwrap();
        let child = fx.rect(Some(group), 0.0, 0.0);
        fx.frame();
        assert_eq!(
            fx.picker().elements_from_bbox(Aabb::from_xywh(0.0, 0.0, 10.0, 10.0)),
            vec![child]
        );

        fx.graph.node_mut(group).unwrap().set_visible(false);
        fx.frame();
        assert!(fx.picker().elements_from_bbox(Aabb::from_xywh(0.0, 0.0, 10.0, 10.0)).is_empty());

        // `All` ignores visibility, but the child itself is still visible
        // and the index drops only shapes that are themselves hidden.
        fx.graph.node_mut(child).unwrap().set_pointer_events(PointerEvents::All);
        fx.frame();
        assert_eq!(
            fx.picker().elements_from_bbox(Aabb::from_xywh(0.0, 0.0, 10.0, 10.0)),
            vec![child]
        );
    }

    #[test]
    fn camera_transform_applies_to_point_picking() {
        let mut fx = Fixture::new();
        let a = fx.rect(None, 1000.0, 1000.0);
        fx.camera.set_position(Vec2::new(1050.0, 1050.0));
        fx.camera.set_zoom(2.0);
        fx.frame();

        // Shape center sits at the viewport center regardless of zoom.
        let hit = fx.picker().element_from_point(Vec2::new(400.0, 300.0));
        assert_eq!(hit, Some(a));
        // A point outside the zoomed shape misses.
        let miss = fx.picker().element_from_point(Vec2::new(400.0 + 120.0, 300.0));
        assert_eq!(miss, None);
    }

    #[test]
    fn unselectable_shapes_are_skipped() {
        let mut fx = Fixture::new();
        let a = fx.rect(None, 0.0, 0.0);
        fx.graph.node_mut(a).unwrap().set_selectable(false);
        fx.frame();
        assert!(fx.picker().elements_from_bbox(Aabb::from_xywh(0.0, 0.0, 10.0, 10.0)).is_empty());
    }
}
