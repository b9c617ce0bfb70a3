use std::collections::HashSet;

use crate::coords::Transform2D;
use crate::scene::{DirtyFlags, GeometryKind, NodeId, SceneGraph, SortKey};

use super::{FrameObserver, FrameOutput};

/// Drives one frame over the scene graph.
///
/// Keeps the set of shapes committed last frame so removals can be reported
/// as events even though the handles no longer resolve.
pub struct FramePipeline {
    previous: HashSet<NodeId>,
}

impl FramePipeline {
    pub fn new() -> Self {
        Self { previous: HashSet::new() }
    }

    /// Runs one frame. Returns what changed; `rendered` is false when the
    /// graph was clean and everything (including observers) was skipped.
    pub fn run(
        &mut self,
        graph: &mut SceneGraph,
        observers: &mut [Box<dyn FrameObserver>],
    ) -> FrameOutput {
        let structure_changed = graph.take_structure_dirty();
        let mut output = FrameOutput::default();
        let mut current = HashSet::new();

        self.update_pass(graph, &mut output, &mut current);

        output.removed = self.previous.difference(&current).copied().collect();
        output.rendered =
            structure_changed || !output.modified.is_empty() || !output.removed.is_empty();

        if output.rendered {
            // A shape whose render order shifted needs its depth rebuilt even
            // when nothing else about it changed. Orders are assigned before
            // begin_frame so both notifications carry the same change sets.
            let (draw_order, order_changed) = self.render_pass(graph);
            let seen: HashSet<NodeId> = output.modified.iter().copied().collect();
            output
                .modified
                .extend(order_changed.into_iter().filter(|id| !seen.contains(id)));
            log::trace!(
                "frame: {} shapes, {} modified, {} removed",
                output.all.len(),
                output.modified.len(),
                output.removed.len()
            );
            for obs in observers.iter_mut() {
                obs.begin_frame(graph, &output);
            }
            for &id in &draw_order {
                for obs in observers.iter_mut() {
                    obs.render(graph, id);
                }
            }
            for obs in observers.iter_mut() {
                obs.end_frame(graph, &output);
            }
        }

        self.previous = current;
        output
    }

    /// Recomputes sort caches, world transforms and bounds top-down, and
    /// collects the modified set. Clears every consumed dirty flag; a shape
    /// whose world AABB moved counts as modified even when only an ancestor's
    /// transform changed.
    fn update_pass(
        &mut self,
        graph: &mut SceneGraph,
        output: &mut FrameOutput,
        current: &mut HashSet<NodeId>,
    ) {
        let root = graph.root();
        let mut stack = vec![(root, Transform2D::IDENTITY)];

        while let Some((id, parent_world)) = stack.pop() {
            let needs_sort = match graph.node(id) {
                Some(n) => {
                    n.dirty.contains(DirtyFlags::SORT) || n.sorted.len() != n.children.len()
                }
                None => continue,
            };
            if needs_sort {
                let children = graph.node(id).map(|n| n.children.clone()).unwrap_or_default();
                let mut keyed: Vec<(SortKey, NodeId)> = children
                    .iter()
                    .filter_map(|&c| graph.node(c).map(|n| (n.sort_key(), c)))
                    .collect();
                keyed.sort_by(|a, b| a.0.cmp(&b.0));
                if let Some(node) = graph.node_mut(id) {
                    node.sorted = keyed.into_iter().map(|(_, c)| c).collect();
                    node.dirty.remove(DirtyFlags::SORT);
                }
            }

            let world;
            {
                let Some(node) = graph.node_mut(id) else { continue };
                if node.dirty.contains(DirtyFlags::TRANSFORM) {
                    node.dirty.remove(DirtyFlags::TRANSFORM);
                    node.dirty |= DirtyFlags::BOUNDS | DirtyFlags::RENDER;
                }
                // World transforms always follow the parent; the dirty flag
                // only gates the derived-bounds refresh below.
                node.world_transform = parent_world.then(node.local_transform());
                world = node.world_transform;

                if node.dirty.contains(DirtyFlags::BOUNDS) {
                    node.recompute_local_bounds();
                    node.dirty.remove(DirtyFlags::BOUNDS);
                    node.dirty |= DirtyFlags::RENDER;
                }

                node.world_aabb = if node.render_bounds.is_empty() {
                    None
                } else {
                    Some(node.world_transform.transform_aabb(node.render_bounds))
                };
                let moved = node.world_aabb != node.committed_aabb;
                node.committed_aabb = node.world_aabb;

                if id != root {
                    current.insert(id);
                    output.all.push(id);
                    if moved || node.dirty.contains(DirtyFlags::RENDER) {
                        output.modified.push(id);
                    }
                }
                // The batch manager learns about changes through the modified
                // set, so these are spent once collected.
                node.dirty
                    .remove(DirtyFlags::RENDER | DirtyFlags::GEOMETRY | DirtyFlags::MATERIAL);
            }

            let sorted = graph.node(id).map(|n| n.sorted.clone()).unwrap_or_default();
            for &c in sorted.iter().rev() {
                stack.push((c, world));
            }
        }
    }

    /// Assigns render order (1-based, back to front) to every drawable shape.
    /// Invisible subtrees are pruned; culled shapes keep their children but
    /// draw nothing themselves. Returns the drawable shapes in draw order and
    /// the subset whose order changed since the last frame.
    fn render_pass(&mut self, graph: &mut SceneGraph) -> (Vec<NodeId>, Vec<NodeId>) {
        let root = graph.root();
        let mut counter: u32 = 1;
        let mut stack = vec![root];
        let mut draw_order = Vec::new();
        let mut order_changed = Vec::new();

        while let Some(id) = stack.pop() {
            let Some(node) = graph.node(id) else { continue };
            if id != root && !node.visible() {
                continue;
            }
            let drawable = id != root
                && node.renderable()
                && !node.culled()
                && node.geometry().kind() != GeometryKind::Group;
            let sorted = node.sorted.clone();

            if drawable {
                if let Some(node) = graph.node_mut(id)
                    && node.global_render_order != counter
                {
                    node.global_render_order = counter;
                    order_changed.push(id);
                }
                counter += 1;
                draw_order.push(id);
            }
            for &c in sorted.iter().rev() {
                stack.push(c);
            }
        }
        (draw_order, order_changed)
    }
}

impl Default for FramePipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use crate::scene::Geometry;

    fn circle_at(x: f32, y: f32) -> Geometry {
        Geometry::Circle { center: Vec2::new(x, y), radius: 5.0 }
    }

    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        begins: usize,
        ends: usize,
        rendered: Vec<NodeId>,
        begin_modified: Vec<NodeId>,
        end_modified: Vec<NodeId>,
    }

    /// Observer with externally readable counters.
    struct Recorder(Rc<RefCell<Log>>);

    impl Recorder {
        fn new() -> (Box<dyn FrameObserver>, Rc<RefCell<Log>>) {
            let log = Rc::new(RefCell::new(Log::default()));
            (Box::new(Recorder(log.clone())), log)
        }
    }

    impl FrameObserver for Recorder {
        fn begin_frame(&mut self, _graph: &SceneGraph, output: &FrameOutput) {
            let mut log = self.0.borrow_mut();
            log.begins += 1;
            log.begin_modified = output.modified.clone();
        }
        fn render(&mut self, _graph: &SceneGraph, id: NodeId) {
            self.0.borrow_mut().rendered.push(id);
        }
        fn end_frame(&mut self, _graph: &SceneGraph, output: &FrameOutput) {
            let mut log = self.0.borrow_mut();
            log.ends += 1;
            log.end_modified = output.modified.clone();
        }
    }

    // ── idempotence ───────────────────────────────────────────────────────

    #[test]
    fn clean_graph_skips_the_frame() {
        let mut graph = SceneGraph::new();
        graph.append(None, circle_at(0.0, 0.0)).unwrap();
        let mut pipeline = FramePipeline::new();
        let (obs, log) = Recorder::new();
        let mut observers = vec![obs];

        let first = pipeline.run(&mut graph, &mut observers);
        assert!(first.rendered);
        assert_eq!(log.borrow().begins, 1);
        assert_eq!(log.borrow().ends, 1);

        let second = pipeline.run(&mut graph, &mut observers);
        assert!(!second.rendered);
        assert!(second.modified.is_empty());
        assert!(second.removed.is_empty());
        // Observers were not touched on the clean frame.
        assert_eq!(log.borrow().begins, 1);
        assert_eq!(log.borrow().ends, 1);
    }

    #[test]
    fn render_notifications_follow_render_order() {
        let mut graph = SceneGraph::new();
        let a = graph.append(None, circle_at(0.0, 0.0)).unwrap();
        let b = graph.append(None, circle_at(10.0, 0.0)).unwrap();
        graph.set_z_index(a, 1);
        let mut pipeline = FramePipeline::new();
        let (obs, log) = Recorder::new();
        let mut observers = vec![obs];

        pipeline.run(&mut graph, &mut observers);
        assert_eq!(log.borrow().rendered, vec![b, a]);
    }

    // ── modification tracking ─────────────────────────────────────────────

    #[test]
    fn first_frame_reports_everything_modified() {
        let mut graph = SceneGraph::new();
        let a = graph.append(None, circle_at(0.0, 0.0)).unwrap();
        let b = graph.append(None, circle_at(100.0, 0.0)).unwrap();
        let mut pipeline = FramePipeline::new();

        let out = pipeline.run(&mut graph, &mut []);
        assert!(out.rendered);
        assert_eq!(out.all, vec![a, b]);
        assert_eq!(out.modified, vec![a, b]);
    }

    #[test]
    fn ancestor_move_marks_descendants_modified() {
        let mut graph = SceneGraph::new();
        let group = graph.append(None, Geometry::Group).unwrap();
        let child = graph.append(Some(group), circle_at(0.0, 0.0)).unwrap();
        let bystander = graph.append(None, circle_at(500.0, 0.0)).unwrap();
        let mut pipeline = FramePipeline::new();
        pipeline.run(&mut graph, &mut []);

        graph.node_mut(group).unwrap().set_translation(Vec2::new(10.0, 0.0));
        let out = pipeline.run(&mut graph, &mut []);
        assert!(out.rendered);
        assert!(out.modified.contains(&child));
        assert!(!out.modified.contains(&bystander));
    }

    #[test]
    fn removal_is_reported_once() {
        let mut graph = SceneGraph::new();
        let a = graph.append(None, circle_at(0.0, 0.0)).unwrap();
        let b = graph.append(None, circle_at(50.0, 0.0)).unwrap();
        let mut pipeline = FramePipeline::new();
        pipeline.run(&mut graph, &mut []);

        graph.remove(a).unwrap();
        let out = pipeline.run(&mut graph, &mut []);
        assert!(out.rendered);
        assert_eq!(out.removed, vec![a]);
        assert_eq!(out.all, vec![b]);

        let out = pipeline.run(&mut graph, &mut []);
        assert!(!out.rendered);
        assert!(out.removed.is_empty());
    }

    // ── ordering ──────────────────────────────────────────────────────────

    #[test]
    fn render_order_follows_z_then_insertion() {
        let mut graph = SceneGraph::new();
        let a = graph.append(None, circle_at(0.0, 0.0)).unwrap();
        let b = graph.append(None, circle_at(10.0, 0.0)).unwrap();
        let c = graph.append(None, circle_at(20.0, 0.0)).unwrap();
        graph.set_z_index(a, 5);
        let mut pipeline = FramePipeline::new();

        let out = pipeline.run(&mut graph, &mut []);
        // b and c keep insertion order, a is lifted above both.
        assert_eq!(out.all, vec![b, c, a]);
        assert_eq!(graph.node(b).unwrap().global_render_order(), 1);
        assert_eq!(graph.node(c).unwrap().global_render_order(), 2);
        assert_eq!(graph.node(a).unwrap().global_render_order(), 3);
    }

    #[test]
    fn invisible_subtrees_are_pruned_from_render_order() {
        let mut graph = SceneGraph::new();
        let group = graph.append(None, Geometry::Group).unwrap();
        let hidden_child = graph.append(Some(group), circle_at(0.0, 0.0)).unwrap();
        let shown = graph.append(None, circle_at(10.0, 0.0)).unwrap();
        graph.node_mut(group).unwrap().set_visible(false);
        let mut pipeline = FramePipeline::new();

        pipeline.run(&mut graph, &mut []);
        assert_eq!(graph.node(shown).unwrap().global_render_order(), 1);
        // Never visited by the render traversal.
        assert_eq!(graph.node(hidden_child).unwrap().global_render_order(), 0);
    }

    #[test]
    fn z_change_resorts_on_the_next_frame() {
        let mut graph = SceneGraph::new();
        let a = graph.append(None, circle_at(0.0, 0.0)).unwrap();
        let b = graph.append(None, circle_at(10.0, 0.0)).unwrap();
        let mut pipeline = FramePipeline::new();
        pipeline.run(&mut graph, &mut []);

        graph.set_z_index(a, 1);
        let out = pipeline.run(&mut graph, &mut []);
        assert!(out.rendered);
        assert_eq!(out.all, vec![b, a]);
        // The displaced sibling changed render order, so it is modified too.
        assert!(out.modified.contains(&a));
        assert!(out.modified.contains(&b));
    }

    #[test]
    fn observers_see_one_modified_set_per_frame() {
        let mut graph = SceneGraph::new();
        let a = graph.append(None, circle_at(0.0, 0.0)).unwrap();
        let b = graph.append(None, circle_at(10.0, 0.0)).unwrap();
        let mut pipeline = FramePipeline::new();
        let (obs, log) = Recorder::new();
        let mut observers = vec![obs];
        pipeline.run(&mut graph, &mut observers);

        // The z change displaces b; both hooks must already carry it.
        graph.set_z_index(a, 1);
        pipeline.run(&mut graph, &mut observers);
        let log = log.borrow();
        assert_eq!(log.begin_modified, log.end_modified);
        assert!(log.begin_modified.contains(&b));
    }

    // ── world transforms ──────────────────────────────────────────────────

    #[test]
    fn world_transform_composes_through_parents() {
        let mut graph = SceneGraph::new();
        let group = graph.append(None, Geometry::Group).unwrap();
        let child = graph.append(Some(group), circle_at(0.0, 0.0)).unwrap();
        graph.node_mut(group).unwrap().set_translation(Vec2::new(100.0, 0.0));
        graph.node_mut(child).unwrap().set_translation(Vec2::new(0.0, 50.0));
        let mut pipeline = FramePipeline::new();
        pipeline.run(&mut graph, &mut []);

        let w = graph.node(child).unwrap().world_transform();
        let p = w.transform_point(Vec2::zero());
        assert_eq!(p, Vec2::new(100.0, 50.0));
    }

    #[test]
    fn committed_aabb_is_bit_stable_across_clean_frames() {
        let mut graph = SceneGraph::new();
        let group = graph.append(None, Geometry::Group).unwrap();
        let child = graph.append(Some(group), circle_at(3.7, 9.1)).unwrap();
        graph.node_mut(group).unwrap().set_rotation(0.3);
        graph.node_mut(child).unwrap().set_scale(Vec2::new(1.3, 0.7));
        let mut pipeline = FramePipeline::new();

        pipeline.run(&mut graph, &mut []);
        let first = graph.node(child).unwrap().committed_aabb().unwrap();
        let out = pipeline.run(&mut graph, &mut []);
        assert!(!out.rendered);
        let second = graph.node(child).unwrap().committed_aabb().unwrap();
        assert_eq!(first.min_x.to_bits(), second.min_x.to_bits());
        assert_eq!(first.max_y.to_bits(), second.max_y.to_bits());
    }
}
