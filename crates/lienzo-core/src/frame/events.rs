use crate::scene::{NodeId, SceneGraph};

/// What a completed pipeline run produced.
#[derive(Debug, Default)]
pub struct FrameOutput {
    /// Every live shape (root excluded), in render order.
    pub all: Vec<NodeId>,
    /// Shapes whose appearance or world bounds changed this frame.
    pub modified: Vec<NodeId>,
    /// Shapes present last frame but gone now. Stale handles: they no longer
    /// resolve against the graph.
    pub removed: Vec<NodeId>,
    /// False when the graph was clean and the frame was skipped entirely.
    pub rendered: bool,
}

/// Hooks into the frame pipeline.
///
/// Observers must be side-effect-free when the event sets are empty; a
/// skipped frame never reaches them at all.
pub trait FrameObserver {
    fn begin_frame(&mut self, graph: &SceneGraph, output: &FrameOutput);

    /// Called once per shape reached by the render traversal, in render
    /// order.
    fn render(&mut self, graph: &SceneGraph, id: NodeId) {
        let _ = (graph, id);
    }

    fn end_frame(&mut self, graph: &SceneGraph, output: &FrameOutput);
}
