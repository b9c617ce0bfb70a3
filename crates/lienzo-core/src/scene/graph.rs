use anyhow::{Context, bail};

use super::handle::Arena;
use super::node::DirtyFlags;
use super::{Geometry, NodeId, ShapeNode};

/// The shape hierarchy.
///
/// Owns every node through a generational arena; parents and children refer
/// to each other by handle. The root is a structural group created with the
/// graph and cannot be removed or reparented.
pub struct SceneGraph {
    arena: Arena,
    root: NodeId,
    /// Monotonic insertion counter, the final sibling sort tie-break.
    seq: u64,
    /// Raised by structural mutation (append, remove, reparent) so the frame
    /// pipeline re-renders even when no surviving node is dirty.
    structure_dirty: bool,
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.insert(ShapeNode::new(Geometry::Group, 0));
        Self { arena, root, seq: 1, structure_dirty: true }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        // The root always exists.
        self.arena.len() <= 1
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains(id)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&ShapeNode> {
        self.arena.get(id)
    }

    /// Mutable access to a node's attributes. Setters on [`ShapeNode`] raise
    /// their own dirty flags; z-order changes must go through
    /// [`set_z_index`](Self::set_z_index) and
    /// [`set_fractional_index`](Self::set_fractional_index) since they dirty
    /// the parent's sort cache.
    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ShapeNode> {
        self.arena.get_mut(id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.arena.get(id).map(|n| n.children()).unwrap_or(&[])
    }

    /// True when the shape and every ancestor up to the root are visible.
    /// Stale handles are not visible.
    pub fn visible_through_ancestors(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            let Some(node) = self.node(cur) else { return false };
            if !node.visible() {
                return false;
            }
            cursor = node.parent();
        }
        true
    }

    // ── structure ─────────────────────────────────────────────────────────

    /// Inserts a new shape under `parent` (the root when `None`).
    ///
    /// Fails when the geometry's bounds cannot be inferred; a shape that the
    /// index and culling cannot reason about never enters the graph.
    pub fn append(&mut self, parent: Option<NodeId>, geometry: Geometry) -> anyhow::Result<NodeId> {
        let parent = parent.unwrap_or(self.root);
        if !self.arena.contains(parent) {
            bail!("append: parent handle is stale");
        }
        geometry
            .bounds()
            .with_context(|| format!("append: bounds not inferable for {:?}", geometry.kind()))?;

        let seq = self.seq;
        self.seq += 1;
        let mut node = ShapeNode::new(geometry, seq);
        node.parent = Some(parent);
        let id = self.arena.insert(node);

        let p = self.arena.get_mut(parent).expect("checked above");
        p.children.push(id);
        p.dirty |= DirtyFlags::SORT;
        self.structure_dirty = true;
        Ok(id)
    }

    /// Removes a node and its entire subtree. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> anyhow::Result<()> {
        if id == self.root {
            bail!("remove: the root group cannot be removed");
        }
        let Some(node) = self.arena.get(id) else {
            bail!("remove: handle is stale");
        };
        let parent = node.parent;

        if let Some(parent) = parent
            && let Some(p) = self.arena.get_mut(parent)
        {
            p.children.retain(|&c| c != id);
            p.sorted.retain(|&c| c != id);
            p.dirty |= DirtyFlags::SORT;
        }

        // Iterative subtree teardown; child lists are owned by the removed
        // nodes so no sibling fixup is needed below the detach point.
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(node) = self.arena.remove(cur) {
                stack.extend(node.children);
            }
        }
        self.structure_dirty = true;
        Ok(())
    }

    /// Moves `id` under `new_parent`, keeping its attributes. Rejects moves
    /// that would create a cycle (reparenting under the node's own subtree).
    pub fn reparent(&mut self, id: NodeId, new_parent: NodeId) -> anyhow::Result<()> {
        if id == self.root {
            bail!("reparent: the root group cannot be reparented");
        }
        if !self.arena.contains(id) || !self.arena.contains(new_parent) {
            bail!("reparent: handle is stale");
        }
        // Walk up from the destination; hitting `id` means the destination
        // lives inside the moved subtree.
        let mut cursor = Some(new_parent);
        while let Some(cur) = cursor {
            if cur == id {
                bail!("reparent: destination is inside the moved subtree");
            }
            cursor = self.arena.get(cur).and_then(|n| n.parent);
        }

        let old_parent = self.arena.get(id).and_then(|n| n.parent);
        if old_parent == Some(new_parent) {
            return Ok(());
        }
        if let Some(old) = old_parent
            && let Some(p) = self.arena.get_mut(old)
        {
            p.children.retain(|&c| c != id);
            p.sorted.retain(|&c| c != id);
            p.dirty |= DirtyFlags::SORT;
        }

        let seq = self.seq;
        self.seq += 1;
        {
            let node = self.arena.get_mut(id).expect("checked above");
            node.parent = Some(new_parent);
            // New insertion slot among the new siblings.
            node.seq = seq;
            node.dirty |= DirtyFlags::TRANSFORM;
        }
        let p = self.arena.get_mut(new_parent).expect("checked above");
        p.children.push(id);
        p.dirty |= DirtyFlags::SORT;
        self.structure_dirty = true;
        Ok(())
    }

    // ── z-order ───────────────────────────────────────────────────────────

    /// Sets the explicit z layer; dirties the parent's sort cache.
    pub fn set_z_index(&mut self, id: NodeId, z: i32) {
        let changed = match self.arena.get_mut(id) {
            Some(n) => n.set_z_index_raw(z),
            None => false,
        };
        if changed {
            self.dirty_parent_sort(id);
        }
    }

    /// Sets the fractional ordering key; dirties the parent's sort cache.
    pub fn set_fractional_index(&mut self, id: NodeId, fractional: Option<f64>) {
        let changed = match self.arena.get_mut(id) {
            Some(n) => n.set_fractional_raw(fractional),
            None => false,
        };
        if changed {
            self.dirty_parent_sort(id);
        }
    }

    fn dirty_parent_sort(&mut self, id: NodeId) {
        let parent = self.arena.get(id).and_then(|n| n.parent);
        if let Some(parent) = parent
            && let Some(p) = self.arena.get_mut(parent)
        {
            p.dirty |= DirtyFlags::SORT;
        }
    }

    // ── geometry ──────────────────────────────────────────────────────────

    /// Replaces a shape's geometry, validating bounds inference first.
    pub fn set_geometry(&mut self, id: NodeId, geometry: Geometry) -> anyhow::Result<()> {
        geometry.bounds().with_context(|| {
            format!("set_geometry: bounds not inferable for {:?}", geometry.kind())
        })?;
        let Some(node) = self.arena.get_mut(id) else {
            bail!("set_geometry: handle is stale");
        };
        node.set_geometry_unchecked(geometry);
        Ok(())
    }

    // ── pipeline hooks ────────────────────────────────────────────────────

    /// Consumes the structural-change flag; used by the frame pipeline.
    pub(crate) fn take_structure_dirty(&mut self) -> bool {
        core::mem::take(&mut self.structure_dirty)
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use crate::scene::GeometryKind;

    fn circle() -> Geometry {
        Geometry::Circle { center: Vec2::zero(), radius: 5.0 }
    }

    // ── structure ─────────────────────────────────────────────────────────

    #[test]
    fn append_attaches_to_root_by_default() {
        let mut g = SceneGraph::new();
        let a = g.append(None, circle()).unwrap();
        assert_eq!(g.node(a).unwrap().parent(), Some(g.root()));
        assert_eq!(g.children(g.root()), &[a]);
    }

    #[test]
    fn append_rejects_degenerate_geometry() {
        let mut g = SceneGraph::new();
        let bad = Geometry::Circle { center: Vec2::zero(), radius: 0.0 };
        assert!(g.append(None, bad).is_err());
        assert!(g.is_empty());
    }

    #[test]
    fn remove_tears_down_the_subtree() {
        let mut g = SceneGraph::new();
        let group = g.append(None, Geometry::Group).unwrap();
        let a = g.append(Some(group), circle()).unwrap();
        let b = g.append(Some(a), circle()).unwrap();

        g.remove(group).unwrap();
        assert!(!g.contains(group));
        assert!(!g.contains(a));
        assert!(!g.contains(b));
        assert!(g.children(g.root()).is_empty());
    }

    #[test]
    fn remove_root_fails() {
        let mut g = SceneGraph::new();
        let root = g.root();
        assert!(g.remove(root).is_err());
        assert!(g.contains(root));
    }

    #[test]
    fn stale_handle_after_remove() {
        let mut g = SceneGraph::new();
        let a = g.append(None, circle()).unwrap();
        g.remove(a).unwrap();
        assert!(g.node(a).is_none());
        assert!(g.remove(a).is_err());
    }

    // ── reparent ──────────────────────────────────────────────────────────

    #[test]
    fn reparent_moves_between_groups() {
        let mut g = SceneGraph::new();
        let g1 = g.append(None, Geometry::Group).unwrap();
        let g2 = g.append(None, Geometry::Group).unwrap();
        let a = g.append(Some(g1), circle()).unwrap();

        g.reparent(a, g2).unwrap();
        assert_eq!(g.node(a).unwrap().parent(), Some(g2));
        assert!(g.children(g1).is_empty());
        assert_eq!(g.children(g2), &[a]);
    }

    #[test]
    fn reparent_rejects_cycles() {
        let mut g = SceneGraph::new();
        let g1 = g.append(None, Geometry::Group).unwrap();
        let g2 = g.append(Some(g1), Geometry::Group).unwrap();
        let g3 = g.append(Some(g2), Geometry::Group).unwrap();

        assert!(g.reparent(g1, g3).is_err());
        assert!(g.reparent(g1, g1).is_err());
        // Structure untouched.
        assert_eq!(g.node(g1).unwrap().parent(), Some(g.root()));
    }

    // ── z-order ───────────────────────────────────────────────────────────

    #[test]
    fn z_index_dirties_parent_sort() {
        let mut g = SceneGraph::new();
        let group = g.append(None, Geometry::Group).unwrap();
        let a = g.append(Some(group), circle()).unwrap();
        g.node_mut(group).unwrap().dirty = DirtyFlags::empty();

        g.set_z_index(a, 3);
        assert!(g.node(group).unwrap().dirty.contains(DirtyFlags::SORT));

        // No-op change leaves the parent clean.
        g.node_mut(group).unwrap().dirty = DirtyFlags::empty();
        g.set_z_index(a, 3);
        assert!(!g.node(group).unwrap().dirty.contains(DirtyFlags::SORT));
    }

    #[test]
    fn geometry_swap_validates_bounds() {
        let mut g = SceneGraph::new();
        let a = g.append(None, circle()).unwrap();
        let bad = Geometry::Rect { origin: Vec2::zero(), size: Vec2::zero() };
        assert!(g.set_geometry(a, bad).is_err());
        // Old geometry survives a rejected swap.
        assert_eq!(g.node(a).unwrap().geometry().kind(), GeometryKind::Circle);
    }
}
