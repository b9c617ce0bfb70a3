use super::node::ShapeNode;

/// Generational handle to a shape node.
///
/// Handles are non-owning: deleting a node bumps the slot generation, so a
/// stale handle held by another subsystem (picker results, drawcall caches,
/// a camera follow target) resolves to `None` instead of dangling.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32, u32);

impl NodeId {
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.1
    }
}

struct Slot {
    generation: u32,
    node: ShapeNode,
}

/// Slot arena for shape nodes with a free list and generation checks.
#[derive(Default)]
pub(crate) struct Arena {
    slots: Vec<Option<Slot>>,
    // Generation survives vacancy so a freed slot's next occupant gets a
    // strictly newer generation.
    generations: Vec<u32>,
    free: Vec<usize>,
    live: usize,
}

impl Arena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, node: ShapeNode) -> NodeId {
        if let Some(idx) = self.free.pop() {
            let generation = self.generations[idx] + 1;
            self.generations[idx] = generation;
            self.slots[idx] = Some(Slot { generation, node });
            self.live += 1;
            NodeId::new(idx, generation)
        } else {
            let generation = 1;
            self.slots.push(Some(Slot { generation, node }));
            self.generations.push(generation);
            self.live += 1;
            NodeId::new(self.slots.len() - 1, generation)
        }
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<ShapeNode> {
        let slot = self.slots.get_mut(id.idx())?;
        match slot {
            Some(s) if s.generation == id.generation() => {
                let s = slot.take().expect("matched Some above");
                self.free.push(id.idx());
                self.live -= 1;
                Some(s.node)
            }
            _ => None,
        }
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&ShapeNode> {
        match self.slots.get(id.idx())? {
            Some(s) if s.generation == id.generation() => Some(&s.node),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut ShapeNode> {
        match self.slots.get_mut(id.idx())? {
            Some(s) if s.generation == id.generation() => Some(&mut s.node),
            _ => None,
        }
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Geometry;

    fn node() -> ShapeNode {
        ShapeNode::new(Geometry::Group, 0)
    }

    #[test]
    fn stale_handle_resolves_to_none() {
        let mut arena = Arena::new();
        let a = arena.insert(node());
        assert!(arena.contains(a));

        arena.remove(a);
        assert!(!arena.contains(a));

        // Reusing the slot must not resurrect the old handle.
        let b = arena.insert(node());
        assert_eq!(a.idx(), b.idx());
        assert!(arena.get(a).is_none());
        assert!(arena.get(b).is_some());
    }

    #[test]
    fn double_remove_is_none() {
        let mut arena = Arena::new();
        let a = arena.insert(node());
        assert!(arena.remove(a).is_some());
        assert!(arena.remove(a).is_none());
        assert_eq!(arena.len(), 0);
    }

    #[test]
    fn generation_strictly_increases_across_reuse() {
        let mut arena = Arena::new();
        let a = arena.insert(node());
        arena.remove(a);
        let b = arena.insert(node());
        arena.remove(b);
        let c = arena.insert(node());
        assert!(c.generation() > b.generation());
        assert!(b.generation() > a.generation());
    }
}
