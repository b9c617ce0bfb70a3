use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;

use crate::coords::{Aabb, Vec2};

/// Cell edge length in canvas units. Sized for typical shape extents; a
/// shape spanning many cells just records more cell keys.
const CELL_SIZE: f32 = 256.0;

struct Entry {
    aabb: Aabb,
    cells: SmallVec<[(i32, i32); 4]>,
}

/// Uniform grid over canvas space.
///
/// Slots are plain indices with a free list; the caller maps its own handles
/// to slots. Queries prune by cell then confirm against the stored AABB, so
/// results are exact with respect to the committed boxes.
pub(crate) struct UniformGrid {
    cell_size: f32,
    cells: HashMap<(i32, i32), SmallVec<[usize; 8]>>,
    entries: Vec<Option<Entry>>,
    free: Vec<usize>,
    len: usize,
}

impl UniformGrid {
    pub(crate) fn new() -> Self {
        Self {
            cell_size: CELL_SIZE,
            cells: HashMap::new(),
            entries: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn cell_coord(&self, v: f32) -> i32 {
        (v / self.cell_size).floor() as i32
    }

    fn covered_cells(&self, aabb: Aabb) -> SmallVec<[(i32, i32); 4]> {
        let x0 = self.cell_coord(aabb.min_x);
        let y0 = self.cell_coord(aabb.min_y);
        let x1 = self.cell_coord(aabb.max_x);
        let y1 = self.cell_coord(aabb.max_y);
        let mut out = SmallVec::new();
        for y in y0..=y1 {
            for x in x0..=x1 {
                out.push((x, y));
            }
        }
        out
    }

    pub(crate) fn insert(&mut self, aabb: Aabb) -> usize {
        let slot = match self.free.pop() {
            Some(s) => s,
            None => {
                self.entries.push(None);
                self.entries.len() - 1
            }
        };
        let cells = self.covered_cells(aabb);
        for &key in &cells {
            self.cells.entry(key).or_default().push(slot);
        }
        self.entries[slot] = Some(Entry { aabb, cells });
        self.len += 1;
        slot
    }

    pub(crate) fn update(&mut self, slot: usize, aabb: Aabb) {
        if !matches!(self.entries.get(slot), Some(Some(_))) {
            return;
        }
        let fresh = self.covered_cells(aabb);
        let entry = self.entries[slot].as_mut().expect("checked above");
        entry.aabb = aabb;
        // Cell sets rarely change for small motions; skip the re-hash when
        // coverage is identical.
        if fresh == entry.cells {
            return;
        }
        let old = core::mem::replace(&mut entry.cells, fresh.clone());
        for key in old {
            if let Some(bucket) = self.cells.get_mut(&key) {
                bucket.retain(|&mut s| s != slot);
                if bucket.is_empty() {
                    self.cells.remove(&key);
                }
            }
        }
        for key in fresh {
            self.cells.entry(key).or_default().push(slot);
        }
    }

    pub(crate) fn remove(&mut self, slot: usize) {
        let Some(entry) = self.entries.get_mut(slot).and_then(Option::take) else { return };
        for key in entry.cells {
            if let Some(bucket) = self.cells.get_mut(&key) {
                bucket.retain(|&mut s| s != slot);
                if bucket.is_empty() {
                    self.cells.remove(&key);
                }
            }
        }
        self.free.push(slot);
        self.len -= 1;
    }

    /// Slots whose AABB contains the point (inclusive edges).
    pub(crate) fn query_point(&self, p: Vec2) -> Vec<usize> {
        let key = (self.cell_coord(p.x), self.cell_coord(p.y));
        let mut out = Vec::new();
        if let Some(bucket) = self.cells.get(&key) {
            for &slot in bucket {
                if let Some(Some(entry)) = self.entries.get(slot)
                    && entry.aabb.contains_point(p)
                {
                    out.push(slot);
                }
            }
        }
        out
    }

    /// Slots whose AABB overlaps the box (inclusive edges). Shapes spanning
    /// several queried cells are reported once.
    pub(crate) fn query_rect(&self, aabb: Aabb) -> Vec<usize> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for key in self.covered_cells(aabb) {
            if let Some(bucket) = self.cells.get(&key) {
                for &slot in bucket {
                    if seen.insert(slot)
                        && let Some(Some(entry)) = self.entries.get(slot)
                        && entry.aabb.overlaps(aabb)
                    {
                        out.push(slot);
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(x: f32, y: f32, w: f32, h: f32) -> Aabb {
        Aabb::from_xywh(x, y, w, h)
    }

    #[test]
    fn point_query_hits_only_containing_boxes() {
        let mut grid = UniformGrid::new();
        let a = grid.insert(b(0.0, 0.0, 100.0, 100.0));
        let c = grid.insert(b(50.0, 50.0, 100.0, 100.0));
        grid.insert(b(1000.0, 1000.0, 10.0, 10.0));

        let mut hits = grid.query_point(Vec2::new(75.0, 75.0));
        hits.sort();
        assert_eq!(hits, vec![a, c]);
    }

    #[test]
    fn rect_query_dedupes_cell_spanning_boxes() {
        let mut grid = UniformGrid::new();
        // Spans a 3x1 band of cells.
        let wide = grid.insert(b(-300.0, 0.0, 900.0, 10.0));
        let hits = grid.query_rect(b(-400.0, -10.0, 1200.0, 50.0));
        assert_eq!(hits, vec![wide]);
    }

    #[test]
    fn touching_edges_count_as_overlap() {
        let mut grid = UniformGrid::new();
        let a = grid.insert(b(0.0, 0.0, 10.0, 10.0));
        assert_eq!(grid.query_rect(b(10.0, 10.0, 5.0, 5.0)), vec![a]);
        assert_eq!(grid.query_point(Vec2::new(10.0, 10.0)), vec![a]);
    }

    #[test]
    fn update_moves_between_cells() {
        let mut grid = UniformGrid::new();
        let a = grid.insert(b(0.0, 0.0, 10.0, 10.0));
        grid.update(a, b(1000.0, 1000.0, 10.0, 10.0));
        assert!(grid.query_point(Vec2::new(5.0, 5.0)).is_empty());
        assert_eq!(grid.query_point(Vec2::new(1005.0, 1005.0)), vec![a]);
    }

    #[test]
    fn remove_vacates_and_recycles_slots() {
        let mut grid = UniformGrid::new();
        let a = grid.insert(b(0.0, 0.0, 10.0, 10.0));
        grid.remove(a);
        assert_eq!(grid.len(), 0);
        assert!(grid.query_point(Vec2::new(5.0, 5.0)).is_empty());

        let c = grid.insert(b(0.0, 0.0, 10.0, 10.0));
        assert_eq!(a, c);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn disjoint_boxes_query_exactly() {
        let mut grid = UniformGrid::new();
        let mut slots = Vec::new();
        for i in 0..8 {
            slots.push(grid.insert(b(i as f32 * 500.0, 0.0, 100.0, 100.0)));
        }
        for (i, &slot) in slots.iter().enumerate() {
            let hits = grid.query_rect(b(i as f32 * 500.0 + 10.0, 10.0, 50.0, 50.0));
            assert_eq!(hits, vec![slot]);
        }
    }
}
