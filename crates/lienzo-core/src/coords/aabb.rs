use super::Vec2;

/// Axis-aligned bounding box, min/max corners in logical pixels.
///
/// Edges are inclusive: a point on the boundary is contained, and two boxes
/// that share an edge overlap. This matches what interactive picking expects
/// (clicking the outline of a shape selects it).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Aabb {
    #[inline]
    pub const fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    #[inline]
    pub fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    /// An inverted box that unions to any finite box.
    #[inline]
    pub const fn empty() -> Self {
        Self::new(f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY)
    }

    #[inline]
    pub fn min(self) -> Vec2 {
        Vec2::new(self.min_x, self.min_y)
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        Vec2::new(self.max_x, self.max_y)
    }

    #[inline]
    pub fn width(self) -> f32 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(self) -> f32 {
        self.max_y - self.min_y
    }

    #[inline]
    pub fn center(self) -> Vec2 {
        Vec2::new(0.5 * (self.min_x + self.max_x), 0.5 * (self.min_y + self.max_y))
    }

    /// True if the box is inverted or has no area. Assumes no NaN.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.max_x <= self.min_x || self.max_y <= self.min_y
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    /// Inclusive containment on all four edges.
    #[inline]
    pub fn contains_point(self, p: Vec2) -> bool {
        self.min_x <= p.x && p.x <= self.max_x && self.min_y <= p.y && p.y <= self.max_y
    }

    /// Inclusive overlap: boxes sharing an edge are considered overlapping.
    #[inline]
    pub fn overlaps(self, other: Aabb) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// The smallest box enclosing both.
    #[inline]
    pub fn union(self, other: Aabb) -> Aabb {
        Aabb::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Grows the box by `amount` on every side. Negative amounts shrink.
    #[inline]
    pub fn inflate(self, amount: f32) -> Aabb {
        Aabb::new(
            self.min_x - amount,
            self.min_y - amount,
            self.max_x + amount,
            self.max_y + amount,
        )
    }

    /// Shifts the box by `d`.
    #[inline]
    pub fn translate(self, d: Vec2) -> Aabb {
        Aabb::new(self.min_x + d.x, self.min_y + d.y, self.max_x + d.x, self.max_y + d.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(x0: f32, y0: f32, x1: f32, y1: f32) -> Aabb {
        Aabb::new(x0, y0, x1, y1)
    }

    // ── contains ──────────────────────────────────────────────────────────

    #[test]
    fn contains_interior_and_edges() {
        let a = b(0.0, 0.0, 10.0, 10.0);
        assert!(a.contains_point(Vec2::new(5.0, 5.0)));
        assert!(a.contains_point(Vec2::new(0.0, 0.0)));
        assert!(a.contains_point(Vec2::new(10.0, 10.0)));
        assert!(!a.contains_point(Vec2::new(10.1, 5.0)));
    }

    // ── overlaps ──────────────────────────────────────────────────────────

    #[test]
    fn overlaps_shared_edge() {
        assert!(b(0.0, 0.0, 10.0, 10.0).overlaps(b(10.0, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn overlaps_disjoint() {
        assert!(!b(0.0, 0.0, 5.0, 5.0).overlaps(b(6.0, 6.0, 9.0, 9.0)));
    }

    // ── union / empty ─────────────────────────────────────────────────────

    #[test]
    fn union_from_empty_is_identity() {
        let a = b(1.0, 2.0, 3.0, 4.0);
        assert_eq!(Aabb::empty().union(a), a);
    }

    #[test]
    fn inflate_grows_every_side() {
        let a = b(0.0, 0.0, 10.0, 10.0).inflate(2.5);
        assert_eq!(a, b(-2.5, -2.5, 12.5, 12.5));
    }

    #[test]
    fn empty_box_reports_empty() {
        assert!(Aabb::empty().is_empty());
        assert!(b(0.0, 0.0, 0.0, 5.0).is_empty());
        assert!(!b(0.0, 0.0, 1.0, 1.0).is_empty());
    }
}
