use crate::coords::{Aabb, Vec2};

/// Shape geometry, a closed set of variants.
///
/// Extending the scene:
/// - add a variant here with its bounds inference
/// - extend the drawcall table in `batch::manager`
/// - add or reuse a drawcall variant under `batch::*`
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Structural node with no geometry of its own. Yields zero drawcalls
    /// and is never entered into the spatial index.
    Group,
    Circle {
        center: Vec2,
        radius: f32,
    },
    Ellipse {
        center: Vec2,
        rx: f32,
        ry: f32,
    },
    Rect {
        origin: Vec2,
        size: Vec2,
    },
    Polyline {
        points: Vec<Vec2>,
    },
    /// Closed outline, filled as a triangle fan by the mesh drawcall.
    Path {
        points: Vec<Vec2>,
    },
    Text {
        content: String,
        font_size: f32,
    },
}

/// Geometry class used for batch bucketing and the drawcall table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Group,
    Circle,
    Ellipse,
    Rect,
    Polyline,
    Path,
    Text,
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Group => GeometryKind::Group,
            Geometry::Circle { .. } => GeometryKind::Circle,
            Geometry::Ellipse { .. } => GeometryKind::Ellipse,
            Geometry::Rect { .. } => GeometryKind::Rect,
            Geometry::Polyline { .. } => GeometryKind::Polyline,
            Geometry::Path { .. } => GeometryKind::Path,
            Geometry::Text { .. } => GeometryKind::Text,
        }
    }

    /// Local geometry bounds, stroke excluded.
    ///
    /// Returns `None` when bounds cannot be inferred (degenerate or
    /// non-finite input); insertion treats that as a configuration error.
    /// `Group` returns an empty box: structural nodes are valid but carry no
    /// geometry of their own.
    pub fn bounds(&self) -> Option<Aabb> {
        let b = match self {
            Geometry::Group => return Some(Aabb::empty()),
            Geometry::Circle { center, radius } => {
                if *radius <= 0.0 {
                    return None;
                }
                Aabb::new(
                    center.x - radius,
                    center.y - radius,
                    center.x + radius,
                    center.y + radius,
                )
            }
            Geometry::Ellipse { center, rx, ry } => {
                if *rx <= 0.0 || *ry <= 0.0 {
                    return None;
                }
                Aabb::new(center.x - rx, center.y - ry, center.x + rx, center.y + ry)
            }
            Geometry::Rect { origin, size } => {
                if size.x <= 0.0 || size.y <= 0.0 {
                    return None;
                }
                Aabb::from_xywh(origin.x, origin.y, size.x, size.y)
            }
            Geometry::Polyline { points } | Geometry::Path { points } => {
                if points.len() < 2 {
                    return None;
                }
                let mut b = Aabb::empty();
                for p in points {
                    // min/max would silently drop a NaN coordinate here.
                    if !p.is_finite() {
                        return None;
                    }
                    b = b.union(Aabb::new(p.x, p.y, p.x, p.y));
                }
                b
            }
            Geometry::Text { content, font_size } => {
                if content.is_empty() || *font_size <= 0.0 {
                    return None;
                }
                // Metric estimate; exact extents come from the glyph shaper
                // at flush time. Good enough for indexing and culling.
                let width = content.chars().count() as f32 * font_size * 0.6;
                Aabb::from_xywh(0.0, 0.0, width, font_size * 1.2)
            }
        };
        b.is_finite().then_some(b)
    }

    /// Sampled outline in local space, used by stroke and mesh drawcalls.
    ///
    /// Closed shapes repeat their first point at the end.
    pub fn outline(&self) -> Vec<Vec2> {
        match self {
            Geometry::Group | Geometry::Text { .. } => Vec::new(),
            Geometry::Circle { center, radius } => {
                sample_ellipse(*center, *radius, *radius)
            }
            Geometry::Ellipse { center, rx, ry } => sample_ellipse(*center, *rx, *ry),
            Geometry::Rect { origin, size } => {
                let o = *origin;
                let s = *size;
                vec![
                    o,
                    Vec2::new(o.x + s.x, o.y),
                    Vec2::new(o.x + s.x, o.y + s.y),
                    Vec2::new(o.x, o.y + s.y),
                    o,
                ]
            }
            Geometry::Polyline { points } => points.clone(),
            Geometry::Path { points } => {
                let mut out = points.clone();
                if out.first() != out.last() {
                    if let Some(&first) = out.first() {
                        out.push(first);
                    }
                }
                out
            }
        }
    }
}

const ELLIPSE_SEGMENTS: usize = 48;

fn sample_ellipse(center: Vec2, rx: f32, ry: f32) -> Vec<Vec2> {
    let mut out = Vec::with_capacity(ELLIPSE_SEGMENTS + 1);
    for i in 0..=ELLIPSE_SEGMENTS {
        let t = i as f32 / ELLIPSE_SEGMENTS as f32 * core::f32::consts::TAU;
        out.push(Vec2::new(center.x + rx * t.cos(), center.y + ry * t.sin()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_bounds() {
        let g = Geometry::Circle { center: Vec2::new(10.0, 10.0), radius: 5.0 };
        assert_eq!(g.bounds().unwrap(), Aabb::new(5.0, 5.0, 15.0, 15.0));
    }

    #[test]
    fn degenerate_geometry_has_no_bounds() {
        assert!(Geometry::Circle { center: Vec2::zero(), radius: 0.0 }.bounds().is_none());
        assert!(Geometry::Rect { origin: Vec2::zero(), size: Vec2::new(-1.0, 5.0) }
            .bounds()
            .is_none());
        assert!(Geometry::Polyline { points: vec![Vec2::zero()] }.bounds().is_none());
    }

    #[test]
    fn non_finite_points_have_no_bounds() {
        let g = Geometry::Polyline {
            points: vec![Vec2::zero(), Vec2::new(f32::NAN, 1.0)],
        };
        assert!(g.bounds().is_none());
        let g = Geometry::Path {
            points: vec![Vec2::new(f32::NAN, 0.0), Vec2::new(1.0, 1.0), Vec2::new(2.0, 0.0)],
        };
        assert!(g.bounds().is_none());
        let g = Geometry::Polyline {
            points: vec![Vec2::zero(), Vec2::new(f32::INFINITY, 1.0)],
        };
        assert!(g.bounds().is_none());
    }

    #[test]
    fn group_bounds_are_empty_but_valid() {
        let b = Geometry::Group.bounds().unwrap();
        assert!(b.is_empty());
    }

    #[test]
    fn path_outline_closes() {
        let g = Geometry::Path {
            points: vec![Vec2::zero(), Vec2::new(10.0, 0.0), Vec2::new(5.0, 8.0)],
        };
        let outline = g.outline();
        assert_eq!(outline.first(), outline.last());
        assert_eq!(outline.len(), 4);
    }
}
