use super::{Aabb, Vec2};

/// 2D affine transform.
///
/// Maps a point as:
/// ```text
/// x' = a * x + c * y + tx
/// y' = b * x + d * y + ty
/// ```
///
/// Composition is deterministic: the same operand values always produce
/// bit-identical results, which the frame pipeline relies on when checking
/// that an unchanged subtree yields unchanged world transforms.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform2D {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Transform2D {
    pub const IDENTITY: Self = Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, tx: 0.0, ty: 0.0 };

    /// Builds a local transform from translation, rotation (radians,
    /// clockwise in +Y-down space) and non-uniform scale.
    ///
    /// Order is scale, then rotate, then translate.
    #[inline]
    pub fn from_trs(translation: Vec2, rotation: f32, scale: Vec2) -> Self {
        let (sin, cos) = rotation.sin_cos();
        Self {
            a: cos * scale.x,
            b: sin * scale.x,
            c: -sin * scale.y,
            d: cos * scale.y,
            tx: translation.x,
            ty: translation.y,
        }
    }

    #[inline]
    pub const fn from_translation(t: Vec2) -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, tx: t.x, ty: t.y }
    }

    /// `self * rhs`: applies `rhs` first, then `self`.
    ///
    /// World composition is `parent.then(local)`.
    #[inline]
    pub fn then(self, rhs: Transform2D) -> Transform2D {
        Transform2D {
            a: self.a * rhs.a + self.c * rhs.b,
            b: self.b * rhs.a + self.d * rhs.b,
            c: self.a * rhs.c + self.c * rhs.d,
            d: self.b * rhs.c + self.d * rhs.d,
            tx: self.a * rhs.tx + self.c * rhs.ty + self.tx,
            ty: self.b * rhs.tx + self.d * rhs.ty + self.ty,
        }
    }

    #[inline]
    pub fn transform_point(self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    /// Transforms all four corners and re-wraps them in an axis-aligned box.
    pub fn transform_aabb(self, aabb: Aabb) -> Aabb {
        let corners = [
            self.transform_point(Vec2::new(aabb.min_x, aabb.min_y)),
            self.transform_point(Vec2::new(aabb.max_x, aabb.min_y)),
            self.transform_point(Vec2::new(aabb.max_x, aabb.max_y)),
            self.transform_point(Vec2::new(aabb.min_x, aabb.max_y)),
        ];
        let mut min = corners[0];
        let mut max = corners[0];
        for &c in &corners[1..] {
            min = min.min(c);
            max = max.max(c);
        }
        Aabb::new(min.x, min.y, max.x, max.y)
    }

    /// Inverse transform, or `None` if the matrix is singular.
    pub fn inverse(self) -> Option<Transform2D> {
        let det = self.a * self.d - self.b * self.c;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Transform2D {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            tx: (self.c * self.ty - self.d * self.tx) * inv,
            ty: (self.b * self.tx - self.a * self.ty) * inv,
        })
    }

    /// The maximum scale factor applied along either axis.
    ///
    /// Used to inflate render bounds for strokes under non-uniform scale.
    #[inline]
    pub fn max_scale(self) -> f32 {
        let sx = (self.a * self.a + self.b * self.b).sqrt();
        let sy = (self.c * self.c + self.d * self.d).sqrt();
        sx.max(sy)
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}
