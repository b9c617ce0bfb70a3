use bitflags::bitflags;

use crate::coords::{Aabb, Transform2D, Vec2};
use crate::paint::Color;

use super::Geometry;

bitflags! {
    /// Behavioral flags of a shape node.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct ShapeFlags: u8 {
        const VISIBLE    = 1 << 0;
        const CULLABLE   = 1 << 1;
        const RENDERABLE = 1 << 2;
        const BATCHABLE  = 1 << 3;
        const SELECTABLE = 1 << 4;
    }
}

bitflags! {
    /// Marks cached derived values stale. Each attribute setter documents
    /// which of these it raises.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct DirtyFlags: u8 {
        const TRANSFORM = 1 << 0;
        const BOUNDS    = 1 << 1;
        const RENDER    = 1 << 2;
        const SORT      = 1 << 3;
        const GEOMETRY  = 1 << 4;
        const MATERIAL  = 1 << 5;
    }
}

/// Pointer-events semantics, following the CSS `pointer-events` values the
/// picker understands.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum PointerEvents {
    #[default]
    Auto,
    None,
    VisiblePainted,
    VisibleFill,
    VisibleStroke,
    Visible,
    Painted,
    Fill,
    Stroke,
    All,
}

impl PointerEvents {
    /// Whether this mode only hits when the visibility cascade holds.
    #[inline]
    pub fn visibility_affected(self) -> bool {
        matches!(
            self,
            Self::Auto | Self::VisiblePainted | Self::VisibleFill | Self::VisibleStroke | Self::Visible
        )
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum StrokeAlignment {
    #[default]
    Center,
    Inner,
    Outer,
}

/// Drop shadow attributes. A zero blur radius disables the shadow drawcall.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DropShadow {
    pub color: Color,
    pub offset: Vec2,
    pub blur_radius: f32,
}

impl Default for DropShadow {
    fn default() -> Self {
        Self {
            color: Color::from_straight(0.0, 0.0, 0.0, 0.5),
            offset: Vec2::zero(),
            blur_radius: 0.0,
        }
    }
}

/// One element of the scene graph.
///
/// Structure fields (`parent`, `children`, `sorted`) are maintained by
/// [`SceneGraph`](super::SceneGraph) as a single source of truth; attribute
/// setters live here and raise exactly the dirty flags they affect.
#[derive(Debug)]
pub struct ShapeNode {
    pub(crate) parent: Option<super::NodeId>,
    /// Children in insertion order; authoritative for structure.
    pub(crate) children: Vec<super::NodeId>,
    /// Children in render order; rebuilt when `SORT` is dirty.
    pub(crate) sorted: Vec<super::NodeId>,
    /// Insertion sequence within the parent, the final sort tie-break.
    pub(crate) seq: u64,

    geometry: Geometry,
    rough: bool,

    translation: Vec2,
    rotation: f32,
    scale: Vec2,
    pub(crate) world_transform: Transform2D,

    /// Local geometry bounds, stroke excluded. Valid while `BOUNDS` is clear.
    pub(crate) geometry_bounds: Aabb,
    /// Local bounds including stroke and drop shadow.
    pub(crate) render_bounds: Aabb,
    /// World-space AABB, recomputed every traversal. `None` while the shape
    /// has no committed bounds (e.g. structural groups).
    pub(crate) world_aabb: Option<Aabb>,
    /// World AABB as of the end of the last completed frame; what the
    /// spatial index reflects.
    pub(crate) committed_aabb: Option<Aabb>,

    flags: ShapeFlags,
    culled: bool,
    pointer_events: PointerEvents,
    pub(crate) dirty: DirtyFlags,

    z_index: i32,
    fractional: Option<f64>,
    /// Monotonic per-frame counter assigned during the render traversal;
    /// drives depth and picking tie-breaks. 0 = never rendered.
    pub(crate) global_render_order: u32,

    fill: Color,
    stroke: Color,
    stroke_width: f32,
    stroke_alignment: StrokeAlignment,
    opacity: f32,
    shadow: DropShadow,
}

impl ShapeNode {
    pub(crate) fn new(geometry: Geometry, seq: u64) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            sorted: Vec::new(),
            seq,
            geometry,
            rough: false,
            translation: Vec2::zero(),
            rotation: 0.0,
            scale: Vec2::splat(1.0),
            world_transform: Transform2D::IDENTITY,
            geometry_bounds: Aabb::empty(),
            render_bounds: Aabb::empty(),
            world_aabb: None,
            committed_aabb: None,
            flags: ShapeFlags::all(),
            culled: false,
            pointer_events: PointerEvents::Auto,
            dirty: DirtyFlags::all(),
            z_index: 0,
            fractional: None,
            global_render_order: 0,
            fill: Color::BLACK,
            stroke: Color::transparent(),
            stroke_width: 1.0,
            stroke_alignment: StrokeAlignment::default(),
            opacity: 1.0,
            shadow: DropShadow::default(),
        }
    }

    // ── structure / identity ──────────────────────────────────────────────

    #[inline]
    pub fn parent(&self) -> Option<super::NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[super::NodeId] {
        &self.children
    }

    #[inline]
    pub fn sort_key(&self) -> super::SortKey {
        super::SortKey::new(self.z_index, self.fractional, self.seq)
    }

    #[inline]
    pub fn global_render_order(&self) -> u32 {
        self.global_render_order
    }

    // ── geometry ──────────────────────────────────────────────────────────

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Replaces the geometry. Raises `GEOMETRY | BOUNDS | RENDER`.
    ///
    /// The caller (graph) validates bounds inference before invoking this.
    pub(crate) fn set_geometry_unchecked(&mut self, geometry: Geometry) {
        self.geometry = geometry;
        self.dirty |= DirtyFlags::GEOMETRY | DirtyFlags::BOUNDS | DirtyFlags::RENDER;
    }

    #[inline]
    pub fn rough(&self) -> bool {
        self.rough
    }

    /// Toggles sketchy styling. Raises `GEOMETRY | MATERIAL | RENDER`
    /// (the drawcall set itself changes).
    pub fn set_rough(&mut self, rough: bool) {
        if self.rough != rough {
            self.rough = rough;
            self.dirty |= DirtyFlags::GEOMETRY | DirtyFlags::MATERIAL | DirtyFlags::RENDER;
        }
    }

    // ── transform ─────────────────────────────────────────────────────────

    #[inline]
    pub fn translation(&self) -> Vec2 {
        self.translation
    }

    /// Raises `TRANSFORM`.
    pub fn set_translation(&mut self, t: Vec2) {
        if self.translation != t {
            self.translation = t;
            self.dirty |= DirtyFlags::TRANSFORM;
        }
    }

    #[inline]
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Raises `TRANSFORM`.
    pub fn set_rotation(&mut self, radians: f32) {
        if self.rotation != radians {
            self.rotation = radians;
            self.dirty |= DirtyFlags::TRANSFORM;
        }
    }

    #[inline]
    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    /// Raises `TRANSFORM`.
    pub fn set_scale(&mut self, s: Vec2) {
        if self.scale != s {
            self.scale = s;
            self.dirty |= DirtyFlags::TRANSFORM;
        }
    }

    #[inline]
    pub fn local_transform(&self) -> Transform2D {
        Transform2D::from_trs(self.translation, self.rotation, self.scale)
    }

    /// World transform as of the last traversal that visited this node.
    #[inline]
    pub fn world_transform(&self) -> Transform2D {
        self.world_transform
    }

    /// World AABB as of the end of the last completed frame.
    #[inline]
    pub fn committed_aabb(&self) -> Option<Aabb> {
        self.committed_aabb
    }

    // ── flags / visibility ────────────────────────────────────────────────

    #[inline]
    pub fn flags(&self) -> ShapeFlags {
        self.flags
    }

    #[inline]
    pub fn visible(&self) -> bool {
        self.flags.contains(ShapeFlags::VISIBLE)
    }

    /// Raises `BOUNDS | RENDER`.
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible() != visible {
            self.flags.set(ShapeFlags::VISIBLE, visible);
            self.dirty |= DirtyFlags::BOUNDS | DirtyFlags::RENDER;
        }
    }

    #[inline]
    pub fn renderable(&self) -> bool {
        self.flags.contains(ShapeFlags::RENDERABLE)
    }

    #[inline]
    pub fn batchable(&self) -> bool {
        self.flags.contains(ShapeFlags::BATCHABLE)
    }

    /// Raises `RENDER` (the shape moves between private and shared
    /// drawcalls on the next flush).
    pub fn set_batchable(&mut self, batchable: bool) {
        if self.batchable() != batchable {
            self.flags.set(ShapeFlags::BATCHABLE, batchable);
            self.dirty |= DirtyFlags::RENDER;
        }
    }

    #[inline]
    pub fn selectable(&self) -> bool {
        self.flags.contains(ShapeFlags::SELECTABLE)
    }

    pub fn set_selectable(&mut self, selectable: bool) {
        self.flags.set(ShapeFlags::SELECTABLE, selectable);
    }

    #[inline]
    pub fn cullable(&self) -> bool {
        self.flags.contains(ShapeFlags::CULLABLE)
    }

    #[inline]
    pub fn culled(&self) -> bool {
        self.culled
    }

    /// Set by the external culling pass. Raises `RENDER` on change so the
    /// shape enters or leaves the flush set.
    pub fn set_culled(&mut self, culled: bool) {
        if self.cullable() && self.culled != culled {
            self.culled = culled;
            self.dirty |= DirtyFlags::RENDER;
        }
    }

    #[inline]
    pub fn pointer_events(&self) -> PointerEvents {
        self.pointer_events
    }

    pub fn set_pointer_events(&mut self, pe: PointerEvents) {
        self.pointer_events = pe;
    }

    // ── z-order ───────────────────────────────────────────────────────────

    #[inline]
    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    #[inline]
    pub fn fractional_index(&self) -> Option<f64> {
        self.fractional
    }

    /// Internal: the graph raises `SORT` on the parent.
    pub(crate) fn set_z_index_raw(&mut self, z: i32) -> bool {
        if self.z_index != z {
            self.z_index = z;
            self.dirty |= DirtyFlags::RENDER;
            true
        } else {
            false
        }
    }

    pub(crate) fn set_fractional_raw(&mut self, f: Option<f64>) -> bool {
        if self.fractional != f {
            self.fractional = f;
            self.dirty |= DirtyFlags::RENDER;
            true
        } else {
            false
        }
    }

    // ── material attributes ───────────────────────────────────────────────

    #[inline]
    pub fn fill(&self) -> Color {
        self.fill
    }

    /// Raises `RENDER`.
    pub fn set_fill(&mut self, fill: Color) {
        if self.fill != fill {
            self.fill = fill;
            self.dirty |= DirtyFlags::RENDER;
        }
    }

    #[inline]
    pub fn stroke(&self) -> Color {
        self.stroke
    }

    /// Raises `RENDER | GEOMETRY` (stroke presence changes the drawcall set).
    pub fn set_stroke(&mut self, stroke: Color) {
        if self.stroke != stroke {
            let presence_changed = self.stroke.is_transparent() != stroke.is_transparent();
            self.stroke = stroke;
            self.dirty |= DirtyFlags::RENDER;
            if presence_changed {
                self.dirty |= DirtyFlags::GEOMETRY | DirtyFlags::MATERIAL;
            }
        }
    }

    #[inline]
    pub fn stroke_width(&self) -> f32 {
        self.stroke_width
    }

    /// Raises `RENDER | BOUNDS`.
    pub fn set_stroke_width(&mut self, width: f32) {
        if self.stroke_width != width {
            self.stroke_width = width;
            self.dirty |= DirtyFlags::RENDER | DirtyFlags::BOUNDS;
        }
    }

    #[inline]
    pub fn stroke_alignment(&self) -> StrokeAlignment {
        self.stroke_alignment
    }

    /// Raises `RENDER | BOUNDS`.
    pub fn set_stroke_alignment(&mut self, alignment: StrokeAlignment) {
        if self.stroke_alignment != alignment {
            self.stroke_alignment = alignment;
            self.dirty |= DirtyFlags::RENDER | DirtyFlags::BOUNDS;
        }
    }

    #[inline]
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Raises `RENDER`.
    pub fn set_opacity(&mut self, opacity: f32) {
        if self.opacity != opacity {
            self.opacity = opacity;
            self.dirty |= DirtyFlags::RENDER;
        }
    }

    #[inline]
    pub fn shadow(&self) -> DropShadow {
        self.shadow
    }

    /// Raises `RENDER | BOUNDS`; `MATERIAL` additionally when the blur
    /// radius changes, since blur participates in the batch signature.
    pub fn set_shadow(&mut self, shadow: DropShadow) {
        if self.shadow != shadow {
            if self.shadow.blur_radius != shadow.blur_radius {
                self.dirty |= DirtyFlags::MATERIAL | DirtyFlags::GEOMETRY;
            }
            self.shadow = shadow;
            self.dirty |= DirtyFlags::RENDER | DirtyFlags::BOUNDS;
        }
    }

    // ── derived bounds ────────────────────────────────────────────────────

    /// Recomputes local render bounds (stroke- and shadow-inclusive) from
    /// the current geometry bounds.
    pub(crate) fn recompute_local_bounds(&mut self) {
        let Some(gb) = self.geometry.bounds() else {
            // Insertion validated inference; degeneracy introduced later via
            // set_geometry is caught there too, so this is unreachable for
            // committed shapes. Keep the old bounds rather than poison them.
            return;
        };
        self.geometry_bounds = gb;

        let stroke_pad = if self.stroke.is_transparent() || self.stroke_width <= 0.0 {
            0.0
        } else {
            match self.stroke_alignment {
                StrokeAlignment::Center => self.stroke_width * 0.5,
                StrokeAlignment::Inner => 0.0,
                StrokeAlignment::Outer => self.stroke_width,
            }
        };

        let mut rb = gb.inflate(stroke_pad);
        if self.shadow.blur_radius > 0.0 {
            let shadow_box = gb
                .translate(self.shadow.offset)
                .inflate(self.shadow.blur_radius);
            rb = rb.union(shadow_box);
        }
        self.render_bounds = rb;
    }
}
