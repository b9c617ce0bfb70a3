use std::collections::HashMap;

use anyhow::Result;

use crate::coords::Vec2;

/// One glyph: placement in local text space plus its atlas rect.
#[derive(Debug, Clone)]
pub struct GlyphQuad {
    pub offset: Vec2,
    pub size: Vec2,
    pub uv_min: Vec2,
    pub uv_max: Vec2,
}

/// A shaped text run; offsets are relative to the run origin, +Y down.
#[derive(Debug, Clone, Default)]
pub struct GlyphRun {
    pub quads: Vec<GlyphQuad>,
    pub width: f32,
    pub height: f32,
}

/// Shapes text into positioned glyph quads over a shared coverage atlas.
///
/// `shape` may rasterize new glyphs; callers watch [`atlas_version`] to know
/// when to re-upload. Returns `None` only when the run cannot be shaped at
/// all (an atlas-full condition skips the glyph, not the run).
///
/// [`atlas_version`]: GlyphShaper::atlas_version
pub trait GlyphShaper {
    fn shape(&mut self, text: &str, px_size: f32) -> Option<GlyphRun>;
    fn atlas_size(&self) -> (u32, u32);
    /// Tightly packed R8 coverage, `width * height` bytes.
    fn atlas_data(&self) -> &[u8];
    /// Bumped whenever `atlas_data` changes.
    fn atlas_version(&self) -> u64;
}

const ATLAS_SIZE: u32 = 1024;
/// Gap between packed glyphs so linear sampling never bleeds.
const GLYPH_PADDING: u32 = 1;

/// Left-to-right, top-to-bottom shelf allocator.
struct ShelfPacker {
    width: u32,
    height: u32,
    x: u32,
    y: u32,
    row_height: u32,
}

impl ShelfPacker {
    fn new(width: u32, height: u32) -> Self {
        Self { width, height, x: 0, y: 0, row_height: 0 }
    }

    fn alloc(&mut self, w: u32, h: u32) -> Option<(u32, u32)> {
        let (pw, ph) = (w + GLYPH_PADDING, h + GLYPH_PADDING);
        if pw > self.width {
            return None;
        }
        if self.x + pw > self.width {
            self.y += self.row_height;
            self.x = 0;
            self.row_height = 0;
        }
        if self.y + ph > self.height {
            return None;
        }
        let origin = (self.x, self.y);
        self.x += pw;
        self.row_height = self.row_height.max(ph);
        Some(origin)
    }
}

struct CachedGlyph {
    uv_min: Vec2,
    uv_max: Vec2,
}

/// fontdue-backed [`GlyphShaper`] with an on-demand shelf-packed atlas.
pub struct FontShaper {
    font: fontdue::Font,
    atlas: Vec<u8>,
    packer: ShelfPacker,
    cache: HashMap<(u16, u32), Option<CachedGlyph>>,
    version: u64,
    warned_full: bool,
}

impl FontShaper {
    /// Parses a TrueType or OpenType font from raw bytes.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| anyhow::anyhow!("font parse error: {e}"))?;
        Ok(Self {
            font,
            atlas: vec![0; (ATLAS_SIZE * ATLAS_SIZE) as usize],
            packer: ShelfPacker::new(ATLAS_SIZE, ATLAS_SIZE),
            cache: HashMap::new(),
            version: 1,
            warned_full: false,
        })
    }

    /// Rasterizes and packs a glyph, or returns the cached atlas rect.
    /// `None` means the glyph has no coverage (whitespace) or did not fit.
    fn ensure_glyph(&mut self, glyph_index: u16, px_size: f32) -> Option<(Vec2, Vec2)> {
        let key = (glyph_index, px_size.to_bits());
        if let Some(cached) = self.cache.get(&key) {
            return cached.as_ref().map(|c| (c.uv_min, c.uv_max));
        }

        let (metrics, bitmap) = self.font.rasterize_indexed(glyph_index, px_size);
        if metrics.width == 0 || metrics.height == 0 {
            self.cache.insert(key, None);
            return None;
        }

        let (w, h) = (metrics.width as u32, metrics.height as u32);
        let Some((x, y)) = self.packer.alloc(w, h) else {
            if !self.warned_full {
                log::warn!("glyph atlas full; further new glyphs will not render");
                self.warned_full = true;
            }
            self.cache.insert(key, None);
            return None;
        };

        for row in 0..h {
            let src = (row * w) as usize;
            let dst = ((y + row) * ATLAS_SIZE + x) as usize;
            self.atlas[dst..dst + w as usize]
                .copy_from_slice(&bitmap[src..src + w as usize]);
        }
        self.version += 1;

        let inv = 1.0 / ATLAS_SIZE as f32;
        let uv_min = Vec2::new(x as f32 * inv, y as f32 * inv);
        let uv_max = Vec2::new((x + w) as f32 * inv, (y + h) as f32 * inv);
        self.cache.insert(key, Some(CachedGlyph { uv_min, uv_max }));
        Some((uv_min, uv_max))
    }
}

impl GlyphShaper for FontShaper {
    fn shape(&mut self, text: &str, px_size: f32) -> Option<GlyphRun> {
        use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};

        if text.is_empty() || px_size <= 0.0 {
            return None;
        }

        let mut layout: Layout<()> = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings::default());
        layout.append(
            std::slice::from_ref(&self.font),
            &TextStyle::new(text, px_size, 0),
        );

        let mut run = GlyphRun::default();
        for glyph in layout.glyphs() {
            run.width = run.width.max(glyph.x + glyph.width as f32);
            run.height = run.height.max(glyph.y + glyph.height as f32);
            let Some((uv_min, uv_max)) = self.ensure_glyph(glyph.key.glyph_index, px_size)
            else {
                continue;
            };
            run.quads.push(GlyphQuad {
                offset: Vec2::new(glyph.x, glyph.y),
                size: Vec2::new(glyph.width as f32, glyph.height as f32),
                uv_min,
                uv_max,
            });
        }
        run.height = run.height.max(px_size);
        Some(run)
    }

    fn atlas_size(&self) -> (u32, u32) {
        (ATLAS_SIZE, ATLAS_SIZE)
    }

    fn atlas_data(&self) -> &[u8] {
        &self.atlas
    }

    fn atlas_version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── shelf packing ─────────────────────────────────────────────────────

    #[test]
    fn packs_left_to_right_then_wraps() {
        let mut packer = ShelfPacker::new(64, 64);
        assert_eq!(packer.alloc(30, 10), Some((0, 0)));
        assert_eq!(packer.alloc(30, 12), Some((31, 0)));
        // 62 + 31 > 64: next row, at the tallest shelf height.
        assert_eq!(packer.alloc(30, 10), Some((0, 13)));
    }

    #[test]
    fn rejects_what_cannot_fit() {
        let mut packer = ShelfPacker::new(32, 32);
        assert_eq!(packer.alloc(40, 4), None);
        assert_eq!(packer.alloc(8, 40), None);
        // Fill rows until vertical space runs out.
        for _ in 0..2 {
            assert!(packer.alloc(30, 14).is_some());
        }
        assert_eq!(packer.alloc(30, 14), None);
    }
}
