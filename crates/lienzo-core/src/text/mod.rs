//! Glyph shaping and the rasterized atlas.
//!
//! The shaper is an optional collaborator: text drawcalls ask for it at
//! flush time and simply draw nothing while it is absent (fonts load
//! asynchronously in embedding shells). Glyphs are rasterized on demand into
//! a single R8 atlas shared by every text drawcall.

mod shaper;

pub use shaper::{FontShaper, GlyphQuad, GlyphRun, GlyphShaper};
