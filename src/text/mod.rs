//! Text as geometry: glyph outlines flattened and triangulated into filled meshes.

mod block_font;
mod cache;
mod flatten;
mod font;
mod tessellator;

pub use block_font::BlockFont;
pub use cache::{FontCache, GlyphCache};
pub use flatten::flatten_outline;
pub use font::{FontFace, GlyphOutline, PathSegment, ShapedGlyph, TtfFont};
pub use tessellator::{GlyphBatch, TextTessellator};
