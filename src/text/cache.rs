//! Font and glyph outline caches.
//!
//! Both live for as long as their owner (normally the render context) and are
//! never evicted. `clear` exists so tests and hosts can start from a clean slate.

use std::collections::HashMap;
use std::rc::Rc;

use super::font::{FontFace, GlyphOutline, TtfFont};
use crate::assets::AssetLoader;
use crate::error::Result;

#[derive(Default)]
pub struct FontCache {
    fonts: HashMap<String, Rc<dyn FontFace>>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the font registered under `path`, loading and parsing it on first use.
    pub fn get_or_load(&mut self, path: &str, loader: &dyn AssetLoader) -> Result<Rc<dyn FontFace>> {
        if let Some(font) = self.fonts.get(path) {
            return Ok(font.clone());
        }
        let bytes = loader.read_all(path)?;
        let font: Rc<dyn FontFace> = Rc::new(TtfFont::from_bytes(path, bytes)?);
        log::info!("Loaded font {path}");
        self.fonts.insert(path.to_string(), font.clone());
        Ok(font)
    }

    /// Make `font` resolvable under its own key without touching the loader.
    pub fn register(&mut self, font: Rc<dyn FontFace>) {
        self.fonts.insert(font.key().to_string(), font);
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn clear(&mut self) {
        self.fonts.clear();
    }
}

/// Outlines keyed by `(font key, glyph id)`, in font units.
#[derive(Default)]
pub struct GlyphCache {
    outlines: HashMap<(String, u16), Rc<GlyphOutline>>,
}

impl GlyphCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_decompose(&mut self, font: &dyn FontFace, glyph_id: u16) -> Rc<GlyphOutline> {
        self.outlines
            .entry((font.key().to_string(), glyph_id))
            .or_insert_with(|| Rc::new(font.outline(glyph_id)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.outlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outlines.is_empty()
    }

    pub fn clear(&mut self) {
        self.outlines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryLoader;
    use crate::error::CanvasError;

    #[test]
    fn test_missing_font_path() {
        let mut cache = FontCache::new();
        let result = cache.get_or_load("fonts/missing.ttf", &MemoryLoader::new());
        assert!(matches!(result, Err(CanvasError::MissingResource(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unparsable_font_is_not_cached() {
        let mut cache = FontCache::new();
        let loader = MemoryLoader::new().with_file("bad.ttf", vec![1u8; 16]);
        assert!(matches!(
            cache.get_or_load("bad.ttf", &loader),
            Err(CanvasError::Font(_))
        ));
        assert!(cache.is_empty());
    }
}
