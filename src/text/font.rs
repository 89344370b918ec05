use rustybuzz::ttf_parser::{self, GlyphId, OutlineBuilder};

use crate::error::{CanvasError, Result};
use crate::geometry::Point;

/// One command of a glyph outline, in font units with y pointing up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    Close,
}

/// Decomposed outline of a single glyph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlyphOutline {
    pub segments: Vec<PathSegment>,
}

impl GlyphOutline {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// A glyph placed by the shaper. Advances and offsets are in font units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapedGlyph {
    pub glyph_id: u16,
    pub x_advance: f32,
    pub x_offset: f32,
    pub y_offset: f32,
}

/// What the text pipeline needs from a font.
pub trait FontFace {
    /// Stable identity used as the glyph cache key.
    fn key(&self) -> &str;
    fn units_per_em(&self) -> f32;
    /// Top of the font's global bounding box, in font units.
    fn ascent(&self) -> f32;
    /// Distance between consecutive baselines, in font units.
    fn line_height(&self) -> f32;
    /// Shape a single line of text.
    fn shape(&self, text: &str) -> Vec<ShapedGlyph>;
    fn outline(&self, glyph_id: u16) -> GlyphOutline;

    fn scale_for(&self, pixel_size: f32) -> f32 {
        pixel_size / self.units_per_em()
    }
}

/// TrueType/OpenType font shaped with rustybuzz.
///
/// Only the raw bytes and a few metrics are stored; the face is re-parsed per
/// call, which is cheap compared with shaping and keeps the type free of
/// self-references.
pub struct TtfFont {
    key: String,
    data: Vec<u8>,
    index: u32,
    units_per_em: f32,
    ascent: f32,
    line_height: f32,
}

impl TtfFont {
    pub fn from_bytes(key: impl Into<String>, data: Vec<u8>) -> Result<Self> {
        Self::from_collection(key, data, 0)
    }

    pub fn from_collection(key: impl Into<String>, data: Vec<u8>, index: u32) -> Result<Self> {
        let key = key.into();
        let face = ttf_parser::Face::parse(&data, index)
            .map_err(|e| CanvasError::Font(format!("{key}: {e}")))?;
        let units_per_em = face.units_per_em() as f32;
        let ascent = face.global_bounding_box().y_max as f32;
        let line_height =
            (face.ascender() as f32 - face.descender() as f32 + face.line_gap() as f32).max(1.0);
        Ok(Self {
            key,
            data,
            index,
            units_per_em,
            ascent,
            line_height,
        })
    }

    fn face(&self) -> Option<rustybuzz::Face<'_>> {
        rustybuzz::Face::from_slice(&self.data, self.index)
    }
}

impl FontFace for TtfFont {
    fn key(&self) -> &str {
        &self.key
    }

    fn units_per_em(&self) -> f32 {
        self.units_per_em
    }

    fn ascent(&self) -> f32 {
        self.ascent
    }

    fn line_height(&self) -> f32 {
        self.line_height
    }

    fn shape(&self, text: &str) -> Vec<ShapedGlyph> {
        let Some(face) = self.face() else {
            return Vec::new();
        };
        let mut buffer = rustybuzz::UnicodeBuffer::new();
        buffer.push_str(text);
        buffer.guess_segment_properties();
        let shaped = rustybuzz::shape(&face, &[], buffer);

        shaped
            .glyph_infos()
            .iter()
            .zip(shaped.glyph_positions())
            .map(|(info, pos)| ShapedGlyph {
                glyph_id: info.glyph_id as u16,
                x_advance: pos.x_advance as f32,
                x_offset: pos.x_offset as f32,
                y_offset: pos.y_offset as f32,
            })
            .collect()
    }

    fn outline(&self, glyph_id: u16) -> GlyphOutline {
        let mut builder = SegmentCollector::default();
        if let Some(face) = self.face() {
            face.outline_glyph(GlyphId(glyph_id), &mut builder);
        }
        GlyphOutline {
            segments: builder.segments,
        }
    }
}

#[derive(Default)]
struct SegmentCollector {
    segments: Vec<PathSegment>,
}

impl OutlineBuilder for SegmentCollector {
    fn move_to(&mut self, x: f32, y: f32) {
        self.segments.push(PathSegment::MoveTo(Point::new(x, y)));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.segments.push(PathSegment::LineTo(Point::new(x, y)));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.segments
            .push(PathSegment::QuadTo(Point::new(x1, y1), Point::new(x, y)));
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.segments.push(PathSegment::CubicTo(
            Point::new(x1, y1),
            Point::new(x2, y2),
            Point::new(x, y),
        ));
    }

    fn close(&mut self) {
        self.segments.push(PathSegment::Close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let result = TtfFont::from_bytes("junk.ttf", vec![0, 1, 2, 3]);
        assert!(matches!(result, Err(CanvasError::Font(_))));
    }
}
