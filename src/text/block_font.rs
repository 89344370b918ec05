//! A tiny built-in 5x7 block font.
//!
//! Lets canvases draw text with no font file at hand (headless hosts, tests).
//! Each lit cell of the bitmap becomes a square in the outline, merged into
//! horizontal runs. Lowercase letters use the uppercase shapes; characters
//! without a shape draw as a hollow box.

use super::font::{FontFace, GlyphOutline, PathSegment, ShapedGlyph};
use crate::geometry::Point;

const CELL: f32 = 100.0;
const COLUMNS: u32 = 5;
const ROWS: usize = 7;
const NOTDEF: u16 = u16::MAX;

#[rustfmt::skip]
const GLYPHS: &[(char, [u8; ROWS])] = &[
    ('0', [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E]),
    ('1', [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E]),
    ('2', [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F]),
    ('3', [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E]),
    ('4', [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02]),
    ('5', [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E]),
    ('6', [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E]),
    ('7', [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08]),
    ('8', [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E]),
    ('9', [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C]),
    ('A', [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11]),
    ('B', [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E]),
    ('C', [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E]),
    ('D', [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C]),
    ('E', [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F]),
    ('F', [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10]),
    ('G', [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F]),
    ('H', [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11]),
    ('I', [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E]),
    ('J', [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C]),
    ('K', [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11]),
    ('L', [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F]),
    ('M', [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11]),
    ('N', [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11]),
    ('O', [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E]),
    ('P', [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10]),
    ('Q', [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D]),
    ('R', [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11]),
    ('S', [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E]),
    ('T', [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04]),
    ('U', [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E]),
    ('V', [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04]),
    ('W', [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A]),
    ('X', [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11]),
    ('Y', [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04]),
    ('Z', [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F]),
    ('.', [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C]),
    (',', [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08]),
    (':', [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00]),
    ('!', [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04]),
    ('?', [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04]),
    ('-', [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00]),
    ('+', [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00]),
    ('=', [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00]),
    ('/', [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00]),
    ('(', [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02]),
    (')', [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08]),
    ('%', [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03]),
];

/// Built-in fallback font. Always available under the key `"builtin:block"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockFont;

impl BlockFont {
    pub const KEY: &'static str = "builtin:block";

    fn glyph_id(c: char) -> u16 {
        if c.is_whitespace() {
            return 0;
        }
        let upper = c.to_ascii_uppercase();
        GLYPHS
            .iter()
            .position(|(g, _)| *g == upper)
            .map(|i| i as u16 + 1)
            .unwrap_or(NOTDEF)
    }
}

fn rect(segments: &mut Vec<PathSegment>, x0: f32, y0: f32, x1: f32, y1: f32, ccw: bool) {
    let corners = if ccw {
        [(x0, y0), (x1, y0), (x1, y1), (x0, y1)]
    } else {
        [(x0, y0), (x0, y1), (x1, y1), (x1, y0)]
    };
    segments.push(PathSegment::MoveTo(Point::new(corners[0].0, corners[0].1)));
    for &(x, y) in &corners[1..] {
        segments.push(PathSegment::LineTo(Point::new(x, y)));
    }
    segments.push(PathSegment::Close);
}

impl FontFace for BlockFont {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn units_per_em(&self) -> f32 {
        (ROWS as f32 + 1.0) * CELL
    }

    fn ascent(&self) -> f32 {
        ROWS as f32 * CELL
    }

    fn line_height(&self) -> f32 {
        (ROWS as f32 + 2.0) * CELL
    }

    fn shape(&self, text: &str) -> Vec<ShapedGlyph> {
        text.chars()
            .map(|c| ShapedGlyph {
                glyph_id: Self::glyph_id(c),
                x_advance: (COLUMNS as f32 + 1.0) * CELL,
                x_offset: 0.0,
                y_offset: 0.0,
            })
            .collect()
    }

    fn outline(&self, glyph_id: u16) -> GlyphOutline {
        let mut segments = Vec::new();
        if glyph_id == NOTDEF {
            let (w, h) = (COLUMNS as f32 * CELL, ROWS as f32 * CELL);
            rect(&mut segments, 0.0, 0.0, w, h, true);
            rect(&mut segments, CELL, CELL, w - CELL, h - CELL, false);
            return GlyphOutline { segments };
        }
        let Some((_, rows)) = GLYPHS.get((glyph_id as usize).wrapping_sub(1)) else {
            return GlyphOutline::default();
        };

        for (r, bits) in rows.iter().enumerate() {
            let y0 = (ROWS - 1 - r) as f32 * CELL;
            let mut col = 0;
            while col < COLUMNS {
                if bits & (1 << (COLUMNS - 1 - col)) == 0 {
                    col += 1;
                    continue;
                }
                let start = col;
                while col < COLUMNS && bits & (1 << (COLUMNS - 1 - col)) != 0 {
                    col += 1;
                }
                rect(
                    &mut segments,
                    start as f32 * CELL,
                    y0,
                    col as f32 * CELL,
                    y0 + CELL,
                    true,
                );
            }
        }
        GlyphOutline { segments }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_are_merged() {
        let font = BlockFont;
        let id = font.shape("t")[0].glyph_id;
        let outline = font.outline(id);
        // T: one 5-wide run on top plus six single cells
        let contours = outline
            .segments
            .iter()
            .filter(|s| matches!(s, PathSegment::MoveTo(_)))
            .count();
        assert_eq!(contours, 7);
    }

    #[test]
    fn test_space_and_unknown() {
        let font = BlockFont;
        let glyphs = font.shape(" \u{263A}");
        assert!(font.outline(glyphs[0].glyph_id).is_empty());
        assert_eq!(glyphs[1].glyph_id, NOTDEF);
        assert!(!font.outline(glyphs[1].glyph_id).is_empty());
    }
}
