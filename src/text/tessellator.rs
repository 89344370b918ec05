use std::rc::Rc;

use lyon::math::point;
use lyon::path::Path;
use lyon::tessellation::{BuffersBuilder, FillOptions, FillTessellator, FillVertex, VertexBuffers};

use super::cache::{FontCache, GlyphCache};
use super::flatten::flatten_outline;
use super::font::FontFace;
use crate::assets::AssetLoader;
use crate::config::FillRule;
use crate::error::{CanvasError, Result};
use crate::transform::Transform;

/// Triangles for one glyph: `x, y` pairs, three vertices per triangle, in pixels
/// relative to the top-left of the text's line box.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlyphBatch {
    pub vertices: Vec<f32>,
    pub triangle_count: usize,
}

impl GlyphBatch {
    /// Signed-area sum of the triangles, always positive.
    pub fn area(&self) -> f32 {
        self.vertices
            .chunks_exact(6)
            .map(|t| ((t[2] - t[0]) * (t[5] - t[1]) - (t[4] - t[0]) * (t[3] - t[1])).abs() * 0.5)
            .sum()
    }
}

/// Turns strings into filled triangles: shape, look up outlines, place, flatten, triangulate.
pub struct TextTessellator {
    fonts: FontCache,
    glyphs: GlyphCache,
    flatten_depth: u32,
    fill_rule: FillRule,
    fill: FillTessellator,
}

impl TextTessellator {
    pub fn new(flatten_depth: u32, fill_rule: FillRule) -> Self {
        Self {
            fonts: FontCache::new(),
            glyphs: GlyphCache::new(),
            flatten_depth,
            fill_rule,
            fill: FillTessellator::new(),
        }
    }

    pub fn font(&mut self, path: &str, loader: &dyn AssetLoader) -> Result<Rc<dyn FontFace>> {
        self.fonts.get_or_load(path, loader)
    }

    pub fn register_font(&mut self, font: Rc<dyn FontFace>) {
        self.fonts.register(font);
    }

    pub fn glyph_cache(&self) -> &GlyphCache {
        &self.glyphs
    }

    pub fn clear_caches(&mut self) {
        self.fonts.clear();
        self.glyphs.clear();
    }

    /// Advance width of the widest line of `text`, in pixels.
    pub fn measure(&self, font: &dyn FontFace, text: &str, pixel_size: f32) -> f32 {
        let scale = font.scale_for(pixel_size);
        text.lines()
            .map(|line| font.shape(line).iter().map(|g| g.x_advance).sum::<f32>() * scale)
            .fold(0.0, f32::max)
    }

    /// Tessellate `text` at `pixel_size`. Lines are separated by `\n` or `\r\n`; glyphs
    /// without an outline (spaces) produce no batch.
    pub fn tessellate(
        &mut self,
        font: &dyn FontFace,
        text: &str,
        pixel_size: f32,
    ) -> Result<Vec<GlyphBatch>> {
        let mut batches = Vec::new();
        if text.is_empty() {
            return Ok(batches);
        }

        let scale = font.scale_for(pixel_size);
        let baseline = font.ascent() * scale;
        let line_height = font.line_height() * scale;
        let options = FillOptions::default().with_fill_rule(self.fill_rule.into());

        for (line_index, line) in text.lines().enumerate() {
            let line_y = baseline + line_index as f32 * line_height;
            let mut pen = 0.0f32;

            for glyph in font.shape(line) {
                let outline = self.glyphs.get_or_decompose(font, glyph.glyph_id);
                let origin_x = (pen + glyph.x_offset) * scale;
                let origin_y = line_y - glyph.y_offset * scale;
                pen += glyph.x_advance;

                if outline.is_empty() {
                    continue;
                }

                // Font units are y-up; flip onto the y-down canvas at the baseline.
                let placement = Transform::translate(origin_x, origin_y)
                    .then(&Transform::scale_xy(scale, -scale));
                let contours = flatten_outline(&outline, &placement, self.flatten_depth);
                if contours.is_empty() {
                    continue;
                }

                let mut builder = Path::builder();
                for contour in &contours {
                    builder.begin(point(contour[0].x, contour[0].y));
                    for p in &contour[1..] {
                        builder.line_to(point(p.x, p.y));
                    }
                    builder.end(true);
                }
                let path = builder.build();

                let mut geometry: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
                self.fill
                    .tessellate_path(
                        &path,
                        &options,
                        &mut BuffersBuilder::new(&mut geometry, |vertex: FillVertex| {
                            vertex.position().to_array()
                        }),
                    )
                    .map_err(|e| CanvasError::Tessellation(format!("{e:?}")))?;

                let vertices: Vec<f32> = geometry
                    .indices
                    .iter()
                    .flat_map(|&i| geometry.vertices[i as usize])
                    .collect();
                let triangle_count = geometry.indices.len() / 3;
                if triangle_count > 0 {
                    batches.push(GlyphBatch {
                        vertices,
                        triangle_count,
                    });
                }
            }
        }

        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::text::font::{GlyphOutline, PathSegment, ShapedGlyph};

    /// Every character is a 1000-unit square ring with a 500-unit hole; space is empty.
    struct RingFont;

    impl FontFace for RingFont {
        fn key(&self) -> &str {
            "ring"
        }

        fn units_per_em(&self) -> f32 {
            1000.0
        }

        fn ascent(&self) -> f32 {
            1000.0
        }

        fn line_height(&self) -> f32 {
            1200.0
        }

        fn shape(&self, text: &str) -> Vec<ShapedGlyph> {
            text.chars()
                .map(|c| ShapedGlyph {
                    glyph_id: if c == ' ' { 0 } else { 1 },
                    x_advance: 1000.0,
                    x_offset: 0.0,
                    y_offset: 0.0,
                })
                .collect()
        }

        fn outline(&self, glyph_id: u16) -> GlyphOutline {
            if glyph_id == 0 {
                return GlyphOutline::default();
            }
            let square = |x0: f32, y0: f32, x1: f32, y1: f32, ccw: bool| {
                let mut pts = vec![
                    Point::new(x0, y0),
                    Point::new(x1, y0),
                    Point::new(x1, y1),
                    Point::new(x0, y1),
                ];
                if !ccw {
                    pts.reverse();
                }
                let mut segs = vec![PathSegment::MoveTo(pts[0])];
                segs.extend(pts[1..].iter().map(|&p| PathSegment::LineTo(p)));
                segs.push(PathSegment::Close);
                segs
            };
            let mut segments = square(0.0, 0.0, 1000.0, 1000.0, true);
            segments.extend(square(250.0, 250.0, 750.0, 750.0, false));
            GlyphOutline { segments }
        }
    }

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-2
    }

    #[test]
    fn test_empty_text_has_no_batches() {
        let mut tess = TextTessellator::new(3, FillRule::NonZero);
        assert!(tess.tessellate(&RingFont, "", 20.0).unwrap().is_empty());
    }

    #[test]
    fn test_hole_is_excluded() {
        let mut tess = TextTessellator::new(3, FillRule::NonZero);
        let batches = tess.tessellate(&RingFont, "o", 100.0).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].vertices.len(), batches[0].triangle_count * 6);
        // 100x100 outer minus 50x50 hole
        assert!((batches[0].area() - 7500.0).abs() < 0.5);
    }

    #[test]
    fn test_glyphs_are_placed_by_advance_below_baseline() {
        let mut tess = TextTessellator::new(3, FillRule::EvenOdd);
        let batches = tess.tessellate(&RingFont, "o o", 10.0).unwrap();
        assert_eq!(batches.len(), 2);

        let xs = |b: &GlyphBatch| {
            let xs: Vec<f32> = b.vertices.iter().step_by(2).copied().collect();
            (xs.iter().copied().fold(f32::MAX, f32::min), xs.iter().copied().fold(f32::MIN, f32::max))
        };
        let (min0, max0) = xs(&batches[0]);
        let (min1, max1) = xs(&batches[1]);
        assert!(approx_eq(min0, 0.0) && approx_eq(max0, 10.0));
        assert!(approx_eq(min1, 20.0) && approx_eq(max1, 30.0));

        let ys: Vec<f32> = batches[0].vertices.iter().skip(1).step_by(2).copied().collect();
        assert!(ys.iter().all(|&y| (-1e-3..=10.001).contains(&y)));
    }

    #[test]
    fn test_crlf_lines_match_lf_lines() {
        let mut tess = TextTessellator::new(3, FillRule::NonZero);
        let lf = tess.tessellate(&RingFont, "oo\no", 10.0).unwrap();
        let crlf = tess.tessellate(&RingFont, "oo\r\no", 10.0).unwrap();
        assert_eq!(crlf.len(), 3);
        assert_eq!(crlf, lf);
        assert!(approx_eq(tess.measure(&RingFont, "oo\r\no", 10.0), 20.0));
    }

    #[test]
    fn test_outlines_are_cached_per_glyph() {
        let mut tess = TextTessellator::new(3, FillRule::NonZero);
        tess.tessellate(&RingFont, "oooo", 12.0).unwrap();
        assert_eq!(tess.glyph_cache().len(), 1);
        tess.tessellate(&RingFont, "o o\no", 12.0).unwrap();
        assert_eq!(tess.glyph_cache().len(), 2);
        tess.clear_caches();
        assert!(tess.glyph_cache().is_empty());
    }

    #[test]
    fn test_measure_uses_widest_line() {
        let tess = TextTessellator::new(3, FillRule::NonZero);
        assert!(approx_eq(tess.measure(&RingFont, "oo\nooo", 10.0), 30.0));
    }
}
