use crate::color::Color;

/// Winding rule used when triangulating glyph outlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

impl From<FillRule> for lyon::tessellation::FillRule {
    fn from(rule: FillRule) -> Self {
        match rule {
            FillRule::NonZero => lyon::tessellation::FillRule::NonZero,
            FillRule::EvenOdd => lyon::tessellation::FillRule::EvenOdd,
        }
    }
}

/// How widget quads are projected onto their parent surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    Orthographic,
    /// Perspective frustum whose slice at the z=0 plane matches the viewport exactly,
    /// so untransformed quads land on the same pixels as with `Orthographic`.
    Perspective,
}

/// Tunables shared by every canvas created from one render context.
#[derive(Debug, Clone)]
pub struct CanvasConfig {
    /// MSAA sample count for canvas render targets.
    pub sample_count: u32,
    /// Vertices on the rim of a circle fan.
    pub circle_segments: u32,
    /// Recursive subdivision depth used to flatten glyph curves.
    pub flatten_depth: u32,
    pub fill_rule: FillRule,
    /// Color used by `Canvas::clear`.
    pub clear_color: Color,
    /// Upper bound on backing texel count. Defaults to the square of the device's
    /// maximum texture dimension.
    pub max_texture_area: Option<u64>,
    pub projection: Projection,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            sample_count: 4,
            circle_segments: 120,
            flatten_depth: 3,
            fill_rule: FillRule::NonZero,
            clear_color: Color::TRANSPARENT,
            max_texture_area: None,
            projection: Projection::Orthographic,
        }
    }
}

impl CanvasConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_count(mut self, samples: u32) -> Self {
        self.sample_count = samples.max(1);
        self
    }

    pub fn circle_segments(mut self, segments: u32) -> Self {
        self.circle_segments = segments.max(3);
        self
    }

    pub fn flatten_depth(mut self, depth: u32) -> Self {
        self.flatten_depth = depth;
        self
    }

    pub fn fill_rule(mut self, rule: FillRule) -> Self {
        self.fill_rule = rule;
        self
    }

    pub fn clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }

    pub fn max_texture_area(mut self, area: u64) -> Self {
        self.max_texture_area = Some(area.max(1));
        self
    }

    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_clamps() {
        let config = CanvasConfig::new().sample_count(0).circle_segments(1);
        assert_eq!(config.sample_count, 1);
        assert_eq!(config.circle_segments, 3);
        assert_eq!(config.flatten_depth, 3);
    }
}
