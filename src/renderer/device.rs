//! The narrow graphics-device interface canvases are written against.
//!
//! A device owns programs and render targets and exposes a small amount of
//! bound state (target, viewport, scissor) that canvases snapshot and restore.
//! Methods take `&self`; implementations keep their state behind interior
//! mutability so a single device can be shared as `Rc<dyn GraphicsDevice>`.

use image::RgbaImage;

use super::vertex::{GpuUniforms, SolidVertex, TexturedVertex};
use crate::color::Color;
use crate::error::Result;
use crate::geometry::{PixelRect, Size};
use crate::transform::Transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub(crate) u32);

/// The three programs a canvas draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Flat color shapes.
    Solid,
    /// Flat color glyph triangles.
    Text,
    /// Texture blit tinted by the uniform color.
    Textured,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; 3] = [ProgramKind::Solid, ProgramKind::Text, ProgramKind::Textured];

    pub fn name(self) -> &'static str {
        match self {
            ProgramKind::Solid => "solid",
            ProgramKind::Text => "text",
            ProgramKind::Textured => "textured",
        }
    }

    /// Vertex inputs the program must declare, in location order.
    pub fn required_attributes(self) -> &'static [&'static str] {
        match self {
            ProgramKind::Solid | ProgramKind::Text => &["position"],
            ProgramKind::Textured => &["position", "uv"],
        }
    }

    pub fn is_textured(self) -> bool {
        matches!(self, ProgramKind::Textured)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
    TriangleStrip,
    /// Every triangle shares the first vertex.
    TriangleFan,
}

impl Topology {
    /// Expand `vertex_count` vertices into independent triangles.
    ///
    /// Strip triangles alternate winding; rasterization here is two-sided so the
    /// order within a triangle does not matter.
    pub fn triangles(self, vertex_count: usize) -> Vec<[usize; 3]> {
        match self {
            Topology::TriangleList => (0..vertex_count / 3)
                .map(|t| [t * 3, t * 3 + 1, t * 3 + 2])
                .collect(),
            Topology::TriangleStrip => (2..vertex_count).map(|i| [i - 2, i - 1, i]).collect(),
            Topology::TriangleFan => (2..vertex_count).map(|i| [0, i - 1, i]).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Vertices<'a> {
    Solid(&'a [SolidVertex]),
    Textured(&'a [TexturedVertex]),
}

impl Vertices<'_> {
    pub fn len(&self) -> usize {
        match self {
            Vertices::Solid(v) => v.len(),
            Vertices::Textured(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self, index: usize) -> [f32; 2] {
        match self {
            Vertices::Solid(v) => v[index].position,
            Vertices::Textured(v) => v[index].position,
        }
    }

    pub fn uv(&self, index: usize) -> [f32; 2] {
        match self {
            Vertices::Solid(_) => [0.0, 0.0],
            Vertices::Textured(v) => v[index].uv,
        }
    }
}

/// Per-draw uniform values. Clip position is `projection * model_view * (x, y, 0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniforms {
    pub projection: Transform,
    pub model_view: Transform,
    pub color: Color,
}

impl Uniforms {
    pub fn new(projection: Transform, color: Color) -> Self {
        Self {
            projection,
            model_view: Transform::IDENTITY,
            color,
        }
    }

    pub fn with_model_view(mut self, model_view: Transform) -> Self {
        self.model_view = model_view;
        self
    }

    pub fn to_gpu(&self) -> GpuUniforms {
        GpuUniforms {
            projection: self.projection.to_cols_array(),
            model_view: self.model_view.to_cols_array(),
            color: self.color.to_array(),
        }
    }
}

pub struct DrawCall<'a> {
    pub program: ProgramId,
    pub topology: Topology,
    pub vertices: Vertices<'a>,
    pub uniforms: Uniforms,
    /// Render target whose resolved texture is sampled by textured programs.
    pub texture: Option<TargetId>,
}

pub trait GraphicsDevice {
    fn max_texture_dimension(&self) -> u32;

    /// Compile `source` into a program of the given kind.
    fn create_program(&self, kind: ProgramKind, source: &str) -> Result<ProgramId>;
    fn delete_program(&self, program: ProgramId);

    /// Allocate color and depth/stencil backing of `size` with `samples` per pixel,
    /// plus a single-sample resolve texture.
    fn create_target(&self, size: Size, samples: u32) -> Result<TargetId>;
    fn delete_target(&self, target: TargetId);
    fn target_size(&self, target: TargetId) -> Option<Size>;

    /// Bind a render target, or the default surface for `None`.
    fn bind_target(&self, target: Option<TargetId>);
    fn bound_target(&self) -> Option<TargetId>;
    /// Size of whatever is currently bound.
    fn bound_size(&self) -> Size;

    fn set_viewport(&self, viewport: PixelRect);
    fn viewport(&self) -> PixelRect;
    fn set_scissor(&self, scissor: Option<PixelRect>);
    fn scissor(&self) -> Option<PixelRect>;

    /// Clear color, depth and stencil of the bound target.
    fn clear(&self, color: Color);
    fn draw(&self, call: &DrawCall<'_>) -> Result<()>;

    /// Resolve multisampled color into the target's sampleable texture.
    fn resolve(&self, target: TargetId) -> Result<()>;

    /// Read back a target's resolved texture, or the default surface for `None`.
    fn read_pixels(&self, target: Option<TargetId>) -> Result<RgbaImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_expansion() {
        assert_eq!(
            Topology::TriangleFan.triangles(5),
            vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]]
        );
    }

    #[test]
    fn test_strip_expansion() {
        assert_eq!(
            Topology::TriangleStrip.triangles(4),
            vec![[0, 1, 2], [1, 2, 3]]
        );
        assert!(Topology::TriangleStrip.triangles(2).is_empty());
    }

    #[test]
    fn test_list_ignores_trailing_vertices() {
        assert_eq!(Topology::TriangleList.triangles(7).len(), 2);
    }
}
