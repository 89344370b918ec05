//! Vertex and uniform layouts shared by every program.

use wgpu::{VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

/// Vertex for flat-colored shapes and glyphs. Position is in canvas logical pixels.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SolidVertex {
    pub position: [f32; 2],
}

impl SolidVertex {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { position: [x, y] }
    }

    pub fn desc() -> VertexBufferLayout<'static> {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<SolidVertex>() as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: &[VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: VertexFormat::Float32x2,
            }],
        }
    }
}

/// Vertex for texture blits: a position plus the texel coordinate sampled there.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TexturedVertex {
    pub position: [f32; 2],
    /// `(0, 0)` is the top-left texel of the source.
    pub uv: [f32; 2],
}

impl TexturedVertex {
    pub const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self {
            position: [x, y],
            uv: [u, v],
        }
    }

    pub fn desc() -> VertexBufferLayout<'static> {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<TexturedVertex>() as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: &[
                // position
                VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: VertexFormat::Float32x2,
                },
                // uv
                VertexAttribute {
                    offset: 8,
                    shader_location: 1,
                    format: VertexFormat::Float32x2,
                },
            ],
        }
    }

    /// Two-triangle strip covering `(x, y, width, height)` with the full texture.
    pub fn quad(x: f32, y: f32, width: f32, height: f32) -> [TexturedVertex; 4] {
        [
            TexturedVertex::new(x, y, 0.0, 0.0),
            TexturedVertex::new(x + width, y, 1.0, 0.0),
            TexturedVertex::new(x, y + height, 0.0, 1.0),
            TexturedVertex::new(x + width, y + height, 1.0, 1.0),
        ]
    }
}

/// Uniform block layout shared by all programs (`@group(0) @binding(0)`).
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuUniforms {
    /// Column-major projection matrix.
    pub projection: [[f32; 4]; 4],
    /// Column-major model-view matrix.
    pub model_view: [[f32; 4]; 4],
    pub color: [f32; 4],
}
