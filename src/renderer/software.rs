//! CPU reference implementation of [`GraphicsDevice`].
//!
//! Rasterizes with the same conventions as the wgpu backend: clip-space y up,
//! pixel rows top-down, texel `(0, 0)` at the top-left, straight-alpha
//! "over" blending and MSAA resolve by averaging samples. It runs headless,
//! which makes it the device of choice for tests and offline rendering.

use std::cell::RefCell;
use std::collections::HashMap;

use image::RgbaImage;

use super::device::{
    DrawCall, GraphicsDevice, ProgramId, ProgramKind, TargetId, Uniforms, Vertices,
};
use crate::color::Color;
use crate::error::{CanvasError, Result};
use crate::geometry::{PixelRect, Size};

/// Sample positions inside a pixel, per supported sample count.
fn sample_pattern(samples: u32) -> Option<&'static [(f32, f32)]> {
    const X1: [(f32, f32); 1] = [(0.5, 0.5)];
    const X2: [(f32, f32); 2] = [(0.75, 0.75), (0.25, 0.25)];
    const X4: [(f32, f32); 4] = [(0.375, 0.125), (0.875, 0.375), (0.125, 0.625), (0.625, 0.875)];
    const X8: [(f32, f32); 8] = [
        (0.5625, 0.3125),
        (0.4375, 0.6875),
        (0.8125, 0.5625),
        (0.3125, 0.1875),
        (0.1875, 0.8125),
        (0.0625, 0.4375),
        (0.6875, 0.9375),
        (0.9375, 0.0625),
    ];
    match samples {
        1 => Some(&X1),
        2 => Some(&X2),
        4 => Some(&X4),
        8 => Some(&X8),
        _ => None,
    }
}

struct Surface {
    size: Size,
    samples: u32,
    /// `width * height * samples` linear colors, sample-major within a pixel.
    color: Vec<[f32; 4]>,
    depth_stencil: Vec<(f32, u8)>,
    /// Single-sample texture produced by `resolve`.
    resolved: Vec<[u8; 4]>,
}

impl Surface {
    fn new(size: Size, samples: u32) -> Self {
        let pixels = size.width as usize * size.height as usize;
        Self {
            size,
            samples,
            color: vec![[0.0; 4]; pixels * samples as usize],
            depth_stencil: vec![(1.0, 0); pixels * samples as usize],
            resolved: vec![[0; 4]; pixels],
        }
    }

    fn clear(&mut self, color: Color) {
        self.color.fill(color.to_array());
        self.depth_stencil.fill((1.0, 0));
    }

    fn resolve(&mut self) {
        let n = self.samples as usize;
        for (pixel, out) in self.resolved.iter_mut().enumerate() {
            let mut sum = [0.0f32; 4];
            for sample in &self.color[pixel * n..pixel * n + n] {
                for c in 0..4 {
                    sum[c] += sample[c];
                }
            }
            let avg = sum.map(|c| c / n as f32);
            *out = Color::rgba(avg[0], avg[1], avg[2], avg[3]).to_rgba8();
        }
    }

    fn to_image(&self) -> Result<RgbaImage> {
        let bytes: Vec<u8> = self.resolved.iter().flatten().copied().collect();
        RgbaImage::from_raw(self.size.width, self.size.height, bytes)
            .ok_or_else(|| CanvasError::Readback("pixel buffer size mismatch".into()))
    }
}

/// Snapshot of a resolved texture used as a draw source.
struct Texture {
    size: Size,
    texels: Vec<[u8; 4]>,
}

impl Texture {
    fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        let x = ((u * self.size.width as f32).floor() as i64).clamp(0, self.size.width as i64 - 1);
        let y = ((v * self.size.height as f32).floor() as i64).clamp(0, self.size.height as i64 - 1);
        let t = self.texels[y as usize * self.size.width as usize + x as usize];
        t.map(|c| c as f32 / 255.0)
    }
}

struct SoftwareState {
    window: Surface,
    targets: HashMap<TargetId, Surface>,
    programs: HashMap<ProgramId, ProgramKind>,
    next_id: u32,
    bound: Option<TargetId>,
    viewport: PixelRect,
    scissor: Option<PixelRect>,
}

impl SoftwareState {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn bound_surface(&mut self) -> &mut Surface {
        match self.bound.and_then(|id| self.targets.get_mut(&id)) {
            Some(surface) => surface,
            None => &mut self.window,
        }
    }
}

/// Screen-space vertex after the perspective divide.
#[derive(Clone, Copy)]
struct ScreenVertex {
    x: f32,
    y: f32,
    inv_w: f32,
    u_over_w: f32,
    v_over_w: f32,
}

pub struct SoftwareDevice {
    max_dimension: u32,
    state: RefCell<SoftwareState>,
}

impl SoftwareDevice {
    pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

    /// Create a device whose default surface (the "window") is `width` x `height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_max_dimension(width, height, Self::DEFAULT_MAX_DIMENSION)
    }

    pub fn with_max_dimension(width: u32, height: u32, max_dimension: u32) -> Self {
        let size = Size::new(width.max(1), height.max(1));
        Self {
            max_dimension,
            state: RefCell::new(SoftwareState {
                window: Surface::new(size, 1),
                targets: HashMap::new(),
                programs: HashMap::new(),
                next_id: 0,
                bound: None,
                viewport: PixelRect::from_size(size),
                scissor: None,
            }),
        }
    }

    /// Resize the default surface. Its contents are discarded.
    pub fn resize_surface(&self, width: u32, height: u32) {
        let size = Size::new(width.max(1), height.max(1));
        let mut state = self.state.borrow_mut();
        state.window = Surface::new(size, 1);
        if state.bound.is_none() {
            state.viewport = PixelRect::from_size(size);
        }
    }

    pub fn target_count(&self) -> usize {
        self.state.borrow().targets.len()
    }

    pub fn program_count(&self) -> usize {
        self.state.borrow().programs.len()
    }

    fn rasterize(
        surface: &mut Surface,
        clip: PixelRect,
        kind: ProgramKind,
        texture: Option<&Texture>,
        uniforms: &Uniforms,
        tri: [ScreenVertex; 3],
    ) {
        let Some(pattern) = sample_pattern(surface.samples) else {
            return;
        };
        let [a, mut b, mut c] = tri;
        let mut area = edge(&a, &b, c.x, c.y);
        if area.abs() < 1e-12 {
            return;
        }
        if area < 0.0 {
            std::mem::swap(&mut b, &mut c);
            area = -area;
        }

        let min_x = a.x.min(b.x).min(c.x).floor().max(clip.x as f32) as u32;
        let min_y = a.y.min(b.y).min(c.y).floor().max(clip.y as f32) as u32;
        let max_x = (a.x.max(b.x).max(c.x).ceil() as i64).min((clip.x + clip.width) as i64);
        let max_y = (a.y.max(b.y).max(c.y).ceil() as i64).min((clip.y + clip.height) as i64);
        if max_x <= min_x as i64 || max_y <= min_y as i64 {
            return;
        }

        let edges = [(b, c), (c, a), (a, b)];
        let top_left = edges.map(|(p, q)| is_top_left(&p, &q));
        let inside = |x: f32, y: f32| {
            edges.iter().zip(top_left).all(|((p, q), tl)| {
                let e = edge(p, q, x, y);
                e > 0.0 || (e == 0.0 && tl)
            })
        };

        let tint = uniforms.color.to_array();
        let width = surface.size.width as usize;
        let n = surface.samples as usize;

        for py in min_y..max_y as u32 {
            for px in min_x..max_x as u32 {
                let covered: Vec<usize> = pattern
                    .iter()
                    .enumerate()
                    .filter(|(_, (ox, oy))| inside(px as f32 + ox, py as f32 + oy))
                    .map(|(i, _)| i)
                    .collect();
                if covered.is_empty() {
                    continue;
                }

                let src = match (kind, texture) {
                    (ProgramKind::Textured, Some(texture)) => {
                        let cx = px as f32 + 0.5;
                        let cy = py as f32 + 0.5;
                        let w0 = edge(&b, &c, cx, cy) / area;
                        let w1 = edge(&c, &a, cx, cy) / area;
                        let w2 = 1.0 - w0 - w1;
                        let inv_w = w0 * a.inv_w + w1 * b.inv_w + w2 * c.inv_w;
                        let u = (w0 * a.u_over_w + w1 * b.u_over_w + w2 * c.u_over_w) / inv_w;
                        let v = (w0 * a.v_over_w + w1 * b.v_over_w + w2 * c.v_over_w) / inv_w;
                        let texel = texture.sample(u, v);
                        [
                            texel[0] * tint[0],
                            texel[1] * tint[1],
                            texel[2] * tint[2],
                            texel[3] * tint[3],
                        ]
                    }
                    _ => tint,
                };
                if src[3] <= 0.0 {
                    continue;
                }

                let base = (py as usize * width + px as usize) * n;
                for i in covered {
                    let dst = &mut surface.color[base + i];
                    *dst = blend_over(src, *dst);
                }
            }
        }
    }
}

/// Edge function of `p -> q` evaluated at `(x, y)`; positive on the interior side
/// of a triangle with positive area in y-down coordinates.
fn edge(p: &ScreenVertex, q: &ScreenVertex, x: f32, y: f32) -> f32 {
    (q.x - p.x) * (y - p.y) - (q.y - p.y) * (x - p.x)
}

fn is_top_left(p: &ScreenVertex, q: &ScreenVertex) -> bool {
    let dx = q.x - p.x;
    let dy = q.y - p.y;
    (dy == 0.0 && dx > 0.0) || dy < 0.0
}

/// `src.rgb * src.a + dst.rgb * (1 - src.a)`, alpha `src.a + dst.a * (1 - src.a)`.
fn blend_over(src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
    let sa = src[3];
    let inv = 1.0 - sa;
    [
        src[0] * sa + dst[0] * inv,
        src[1] * sa + dst[1] * inv,
        src[2] * sa + dst[2] * inv,
        sa + dst[3] * inv,
    ]
}

impl GraphicsDevice for SoftwareDevice {
    fn max_texture_dimension(&self) -> u32 {
        self.max_dimension
    }

    fn create_program(&self, kind: ProgramKind, _source: &str) -> Result<ProgramId> {
        let mut state = self.state.borrow_mut();
        let id = ProgramId(state.next_id());
        state.programs.insert(id, kind);
        Ok(id)
    }

    fn delete_program(&self, program: ProgramId) {
        self.state.borrow_mut().programs.remove(&program);
    }

    fn create_target(&self, size: Size, samples: u32) -> Result<TargetId> {
        if size.is_empty() || size.width > self.max_dimension || size.height > self.max_dimension
        {
            return Err(CanvasError::Allocation(format!(
                "render target {}x{} outside 1..={}",
                size.width, size.height, self.max_dimension
            )));
        }
        if sample_pattern(samples).is_none() {
            return Err(CanvasError::Allocation(format!(
                "unsupported sample count {samples}"
            )));
        }
        let mut state = self.state.borrow_mut();
        let id = TargetId(state.next_id());
        state.targets.insert(id, Surface::new(size, samples));
        Ok(id)
    }

    fn delete_target(&self, target: TargetId) {
        let mut state = self.state.borrow_mut();
        state.targets.remove(&target);
        if state.bound == Some(target) {
            state.bound = None;
        }
    }

    fn target_size(&self, target: TargetId) -> Option<Size> {
        self.state.borrow().targets.get(&target).map(|s| s.size)
    }

    fn bind_target(&self, target: Option<TargetId>) {
        self.state.borrow_mut().bound = target;
    }

    fn bound_target(&self) -> Option<TargetId> {
        self.state.borrow().bound
    }

    fn bound_size(&self) -> Size {
        self.state.borrow_mut().bound_surface().size
    }

    fn set_viewport(&self, viewport: PixelRect) {
        self.state.borrow_mut().viewport = viewport;
    }

    fn viewport(&self) -> PixelRect {
        self.state.borrow().viewport
    }

    fn set_scissor(&self, scissor: Option<PixelRect>) {
        self.state.borrow_mut().scissor = scissor;
    }

    fn scissor(&self) -> Option<PixelRect> {
        self.state.borrow().scissor
    }

    fn clear(&self, color: Color) {
        self.state.borrow_mut().bound_surface().clear(color);
    }

    fn draw(&self, call: &DrawCall<'_>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let kind = *state
            .programs
            .get(&call.program)
            .ok_or(CanvasError::InvalidState("draw with a deleted program"))?;

        let texture = match (kind, call.texture) {
            (ProgramKind::Textured, Some(id)) => {
                let source = state
                    .targets
                    .get(&id)
                    .ok_or(CanvasError::InvalidState("draw samples a deleted target"))?;
                Some(Texture {
                    size: source.size,
                    texels: source.resolved.clone(),
                })
            }
            (ProgramKind::Textured, None) => {
                return Err(CanvasError::InvalidState("textured draw without a texture"));
            }
            _ => None,
        };

        let viewport = state.viewport;
        let scissor = state.scissor;
        let surface = state.bound_surface();
        let bounds = PixelRect::from_size(surface.size);
        let Some(clip) = intersect(bounds, viewport).and_then(|r| match scissor {
            Some(s) => intersect(r, s),
            None => Some(r),
        }) else {
            return Ok(());
        };

        let mvp = call.uniforms.projection.then(&call.uniforms.model_view);
        let vertices = &call.vertices;
        let screen: Vec<Option<ScreenVertex>> = (0..vertices.len())
            .map(|i| {
                let [x, y] = vertices.position(i);
                let [cx, cy, _, cw] = mvp.transform_vec4([x, y, 0.0, 1.0]);
                if cw <= f32::EPSILON {
                    return None;
                }
                let inv_w = 1.0 / cw;
                let [u, v] = match vertices {
                    Vertices::Textured(_) => vertices.uv(i),
                    Vertices::Solid(_) => [0.0, 0.0],
                };
                Some(ScreenVertex {
                    x: viewport.x as f32 + (cx * inv_w + 1.0) * 0.5 * viewport.width as f32,
                    y: viewport.y as f32 + (1.0 - cy * inv_w) * 0.5 * viewport.height as f32,
                    inv_w,
                    u_over_w: u * inv_w,
                    v_over_w: v * inv_w,
                })
            })
            .collect();

        for [i0, i1, i2] in call.topology.triangles(vertices.len()) {
            if let (Some(a), Some(b), Some(c)) = (screen[i0], screen[i1], screen[i2]) {
                Self::rasterize(
                    surface,
                    clip,
                    kind,
                    texture.as_ref(),
                    &call.uniforms,
                    [a, b, c],
                );
            }
        }
        Ok(())
    }

    fn resolve(&self, target: TargetId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let surface = state
            .targets
            .get_mut(&target)
            .ok_or(CanvasError::InvalidState("resolve of a deleted target"))?;
        surface.resolve();
        Ok(())
    }

    fn read_pixels(&self, target: Option<TargetId>) -> Result<RgbaImage> {
        let mut state = self.state.borrow_mut();
        match target {
            Some(id) => state
                .targets
                .get(&id)
                .ok_or_else(|| CanvasError::Readback(format!("unknown target {id:?}")))?
                .to_image(),
            None => {
                // The window is single-sampled; resolving just quantizes it.
                state.window.resolve();
                state.window.to_image()
            }
        }
    }
}

fn intersect(a: PixelRect, b: PixelRect) -> Option<PixelRect> {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = (a.x + a.width).min(b.x + b.width);
    let y1 = (a.y + a.height).min(b.y + b.height);
    (x1 > x0 && y1 > y0).then(|| PixelRect::new(x0, y0, x1 - x0, y1 - y0))
}
