//! Retained off-screen drawing surfaces.
//!
//! A [`Canvas`] owns a multisampled [`RenderTarget`] and records primitives into
//! it between [`begin`](Canvas::begin) and [`end`](Canvas::end). Coordinates are
//! logical pixels with the origin at the top-left corner; when the logical size
//! is too large for the device the backing texture is allocated smaller and all
//! drawing is scaled down uniformly.
//!
//! ```ignore
//! let ctx = RenderContext::new(device, CanvasConfig::default())?;
//! let mut canvas = Canvas::new(&ctx, 200, 100)?;
//! canvas.begin()?;
//! canvas.clear()?;
//! canvas.draw_rectangle(Rect::new(10.0, 10.0, 50.0, 20.0), Color::RED)?;
//! canvas.end()?;
//! ```

mod context;
mod size_policy;

pub use context::RenderContext;
pub use size_policy::{backing_for, Backing};

use std::f32::consts::TAU;
use std::path::Path;
use std::rc::Rc;

use image::RgbaImage;

use crate::color::Color;
use crate::error::{CanvasError, Result};
use crate::geometry::{PixelRect, Point, Rect, Size};
use crate::renderer::{
    DrawCall, ProgramKind, RenderTarget, SolidVertex, TargetId, TexturedVertex, Topology,
    Uniforms, Vertices,
};
use crate::text::FontFace;
use crate::transform::Transform;

/// Device state captured by `begin` and put back by `end`.
#[derive(Debug, Clone, Copy)]
struct SavedState {
    target: Option<TargetId>,
    viewport: PixelRect,
    scissor: Option<PixelRect>,
}

pub struct Canvas {
    context: Rc<RenderContext>,
    target: RenderTarget,
    logical: Size,
    backing: Backing,
    saved: Option<SavedState>,
}

impl Canvas {
    /// Allocate a canvas of `width x height` logical pixels.
    pub fn new(context: &Rc<RenderContext>, width: u32, height: u32) -> Result<Self> {
        let logical = Size::new(width, height);
        let backing = backing_for(
            logical,
            context.device().max_texture_dimension(),
            context.max_texture_area(),
        )?;
        let target = RenderTarget::create(
            context.device().clone(),
            backing.size,
            context.config().sample_count,
        )?;
        Ok(Self {
            context: context.clone(),
            target,
            logical,
            backing,
            saved: None,
        })
    }

    pub fn context(&self) -> &Rc<RenderContext> {
        &self.context
    }

    /// Logical size requested by the caller.
    pub fn size(&self) -> Size {
        self.logical
    }

    /// Actual size of the backing texture.
    pub fn backing_size(&self) -> Size {
        self.backing.size
    }

    /// Uniform downscale applied to the backing, `1.0` unless the canvas was too large.
    pub fn scale(&self) -> f32 {
        self.backing.scale
    }

    pub fn render_target(&self) -> &RenderTarget {
        &self.target
    }

    pub fn is_recording(&self) -> bool {
        self.saved.is_some()
    }

    /// Start recording. Captures the bound target, viewport and scissor, then
    /// binds this canvas with a full viewport and no scissor. Calling it again
    /// while recording does nothing.
    pub fn begin(&mut self) -> Result<()> {
        if self.saved.is_some() {
            log::debug!("Canvas::begin while already recording; ignored");
            return Ok(());
        }
        let id = self.target.id()?;
        let device = self.context.device();
        self.saved = Some(SavedState {
            target: device.bound_target(),
            viewport: device.viewport(),
            scissor: device.scissor(),
        });
        device.bind_target(Some(id));
        device.set_viewport(PixelRect::from_size(self.backing.size));
        device.set_scissor(None);
        Ok(())
    }

    /// Finish recording: resolve the multisampled surface and restore the state
    /// captured by `begin`. Does nothing when not recording.
    pub fn end(&mut self) -> Result<()> {
        let Some(saved) = self.saved.take() else {
            log::debug!("Canvas::end without begin; ignored");
            return Ok(());
        };
        let resolved = self.target.resolve();
        let device = self.context.device();
        device.bind_target(saved.target);
        device.set_viewport(saved.viewport);
        device.set_scissor(saved.scissor);
        resolved
    }

    /// Clear to the configured clear color.
    pub fn clear(&mut self) -> Result<()> {
        let color = self.context.config().clear_color;
        self.clear_to(color)
    }

    /// Clear the whole canvas, ignoring any scissor.
    pub fn clear_to(&mut self, color: Color) -> Result<()> {
        self.ensure_recording("clear")?;
        let device = self.context.device();
        let scissor = device.scissor();
        device.set_scissor(None);
        device.clear(color);
        device.set_scissor(scissor);
        Ok(())
    }

    pub fn draw_rectangle(&mut self, rect: Rect, color: Color) -> Result<()> {
        self.ensure_recording("draw_rectangle")?;
        let vertices = [
            SolidVertex::new(rect.x, rect.y),
            SolidVertex::new(rect.right(), rect.y),
            SolidVertex::new(rect.x, rect.bottom()),
            SolidVertex::new(rect.right(), rect.bottom()),
        ];
        self.draw_solid(
            ProgramKind::Solid,
            Topology::TriangleStrip,
            &vertices,
            Uniforms::new(self.projection(), color),
        )
    }

    /// Filled circle approximated by a fan over the configured number of rim points.
    pub fn draw_circle(&mut self, center: Point, radius: f32, color: Color) -> Result<()> {
        self.ensure_recording("draw_circle")?;
        if radius <= 0.0 {
            return Ok(());
        }
        let segments = self.context.config().circle_segments.max(3);
        let vertices: Vec<SolidVertex> = (0..segments)
            .map(|i| {
                let angle = TAU * i as f32 / segments as f32;
                SolidVertex::new(
                    center.x + radius * angle.cos(),
                    center.y + radius * angle.sin(),
                )
            })
            .collect();
        self.draw_solid(
            ProgramKind::Solid,
            Topology::TriangleFan,
            &vertices,
            Uniforms::new(self.projection(), color),
        )
    }

    /// Line of `width` pixels centered on the segment. Zero-length lines draw nothing.
    pub fn draw_line(&mut self, start: Point, end: Point, width: f32, color: Color) -> Result<()> {
        self.ensure_recording("draw_line")?;
        let (dx, dy) = (end.x - start.x, end.y - start.y);
        let length = (dx * dx + dy * dy).sqrt();
        if length <= f32::EPSILON || width <= 0.0 {
            return Ok(());
        }
        let half = width * 0.5 / length;
        let (nx, ny) = (-dy * half, dx * half);
        let vertices = [
            SolidVertex::new(start.x + nx, start.y + ny),
            SolidVertex::new(start.x - nx, start.y - ny),
            SolidVertex::new(end.x + nx, end.y + ny),
            SolidVertex::new(end.x - nx, end.y - ny),
        ];
        self.draw_solid(
            ProgramKind::Solid,
            Topology::TriangleStrip,
            &vertices,
            Uniforms::new(self.projection(), color),
        )
    }

    /// Draw `text` with the top of its line box at `origin`.
    pub fn draw_text(
        &mut self,
        origin: Point,
        text: &str,
        pixel_size: f32,
        color: Color,
        font: &dyn FontFace,
    ) -> Result<()> {
        self.ensure_recording("draw_text")?;
        if text.is_empty() {
            return Ok(());
        }
        let batches = self.context.tessellate_text(font, text, pixel_size)?;
        let uniforms = Uniforms::new(self.projection(), color)
            .with_model_view(Transform::translate(origin.x, origin.y));
        for batch in &batches {
            let vertices: Vec<SolidVertex> = batch
                .vertices
                .chunks_exact(2)
                .map(|p| SolidVertex::new(p[0], p[1]))
                .collect();
            self.draw_solid(ProgramKind::Text, Topology::TriangleList, &vertices, uniforms)?;
        }
        Ok(())
    }

    /// Composite another canvas's resolved contents with its top-left corner at
    /// `dest.x, dest.y`, at the source's logical size. With `clip` set, nothing
    /// outside `dest` is written.
    pub fn draw_canvas(&mut self, source: &Canvas, dest: Rect, clip: bool) -> Result<()> {
        self.ensure_recording("draw_canvas")?;
        if source.is_recording() {
            return Err(CanvasError::InvalidState(
                "cannot draw a canvas that is still recording",
            ));
        }
        let texture = source.target.id()?;
        let quad = TexturedVertex::quad(
            dest.x,
            dest.y,
            source.logical.width as f32,
            source.logical.height as f32,
        );
        let uniforms = Uniforms::new(self.projection(), Color::WHITE);

        if !clip {
            return self.draw_textured(texture, &quad, uniforms);
        }

        let device = self.context.device();
        let previous = device.scissor();
        let (sx, sy) = self.backing.axis_scale(self.logical);
        let scaled = Rect::new(dest.x * sx, dest.y * sy, dest.width * sx, dest.height * sy);
        let scissor = PixelRect::enclosing(&scaled, self.backing.size);
        if scissor.width == 0 || scissor.height == 0 {
            return Ok(());
        }
        device.set_scissor(Some(scissor));
        let drawn = self.draw_textured(texture, &quad, uniforms);
        device.set_scissor(previous);
        drawn
    }

    /// Blit the whole canvas over the viewport of whatever is currently bound,
    /// usually the window surface.
    pub fn draw_on_window(&self) -> Result<()> {
        self.draw_transformed(
            Rect::from_size(self.logical),
            Uniforms::new(self.projection(), Color::WHITE),
        )
    }

    /// Blit the canvas as a quad at `quad` under caller-supplied matrices onto
    /// the currently bound target.
    pub fn draw_transformed(&self, quad: Rect, uniforms: Uniforms) -> Result<()> {
        if self.is_recording() {
            return Err(CanvasError::InvalidState(
                "cannot composite a canvas that is still recording",
            ));
        }
        let texture = self.target.id()?;
        let vertices = TexturedVertex::quad(quad.x, quad.y, quad.width, quad.height);
        self.draw_textured(texture, &vertices, uniforms)
    }

    /// Reallocate for a new logical size. Contents are lost.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.is_recording() {
            return Err(CanvasError::InvalidState("cannot resize while recording"));
        }
        let logical = Size::new(width, height);
        if logical == self.logical && !self.target.is_disposed() {
            return Ok(());
        }
        let backing = backing_for(
            logical,
            self.context.device().max_texture_dimension(),
            self.context.max_texture_area(),
        )?;
        self.target.resize(backing.size)?;
        self.logical = logical;
        self.backing = backing;
        Ok(())
    }

    /// Resolved contents at backing resolution.
    pub fn read_pixels(&self) -> Result<RgbaImage> {
        if self.is_recording() {
            return Err(CanvasError::InvalidState("cannot read a canvas while recording"));
        }
        self.target.read_pixels()
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        if self.is_recording() {
            return Err(CanvasError::InvalidState("cannot read a canvas while recording"));
        }
        self.target.save_png(path)
    }

    /// Release the backing texture early. Any later use fails with `InvalidState`.
    pub fn dispose(&mut self) {
        if self.is_recording() {
            log::warn!("Disposing a canvas that is still recording");
            if let Err(e) = self.end() {
                log::warn!("Failed to resolve canvas on dispose: {}", e);
            }
        }
        self.target.dispose();
    }

    /// Logical pixels to clip space with y down, covering the full viewport.
    fn projection(&self) -> Transform {
        Transform::orthographic_off_center(
            0.0,
            self.logical.width as f32,
            self.logical.height as f32,
            0.0,
            -1.0,
            1.0,
        )
    }

    fn ensure_recording(&self, op: &'static str) -> Result<()> {
        if !self.is_recording() {
            log::warn!("Canvas::{op} outside begin/end; ignored");
            return Err(CanvasError::InvalidState("canvas is not recording"));
        }
        let id = self.target.id()?;
        if self.context.device().bound_target() != Some(id) {
            log::warn!("Canvas::{op} while another canvas is bound");
            return Err(CanvasError::InvalidState(
                "canvas target is not bound; another canvas is recording",
            ));
        }
        Ok(())
    }

    fn draw_solid(
        &self,
        kind: ProgramKind,
        topology: Topology,
        vertices: &[SolidVertex],
        uniforms: Uniforms,
    ) -> Result<()> {
        if vertices.is_empty() {
            return Ok(());
        }
        let program = self.context.shaders().program(kind)?;
        self.context.device().draw(&DrawCall {
            program: program.id,
            topology,
            vertices: Vertices::Solid(vertices),
            uniforms,
            texture: None,
        })
    }

    fn draw_textured(
        &self,
        texture: TargetId,
        vertices: &[TexturedVertex],
        uniforms: Uniforms,
    ) -> Result<()> {
        let program = self.context.shaders().program(ProgramKind::Textured)?;
        self.context.device().draw(&DrawCall {
            program: program.id,
            topology: Topology::TriangleStrip,
            vertices: Vertices::Textured(vertices),
            uniforms,
            texture: Some(texture),
        })
    }
}

impl Drop for Canvas {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasConfig;
    use crate::renderer::{GraphicsDevice, SoftwareDevice};
    use crate::text::BlockFont;

    fn setup(config: CanvasConfig) -> (Rc<SoftwareDevice>, Rc<RenderContext>) {
        let device = Rc::new(SoftwareDevice::new(64, 64));
        let ctx = RenderContext::new(device.clone(), config).unwrap();
        (device, ctx)
    }

    fn pixel(image: &RgbaImage, x: u32, y: u32) -> [u8; 4] {
        image.get_pixel(x, y).0
    }

    #[test]
    fn test_rect_fills_exact_pixels() {
        let (_, ctx) = setup(CanvasConfig::default().sample_count(1));
        let mut canvas = Canvas::new(&ctx, 10, 10).unwrap();
        canvas.begin().unwrap();
        canvas.clear_to(Color::BLACK).unwrap();
        canvas
            .draw_rectangle(Rect::new(2.0, 3.0, 4.0, 5.0), Color::RED)
            .unwrap();
        canvas.end().unwrap();

        let image = canvas.read_pixels().unwrap();
        assert_eq!(pixel(&image, 2, 3), [255, 0, 0, 255]);
        assert_eq!(pixel(&image, 5, 7), [255, 0, 0, 255]);
        assert_eq!(pixel(&image, 6, 7), [0, 0, 0, 255]);
        assert_eq!(pixel(&image, 2, 8), [0, 0, 0, 255]);
        assert_eq!(pixel(&image, 1, 3), [0, 0, 0, 255]);
    }

    #[test]
    fn test_primitives_outside_recording_fail() {
        let (_, ctx) = setup(CanvasConfig::default());
        let mut canvas = Canvas::new(&ctx, 8, 8).unwrap();
        assert!(matches!(
            canvas.draw_rectangle(Rect::new(0.0, 0.0, 1.0, 1.0), Color::RED),
            Err(CanvasError::InvalidState(_))
        ));
        assert!(matches!(canvas.clear(), Err(CanvasError::InvalidState(_))));
    }

    #[test]
    fn test_begin_end_restore_device_state() {
        let (device, ctx) = setup(CanvasConfig::default());
        device.set_viewport(PixelRect::new(1, 2, 30, 40));
        device.set_scissor(Some(PixelRect::new(3, 3, 5, 5)));

        let mut canvas = Canvas::new(&ctx, 16, 16).unwrap();
        canvas.begin().unwrap();
        canvas.begin().unwrap();
        assert_eq!(device.viewport(), PixelRect::new(0, 0, 16, 16));
        assert_eq!(device.scissor(), None);
        canvas.end().unwrap();
        canvas.end().unwrap();

        assert_eq!(device.bound_target(), None);
        assert_eq!(device.viewport(), PixelRect::new(1, 2, 30, 40));
        assert_eq!(device.scissor(), Some(PixelRect::new(3, 3, 5, 5)));
    }

    #[test]
    fn test_nested_begin_restores_outer_canvas() {
        let (device, ctx) = setup(CanvasConfig::default());
        let mut outer = Canvas::new(&ctx, 16, 16).unwrap();
        let mut inner = Canvas::new(&ctx, 8, 8).unwrap();

        outer.begin().unwrap();
        inner.begin().unwrap();
        assert!(matches!(
            outer.clear(),
            Err(CanvasError::InvalidState(_))
        ));
        inner.end().unwrap();
        assert_eq!(device.bound_target(), Some(outer.render_target().id().unwrap()));
        outer.clear().unwrap();
        outer.end().unwrap();
    }

    #[test]
    fn test_draw_canvas_rejects_recording_source() {
        let (_, ctx) = setup(CanvasConfig::default());
        let mut dest = Canvas::new(&ctx, 16, 16).unwrap();
        let mut source = Canvas::new(&ctx, 8, 8).unwrap();
        source.begin().unwrap();
        dest.begin().unwrap();
        assert!(matches!(
            dest.draw_canvas(&source, Rect::new(0.0, 0.0, 8.0, 8.0), false),
            Err(CanvasError::InvalidState(_))
        ));
        dest.end().unwrap();
        source.end().unwrap();
    }

    #[test]
    fn test_clipped_draw_canvas_stays_in_dest() {
        let (_, ctx) = setup(CanvasConfig::default().sample_count(1));
        let mut source = Canvas::new(&ctx, 10, 10).unwrap();
        source.begin().unwrap();
        source.clear_to(Color::GREEN).unwrap();
        source.end().unwrap();

        let mut dest = Canvas::new(&ctx, 20, 20).unwrap();
        dest.begin().unwrap();
        dest.clear_to(Color::BLACK).unwrap();
        dest.draw_canvas(&source, Rect::new(5.0, 5.0, 4.0, 3.0), true)
            .unwrap();
        dest.end().unwrap();

        let image = dest.read_pixels().unwrap();
        for y in 0..20 {
            for x in 0..20 {
                let inside = (5..9).contains(&x) && (5..8).contains(&y);
                let expected = if inside { [0, 255, 0, 255] } else { [0, 0, 0, 255] };
                assert_eq!(pixel(&image, x, y), expected, "pixel {x},{y}");
            }
        }
    }

    #[test]
    fn test_line_and_empty_text_are_harmless() {
        let (_, ctx) = setup(CanvasConfig::default());
        let mut canvas = Canvas::new(&ctx, 8, 8).unwrap();
        canvas.begin().unwrap();
        canvas.clear_to(Color::BLACK).unwrap();
        let p = Point::new(3.0, 3.0);
        canvas.draw_line(p, p, 2.0, Color::RED).unwrap();
        canvas
            .draw_text(p, "", 12.0, Color::RED, &BlockFont)
            .unwrap();
        canvas.end().unwrap();
        let image = canvas.read_pixels().unwrap();
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn test_oversize_canvas_is_scaled() {
        let device = Rc::new(SoftwareDevice::with_max_dimension(8, 8, 64));
        let ctx = RenderContext::new(device, CanvasConfig::default()).unwrap();
        let canvas = Canvas::new(&ctx, 256, 32).unwrap();
        assert_eq!(canvas.size(), Size::new(256, 32));
        assert_eq!(canvas.backing_size(), Size::new(64, 8));
        assert_eq!(canvas.scale(), 0.25);
    }

    #[test]
    fn test_resize_while_recording_fails() {
        let (_, ctx) = setup(CanvasConfig::default());
        let mut canvas = Canvas::new(&ctx, 8, 8).unwrap();
        canvas.begin().unwrap();
        assert!(canvas.resize(4, 4).is_err());
        canvas.end().unwrap();
        canvas.resize(4, 4).unwrap();
        assert_eq!(canvas.backing_size(), Size::new(4, 4));
    }
}
