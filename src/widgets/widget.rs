use std::rc::Rc;

use bitflags::bitflags;

use super::pipeline::TransformPipeline;
use crate::canvas::{Canvas, RenderContext};
use crate::color::Color;
use crate::error::Result;
use crate::geometry::{PixelRect, Rect, Size};
use crate::transform::Transform;
use crate::transform_origin::TransformOrigin;

bitflags! {
    /// Why a widget's canvas has to be recorded again.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DirtyFlags: u8 {
        /// Position, size, transform or origin changed.
        const LAYOUT = 1 << 0;
        /// The content asked to be redrawn.
        const CONTENT = 1 << 1;
    }
}

/// Content drawn into a widget's canvas.
///
/// `on_render` is called between `begin` and `end` after the canvas has been
/// cleared, and only when the widget is dirty.
pub trait Renderable {
    fn on_render(&mut self, canvas: &mut Canvas) -> Result<()>;
}

/// Object-safe view of a widget, used by the compositor and layout helpers.
pub trait Control {
    fn bounds(&self) -> Rect;
    fn set_bounds(&mut self, bounds: Rect);
    fn set_transform(&mut self, transform: Transform);
    fn set_origin(&mut self, origin: TransformOrigin);
    fn invalidate(&mut self);
    fn is_dirty(&self) -> bool;
    /// Re-record the canvas if dirty. Returns whether anything was recorded.
    fn start_render(&mut self) -> Result<bool>;
    /// Blit onto the currently bound target, optionally scissored to `clip`.
    fn draw_on_window(&mut self, clip: Option<PixelRect>) -> Result<()>;
}

/// A positioned, transformable surface with its own canvas.
///
/// The canvas is created the first time the widget renders with a nonzero
/// size and recreated only when the size changes.
pub struct Widget<R> {
    context: Rc<RenderContext>,
    pipeline: TransformPipeline,
    canvas: Option<Canvas>,
    dirty: DirtyFlags,
    tint: Color,
    content: R,
}

impl<R: Renderable> Widget<R> {
    pub fn new(context: &Rc<RenderContext>, content: R) -> Self {
        Self {
            context: context.clone(),
            pipeline: TransformPipeline::new(context.config().projection),
            canvas: None,
            dirty: DirtyFlags::LAYOUT,
            tint: Color::WHITE,
            content,
        }
    }

    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.set_bounds(bounds);
        self
    }

    pub fn content(&self) -> &R {
        &self.content
    }

    /// Mutable access to the content. Marks the widget for redraw.
    pub fn content_mut(&mut self) -> &mut R {
        self.dirty |= DirtyFlags::CONTENT;
        &mut self.content
    }

    /// Run `f` on the content and mark the widget for redraw only if it returns `true`.
    pub fn update(&mut self, f: impl FnOnce(&mut R) -> bool) {
        if f(&mut self.content) {
            self.dirty |= DirtyFlags::CONTENT;
        }
    }

    pub fn pipeline(&self) -> &TransformPipeline {
        &self.pipeline
    }

    pub fn canvas(&self) -> Option<&Canvas> {
        self.canvas.as_ref()
    }

    pub fn dirty_flags(&self) -> DirtyFlags {
        self.dirty
    }

    pub fn size(&self) -> Size {
        self.pipeline.size()
    }

    pub fn set_position(&mut self, left: f32, top: f32) {
        if self.pipeline.set_position(left, top) {
            self.dirty |= DirtyFlags::LAYOUT;
        }
    }

    /// A zero width or height means "not laid out yet"; nothing is allocated or drawn.
    pub fn set_size(&mut self, width: u32, height: u32) {
        if self.pipeline.set_size(Size::new(width, height)) {
            self.dirty |= DirtyFlags::LAYOUT;
        }
    }

    pub fn set_transform(&mut self, transform: Transform) {
        if self.pipeline.set_transform(transform) {
            self.dirty |= DirtyFlags::LAYOUT;
        }
    }

    pub fn set_origin(&mut self, origin: TransformOrigin) {
        if self.pipeline.set_origin(origin) {
            self.dirty |= DirtyFlags::LAYOUT;
        }
    }

    /// Color the canvas is multiplied by when blitted. Does not re-record.
    pub fn set_tint(&mut self, tint: Color) {
        self.tint = tint;
    }

    /// Release the canvas. It is recreated on the next render.
    pub fn dispose(&mut self) {
        if let Some(mut canvas) = self.canvas.take() {
            canvas.dispose();
        }
        self.dirty |= DirtyFlags::LAYOUT;
    }

    fn ensure_canvas(&mut self) -> Result<()> {
        let size = self.pipeline.size();
        match &mut self.canvas {
            Some(canvas) if canvas.size() == size => {}
            Some(canvas) => canvas.resize(size.width, size.height)?,
            None => {
                log::debug!("Creating {}x{} widget canvas", size.width, size.height);
                self.canvas = Some(Canvas::new(&self.context, size.width, size.height)?);
            }
        }
        Ok(())
    }
}

impl<R: Renderable> Control for Widget<R> {
    fn bounds(&self) -> Rect {
        self.pipeline.bounds()
    }

    fn set_bounds(&mut self, bounds: Rect) {
        self.set_position(bounds.x, bounds.y);
        self.set_size(
            bounds.width.max(0.0).round() as u32,
            bounds.height.max(0.0).round() as u32,
        );
    }

    fn set_transform(&mut self, transform: Transform) {
        Widget::set_transform(self, transform);
    }

    fn set_origin(&mut self, origin: TransformOrigin) {
        Widget::set_origin(self, origin);
    }

    fn invalidate(&mut self) {
        self.dirty |= DirtyFlags::CONTENT;
    }

    fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    fn start_render(&mut self) -> Result<bool> {
        if self.pipeline.size().is_empty() || self.dirty.is_empty() {
            return Ok(false);
        }
        self.ensure_canvas()?;
        let Some(canvas) = self.canvas.as_mut() else {
            return Ok(false);
        };

        canvas.begin()?;
        let recorded = canvas
            .clear()
            .and_then(|()| self.content.on_render(canvas));
        let ended = canvas.end();
        recorded?;
        ended?;

        self.dirty = DirtyFlags::empty();
        Ok(true)
    }

    fn draw_on_window(&mut self, clip: Option<PixelRect>) -> Result<()> {
        let Some(canvas) = self.canvas.as_ref() else {
            return Ok(());
        };
        if self.pipeline.size().is_empty() {
            return Ok(());
        }

        let device = self.context.device();
        let viewport = device.viewport();
        let uniforms = self.pipeline.uniforms(viewport.size(), self.tint);

        let previous = device.scissor();
        if let Some(clip) = clip {
            let clip = PixelRect::new(
                viewport.x + clip.x,
                viewport.y + clip.y,
                clip.width,
                clip.height,
            );
            // Never widen a scissor set by whoever is drawing around us.
            let scissor = match previous {
                Some(outer) => outer.intersection(&clip),
                None => Some(clip),
            };
            let Some(scissor) = scissor else {
                return Ok(());
            };
            device.set_scissor(Some(scissor));
        }
        let drawn = canvas.draw_transformed(self.pipeline.bounds(), uniforms);
        device.set_scissor(previous);
        drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasConfig;
    use crate::renderer::{GraphicsDevice, SoftwareDevice};

    #[derive(Default)]
    struct Counter {
        renders: usize,
    }

    impl Renderable for Counter {
        fn on_render(&mut self, canvas: &mut Canvas) -> Result<()> {
            self.renders += 1;
            canvas.clear_to(Color::BLUE)
        }
    }

    fn setup() -> (Rc<SoftwareDevice>, Rc<RenderContext>) {
        let device = Rc::new(SoftwareDevice::new(32, 32));
        let ctx = RenderContext::new(device.clone(), CanvasConfig::default().sample_count(1))
            .unwrap();
        (device, ctx)
    }

    #[test]
    fn test_zero_size_never_allocates() {
        let (device, ctx) = setup();
        let mut widget = Widget::new(&ctx, Counter::default());
        widget.set_size(0, 10);
        assert!(!widget.start_render().unwrap());
        widget.draw_on_window(None).unwrap();
        assert!(widget.canvas().is_none());
        assert_eq!(device.target_count(), 0);
        assert_eq!(widget.content().renders, 0);
    }

    #[test]
    fn test_clean_widget_is_not_rerecorded() {
        let (_, ctx) = setup();
        let mut widget = Widget::new(&ctx, Counter::default());
        widget.set_bounds(Rect::new(2.0, 2.0, 8.0, 8.0));
        assert!(widget.start_render().unwrap());
        assert!(!widget.start_render().unwrap());
        assert_eq!(widget.content().renders, 1);

        widget.set_position(2.0, 2.0);
        assert!(!widget.is_dirty());

        widget.content_mut();
        assert!(widget.start_render().unwrap());
        assert_eq!(widget.content().renders, 2);
    }

    #[test]
    fn test_canvas_recreated_only_on_size_change() {
        let (device, ctx) = setup();
        let mut widget = Widget::new(&ctx, Counter::default());
        widget.set_size(8, 8);
        widget.start_render().unwrap();
        let first = widget.canvas().unwrap().render_target().id().unwrap();

        widget.set_position(5.0, 5.0);
        widget.set_transform(Transform::rotate_degrees(10.0));
        widget.start_render().unwrap();
        assert_eq!(widget.canvas().unwrap().render_target().id().unwrap(), first);

        widget.set_size(12, 8);
        widget.start_render().unwrap();
        assert_ne!(widget.canvas().unwrap().render_target().id().unwrap(), first);
        assert_eq!(device.target_count(), 1);
        assert_eq!(widget.content().renders, 3);
    }

    #[test]
    fn test_draw_on_window_blits_at_layout_box() {
        let (device, ctx) = setup();
        let mut widget = Widget::new(&ctx, Counter::default());
        widget.set_bounds(Rect::new(4.0, 6.0, 10.0, 5.0));
        widget.start_render().unwrap();

        device.clear(Color::BLACK);
        widget.draw_on_window(None).unwrap();
        let image = device.read_pixels(None).unwrap();
        assert_eq!(image.get_pixel(4, 6).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(13, 10).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(14, 10).0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(4, 11).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_clip_limits_blit() {
        let (device, ctx) = setup();
        let mut widget = Widget::new(&ctx, Counter::default());
        widget.set_bounds(Rect::new(0.0, 0.0, 16.0, 16.0));
        widget.start_render().unwrap();

        device.clear(Color::BLACK);
        widget
            .draw_on_window(Some(PixelRect::new(0, 0, 4, 4)))
            .unwrap();
        let image = device.read_pixels(None).unwrap();
        assert_eq!(image.get_pixel(3, 3).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(4, 3).0, [0, 0, 0, 255]);
        assert_eq!(device.scissor(), None);
    }

    #[test]
    fn test_clip_stays_inside_outer_scissor() {
        let (device, ctx) = setup();
        let mut widget = Widget::new(&ctx, Counter::default());
        widget.set_bounds(Rect::new(0.0, 0.0, 16.0, 16.0));
        widget.start_render().unwrap();

        device.clear(Color::BLACK);
        let outer = PixelRect::new(0, 0, 6, 6);
        device.set_scissor(Some(outer));
        widget
            .draw_on_window(Some(PixelRect::new(2, 2, 10, 10)))
            .unwrap();
        assert_eq!(device.scissor(), Some(outer));
        device.set_scissor(None);

        let image = device.read_pixels(None).unwrap();
        assert_eq!(image.get_pixel(1, 1).0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(2, 2).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(5, 5).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(6, 5).0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(8, 8).0, [0, 0, 0, 255]);

        // Disjoint clip draws nothing.
        device.clear(Color::BLACK);
        device.set_scissor(Some(outer));
        widget
            .draw_on_window(Some(PixelRect::new(10, 10, 4, 4)))
            .unwrap();
        device.set_scissor(None);
        let image = device.read_pixels(None).unwrap();
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }
}
