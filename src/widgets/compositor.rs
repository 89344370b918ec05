use std::rc::Rc;

use super::grid::UniformGrid;
use super::widget::Control;
use crate::canvas::RenderContext;
use crate::color::Color;
use crate::error::Result;
use crate::geometry::{PixelRect, Size};

/// What a window integration provides to the compositor each frame.
///
/// With [`WgpuDevice`](crate::renderer::WgpuDevice) the host also points the
/// device's default target at the acquired surface texture before calling
/// [`Compositor::render_frame`].
pub trait WidgetHost {
    fn viewport_size(&self) -> Size;
    /// Whether the window asked for a repaint since the last call.
    fn take_redraw_request(&mut self) -> bool;
    /// Called after a frame has been composited.
    fn present(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Counts for one call to [`Compositor::render_frame`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Controls whose canvases were recorded again.
    pub recorded: usize,
    /// Controls blitted onto the window.
    pub drawn: usize,
    /// Nothing changed, the window was left untouched.
    pub skipped: bool,
}

/// Paints a flat list of controls onto the default target, back to front.
pub struct Compositor {
    context: Rc<RenderContext>,
    controls: Vec<Box<dyn Control>>,
    background: Color,
    clip_to_bounds: bool,
    last_viewport: Size,
}

impl Compositor {
    pub fn new(context: &Rc<RenderContext>) -> Self {
        Self {
            context: context.clone(),
            controls: Vec::new(),
            background: Color::BLACK,
            clip_to_bounds: false,
            last_viewport: Size::default(),
        }
    }

    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    /// Scissor every control to its untransformed layout box.
    pub fn clip_to_bounds(mut self, clip: bool) -> Self {
        self.clip_to_bounds = clip;
        self
    }

    /// Add a control on top. Returns its index.
    pub fn push(&mut self, control: Box<dyn Control>) -> usize {
        self.controls.push(control);
        self.controls.len() - 1
    }

    pub fn control_mut(&mut self, index: usize) -> Option<&mut (dyn Control + 'static)> {
        self.controls.get_mut(index).map(|c| c.as_mut())
    }

    pub fn controls(&self) -> &[Box<dyn Control>] {
        &self.controls
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn arrange(&mut self, grid: &UniformGrid, area: Size) {
        grid.arrange(area, &mut self.controls);
    }

    /// Re-record dirty controls and repaint the window if anything changed,
    /// the viewport was resized or the host asked for it.
    pub fn render_frame(&mut self, host: &mut dyn WidgetHost) -> Result<FrameStats> {
        let viewport = host.viewport_size();
        let requested = host.take_redraw_request();
        let resized = viewport != self.last_viewport;
        self.last_viewport = viewport;

        let mut stats = FrameStats::default();
        if viewport.is_empty() {
            stats.skipped = true;
            return Ok(stats);
        }

        for control in &mut self.controls {
            if control.start_render()? {
                stats.recorded += 1;
            }
        }

        if stats.recorded == 0 && !requested && !resized {
            stats.skipped = true;
            return Ok(stats);
        }

        let device = self.context.device();
        device.bind_target(None);
        device.set_viewport(PixelRect::from_size(viewport));
        device.set_scissor(None);
        device.clear(self.background);

        for control in &mut self.controls {
            let clip = self
                .clip_to_bounds
                .then(|| PixelRect::enclosing(&control.bounds(), viewport));
            control.draw_on_window(clip)?;
            stats.drawn += 1;
        }

        host.present()?;
        log::trace!(
            "Frame composited: {} recorded, {} drawn",
            stats.recorded,
            stats.drawn
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::config::CanvasConfig;
    use crate::geometry::Rect;
    use crate::renderer::{GraphicsDevice, SoftwareDevice};
    use crate::widgets::{Renderable, Widget};

    struct Fill(Color);

    impl Renderable for Fill {
        fn on_render(&mut self, canvas: &mut Canvas) -> Result<()> {
            canvas.clear_to(self.0)
        }
    }

    struct Host {
        size: Size,
        redraw: bool,
        presented: usize,
    }

    impl WidgetHost for Host {
        fn viewport_size(&self) -> Size {
            self.size
        }

        fn take_redraw_request(&mut self) -> bool {
            std::mem::take(&mut self.redraw)
        }

        fn present(&mut self) -> Result<()> {
            self.presented += 1;
            Ok(())
        }
    }

    #[test]
    fn test_idle_frames_are_skipped() {
        let device = Rc::new(SoftwareDevice::new(20, 20));
        let ctx = RenderContext::new(device.clone(), CanvasConfig::default().sample_count(1))
            .unwrap();
        let mut compositor = Compositor::new(&ctx);
        compositor.push(Box::new(
            Widget::new(&ctx, Fill(Color::RED)).with_bounds(Rect::new(0.0, 0.0, 10.0, 10.0)),
        ));
        compositor.push(Box::new(
            Widget::new(&ctx, Fill(Color::GREEN)).with_bounds(Rect::new(5.0, 5.0, 10.0, 10.0)),
        ));
        let mut host = Host {
            size: Size::new(20, 20),
            redraw: false,
            presented: 0,
        };

        let first = compositor.render_frame(&mut host).unwrap();
        assert_eq!(first.recorded, 2);
        assert_eq!(first.drawn, 2);

        let image = device.read_pixels(None).unwrap();
        assert_eq!(image.get_pixel(1, 1).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(7, 7).0, [0, 255, 0, 255]);
        assert_eq!(image.get_pixel(18, 1).0, [0, 0, 0, 255]);

        let idle = compositor.render_frame(&mut host).unwrap();
        assert!(idle.skipped);
        assert_eq!(host.presented, 1);

        host.redraw = true;
        let repaint = compositor.render_frame(&mut host).unwrap();
        assert_eq!(repaint.recorded, 0);
        assert_eq!(repaint.drawn, 2);
        assert_eq!(host.presented, 2);
    }
}
