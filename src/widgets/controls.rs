use std::rc::Rc;
use std::time::{Duration, Instant};

use super::widget::Renderable;
use crate::canvas::Canvas;
use crate::color::Color;
use crate::error::Result;
use crate::geometry::Point;
use crate::text::FontFace;

/// Frames-per-second readout, updated once a second.
pub struct FpsLabel {
    font: Rc<dyn FontFace>,
    color: Color,
    pixel_size: f32,
    fps: u32,
    frames: u32,
    window_start: Option<Instant>,
}

impl FpsLabel {
    pub fn new(font: Rc<dyn FontFace>) -> Self {
        Self {
            font,
            color: Color::GREEN,
            pixel_size: 32.0,
            fps: 0,
            frames: 0,
            window_start: None,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_pixel_size(mut self, pixel_size: f32) -> Self {
        self.pixel_size = pixel_size;
        self
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Count one frame. Returns `true` when the displayed value changed.
    pub fn record_frame(&mut self, now: Instant) -> bool {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed < Duration::from_secs(1) {
            return false;
        }
        let fps = (self.frames as f64 / elapsed.as_secs_f64()).round() as u32;
        self.frames = 0;
        self.window_start = Some(now);
        if fps == self.fps {
            return false;
        }
        self.fps = fps;
        true
    }
}

impl Renderable for FpsLabel {
    fn on_render(&mut self, canvas: &mut Canvas) -> Result<()> {
        canvas.clear_to(Color::TRANSPARENT)?;
        let text = self.fps.to_string();
        let width = canvas
            .context()
            .measure_text(self.font.as_ref(), &text, self.pixel_size);
        let size = canvas.size();
        let origin = Point::new(
            ((size.width as f32 - width) / 2.0).max(0.0),
            ((size.height as f32 - self.pixel_size) / 2.0).max(0.0),
        );
        canvas.draw_text(origin, &text, self.pixel_size, self.color, self.font.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::BlockFont;

    #[test]
    fn test_fps_updates_once_per_second() {
        let mut label = FpsLabel::new(Rc::new(BlockFont));
        let t0 = Instant::now();
        assert!(!label.record_frame(t0));
        for i in 1..60 {
            assert!(!label.record_frame(t0 + Duration::from_millis(i * 16)));
        }
        assert!(label.record_frame(t0 + Duration::from_millis(1000)));
        assert_eq!(label.fps(), 61);
    }
}
