//! A grid of widgets composited onto a window-sized surface for a few frames.
//!
//! One panel spins around its center and one around its top-left corner; the
//! others stay clean and are only blitted. The last frame is saved:
//! ```bash
//! cargo run --example widgets -- widgets.png
//! ```

use std::rc::Rc;
use std::time::Instant;

use tessera::prelude::*;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

struct Panel {
    label: String,
    fill: Color,
    font: Rc<dyn FontFace>,
}

impl Renderable for Panel {
    fn on_render(&mut self, canvas: &mut Canvas) -> Result<()> {
        let size = canvas.size();
        let (w, h) = (size.width as f32, size.height as f32);
        canvas.clear_to(self.fill)?;
        canvas.draw_rectangle(Rect::new(w / 2.0, h / 2.0, w, h), Color::from_hex(0xFFDC01))?;
        canvas.draw_circle(Point::new(50.0, 50.0), 50.0, Color::from_hex(0x6597FF))?;
        canvas.draw_line(Point::new(0.0, 0.0), Point::new(w, h), 5.0, Color::from_hex(0x0B78D3))?;
        canvas.draw_text(
            Point::new(20.0, 20.0),
            &self.label,
            24.0,
            Color::BLACK,
            self.font.as_ref(),
        )
    }
}

struct HeadlessWindow {
    size: Size,
    first_frame: bool,
}

impl WidgetHost for HeadlessWindow {
    fn viewport_size(&self) -> Size {
        self.size
    }

    fn take_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.first_frame)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "widgets.png".to_string());

    let device = Rc::new(SoftwareDevice::new(WIDTH, HEIGHT));
    let ctx = RenderContext::new(device.clone(), CanvasConfig::default())?;
    let font = ctx.font(BlockFont::KEY)?;

    let grid = UniformGrid::new(3, 2);
    let area = Size::new(WIDTH, HEIGHT);
    let mut compositor = Compositor::new(&ctx).with_background(Color::WHITE);
    for (i, label) in ["SPIN", "ONE", "TWO", "THREE", "SWING"].iter().enumerate() {
        compositor.push(Box::new(Widget::new(
            &ctx,
            Panel {
                label: label.to_string(),
                fill: Color::from_hsv(i as f32 * 72.0, 0.4, 0.95),
                font: font.clone(),
            },
        )));
    }
    compositor.arrange(&grid, area);
    let (spinning, swinging) = (0, 4);
    if let Some(control) = compositor.control_mut(swinging) {
        control.set_origin(TransformOrigin::TOP_LEFT);
    }

    // Its content changes on its own schedule, so it is drawn over the
    // compositor's output instead of being one of its controls.
    let mut fps = Widget::new(&ctx, FpsLabel::new(font.clone()));
    fps.set_bounds(grid.cell(area, 5));

    let mut window = HeadlessWindow {
        size: area,
        first_frame: true,
    };

    let started = Instant::now();
    let frames = 12;
    for frame in 0..frames {
        for (index, degrees_per_frame) in [(spinning, 7.5), (swinging, -2.5)] {
            if let Some(control) = compositor.control_mut(index) {
                control.set_transform(Transform::rotate_degrees(frame as f32 * degrees_per_frame));
            }
        }
        fps.update(|label| label.record_frame(Instant::now()));

        let stats = compositor.render_frame(&mut window)?;
        if !stats.skipped {
            fps.start_render()?;
            fps.draw_on_window(None)?;
        }
        log::info!(
            "frame {frame}: {} recorded, {} drawn",
            stats.recorded,
            stats.drawn
        );
    }
    log::info!("Rendered {frames} frames in {:?}", started.elapsed());

    device
        .read_pixels(None)?
        .save(&output)
        .map_err(|e| CanvasError::Readback(format!("{output}: {e}")))?;
    log::info!("Wrote {output}");
    Ok(())
}
