//! Off-screen scene with a grid of shapes, a clipped nested canvas and text.
//!
//! Renders one frame headlessly and writes it to a PNG:
//! ```bash
//! cargo run --example canvas_draw -- out.png            # CPU reference device
//! cargo run --example canvas_draw -- out.png --gpu      # wgpu
//! cargo run --example canvas_draw -- out.png --font assets/font.ttf
//! ```

use std::rc::Rc;

use tessera::prelude::*;
use tessera::renderer::{GpuContext, WgpuDevice};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;
const CELLS: u32 = 20;

fn draw_scene(ctx: &Rc<RenderContext>, font: &dyn FontFace, time: f32) -> Result<Canvas> {
    let mut root = Canvas::new(ctx, WIDTH, HEIGHT)?;
    root.begin()?;
    root.clear_to(Color::WHITE)?;

    let cell_w = WIDTH as f32 / CELLS as f32;
    let cell_h = HEIGHT as f32 / CELLS as f32;
    for i in 0..CELLS {
        for j in 0..CELLS {
            let (x, y) = (cell_w * i as f32, cell_h * j as f32);
            let corners = [
                Point::new(x, y),
                Point::new(x, y + cell_h),
                Point::new(x + cell_w, y + cell_h),
                Point::new(x + cell_w, y),
            ];
            for k in 0..4 {
                root.draw_line(corners[k], corners[(k + 1) % 4], 1.0, Color::BLACK)?;
            }

            let hue = (time * 0.15).fract() * 360.0;
            root.draw_rectangle(
                Rect::new(x + cell_w / 4.0, y + cell_h / 4.0, cell_w / 2.0, cell_h / 2.0),
                Color::from_hsv(hue, 0.75, 0.75),
            )?;

            let hue = (time * 0.30).fract() * 360.0;
            root.draw_circle(
                Point::new(x + cell_w / 2.0, y + cell_h / 2.0),
                10.0,
                Color::from_hsv(hue, 0.75, 0.75),
            )?;
        }
    }

    let mut nested = Canvas::new(ctx, 200, 200)?;
    nested.begin()?;
    nested.clear()?;
    nested.draw_rectangle(Rect::new(0.0, 0.0, 200.0, 200.0), Color::BLUE)?;
    nested.draw_circle(Point::new(100.0, 100.0), 100.0, Color::GREEN)?;
    nested.draw_line(
        Point::new(0.0, 0.0),
        Point::new(200.0, 200.0),
        2.0,
        Color::from_hex(0xF0FFFF),
    )?;
    nested.end()?;

    // The nested canvas is 200x200 but only 150x120 of it shows.
    root.draw_canvas(&nested, Rect::new(100.0, 100.0, 150.0, 120.0), true)?;
    nested.dispose();

    root.draw_text(Point::new(10.0, 10.0), "CANVAS 123 ASD ASDF", 40.0, Color::RED, font)?;
    root.draw_text(Point::new(10.0, 50.0), "NESTED + CLIPPED", 40.0, Color::RED, font)?;

    root.draw_rectangle(Rect::new(0.0, 520.0, 80.0, 80.0), Color::BLACK)?;
    root.draw_text(Point::new(12.0, 545.0), "60", 40.0, Color::GREEN, font)?;
    root.end()?;
    Ok(root)
}

fn device(gpu: bool) -> Result<Rc<dyn GraphicsDevice>> {
    if gpu {
        let context = GpuContext::new()?;
        Ok(Rc::new(WgpuDevice::new(&context)))
    } else {
        Ok(Rc::new(SoftwareDevice::new(WIDTH, HEIGHT)))
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let mut output = String::from("canvas_draw.png");
    let mut gpu = false;
    let mut font_path = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--gpu" => gpu = true,
            "--font" => font_path = args.next(),
            _ => output = arg,
        }
    }

    let ctx = RenderContext::new(device(gpu)?, CanvasConfig::default())?;
    let font = match font_path {
        Some(path) => ctx.font(&path)?,
        None => ctx.font(BlockFont::KEY)?,
    };

    let root = draw_scene(&ctx, font.as_ref(), 1.5)?;
    root.save_png(&output)?;
    log::info!("Wrote {output}");
    Ok(())
}
