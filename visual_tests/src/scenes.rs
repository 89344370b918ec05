use std::rc::Rc;

use image::RgbaImage;
use tessera::prelude::*;

/// Names accepted by [`render_scene`].
pub const SCENES: &[&str] = &["shapes", "nested_clip", "text", "widgets"];

/// Draw a named scene on `device` and read it back.
pub fn render_scene(name: &str, device: Rc<dyn GraphicsDevice>) -> tessera::Result<RgbaImage> {
    let ctx = RenderContext::with_loader(device, CanvasConfig::default(), Rc::new(MemoryLoader::new()))?;
    match name {
        "shapes" => shapes(&ctx),
        "nested_clip" => nested_clip(&ctx),
        "text" => text(&ctx),
        "widgets" => widgets(&ctx),
        _ => Err(CanvasError::MissingResource(format!("scene `{name}`"))),
    }
}

fn record(
    ctx: &Rc<RenderContext>,
    size: Size,
    draw: impl FnOnce(&mut Canvas) -> tessera::Result<()>,
) -> tessera::Result<Canvas> {
    let mut canvas = Canvas::new(ctx, size.width, size.height)?;
    canvas.begin()?;
    let drawn = draw(&mut canvas);
    canvas.end()?;
    drawn?;
    Ok(canvas)
}

fn shapes(ctx: &Rc<RenderContext>) -> tessera::Result<RgbaImage> {
    record(ctx, Size::new(160, 120), |c| {
        c.clear_to(Color::WHITE)?;
        c.draw_rectangle(Rect::new(10.0, 10.0, 60.0, 40.0), Color::from_hex(0xFFDC01))?;
        c.draw_circle(Point::new(110.0, 40.0), 30.0, Color::from_hex(0x6597FF))?;
        c.draw_line(Point::new(0.0, 120.0), Point::new(160.0, 60.0), 5.0, Color::from_hex(0x0B78D3))?;
        c.draw_rectangle(Rect::new(40.0, 70.0, 50.0, 30.0), Color::RED.with_alpha(0.5))
    })?
    .read_pixels()
}

fn nested_clip(ctx: &Rc<RenderContext>) -> tessera::Result<RgbaImage> {
    let inner = record(ctx, Size::new(100, 100), |c| {
        c.clear_to(Color::BLUE)?;
        c.draw_circle(Point::new(50.0, 50.0), 50.0, Color::GREEN)
    })?;
    record(ctx, Size::new(160, 120), |c| {
        c.clear_to(Color::WHITE)?;
        c.draw_canvas(&inner, Rect::new(20.0, 10.0, 60.0, 50.0), true)?;
        c.draw_canvas(&inner, Rect::new(90.0, 30.0, 60.0, 50.0), false)
    })?
    .read_pixels()
}

fn text(ctx: &Rc<RenderContext>) -> tessera::Result<RgbaImage> {
    record(ctx, Size::new(200, 80), |c| {
        c.clear_to(Color::WHITE)?;
        c.draw_text(Point::new(8.0, 8.0), "TESSERA 42", 24.0, Color::BLACK, &BlockFont)?;
        c.draw_text(Point::new(8.0, 40.0), "A+B=C", 32.0, Color::RED, &BlockFont)
    })?
    .read_pixels()
}

struct Checker;

impl Renderable for Checker {
    fn on_render(&mut self, canvas: &mut Canvas) -> tessera::Result<()> {
        let size = canvas.size();
        let (w, h) = (size.width as f32 / 2.0, size.height as f32 / 2.0);
        canvas.draw_rectangle(Rect::new(0.0, 0.0, w, h), Color::RED)?;
        canvas.draw_rectangle(Rect::new(w, h, w, h), Color::BLUE)
    }
}

fn widgets(ctx: &Rc<RenderContext>) -> tessera::Result<RgbaImage> {
    let mut a = Widget::new(ctx, Checker).with_bounds(Rect::new(20.0, 20.0, 50.0, 50.0));
    a.set_transform(Transform::rotate_degrees(30.0));
    let mut b = Widget::new(ctx, Checker).with_bounds(Rect::new(100.0, 30.0, 40.0, 60.0));
    b.set_origin(TransformOrigin::TOP_LEFT);
    b.set_transform(Transform::scale_xy(0.5, 1.2));

    a.start_render()?;
    b.start_render()?;
    record(ctx, Size::new(160, 120), |c| {
        c.clear_to(Color::WHITE)?;
        a.draw_on_window(None)?;
        b.draw_on_window(None)
    })?
    .read_pixels()
}
