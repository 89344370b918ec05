use std::rc::Rc;

use tessera::prelude::*;

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

/// Left half red, right half blue.
struct Split;

impl Renderable for Split {
    fn on_render(&mut self, canvas: &mut Canvas) -> Result<()> {
        let size = canvas.size();
        let half = size.width as f32 / 2.0;
        canvas.draw_rectangle(Rect::new(0.0, 0.0, half, size.height as f32), Color::RED)?;
        canvas.draw_rectangle(
            Rect::new(half, 0.0, half, size.height as f32),
            Color::BLUE,
        )
    }
}

fn setup(projection: Projection) -> (Rc<SoftwareDevice>, Rc<RenderContext>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let device = Rc::new(SoftwareDevice::new(40, 40));
    let config = CanvasConfig::default()
        .sample_count(1)
        .projection(projection);
    let ctx = RenderContext::with_loader(device.clone(), config, Rc::new(MemoryLoader::new()))
        .unwrap();
    (device, ctx)
}

fn blit(device: &SoftwareDevice, widget: &mut Widget<Split>) -> image::RgbaImage {
    widget.start_render().unwrap();
    device.clear(Color::BLACK);
    widget.draw_on_window(None).unwrap();
    device.read_pixels(None).unwrap()
}

#[test]
fn test_half_turn_about_center_swaps_halves() {
    for projection in [Projection::Orthographic, Projection::Perspective] {
        let (device, ctx) = setup(projection);
        let mut widget = Widget::new(&ctx, Split).with_bounds(Rect::new(10.0, 10.0, 20.0, 10.0));

        let image = blit(&device, &mut widget);
        assert_eq!(image.get_pixel(12, 15).0, RED, "{projection:?}");
        assert_eq!(image.get_pixel(27, 15).0, BLUE, "{projection:?}");

        widget.set_transform(Transform::rotate_degrees(180.0));
        let image = blit(&device, &mut widget);
        assert_eq!(image.get_pixel(12, 15).0, BLUE, "{projection:?}");
        assert_eq!(image.get_pixel(27, 15).0, RED, "{projection:?}");
        assert_eq!(image.get_pixel(5, 5).0, BLACK, "{projection:?}");
    }
}

#[test]
fn test_quarter_turn_about_top_left_swings_out() {
    let (device, ctx) = setup(Projection::Orthographic);
    let mut widget = Widget::new(&ctx, Split).with_bounds(Rect::new(20.0, 10.0, 10.0, 10.0));
    widget.set_origin(TransformOrigin::TOP_LEFT);
    // y is down, so a positive angle turns clockwise on screen.
    widget.set_transform(Transform::rotate_degrees(90.0));

    let image = blit(&device, &mut widget);
    // The box now spans x 10..20 and y 10..20, with the red half on top.
    assert_eq!(image.get_pixel(15, 12).0, RED);
    assert_eq!(image.get_pixel(15, 17).0, BLUE);
    assert_eq!(image.get_pixel(25, 15).0, BLACK);
}

#[test]
fn test_scale_about_center_grows_both_ways() {
    let (device, ctx) = setup(Projection::Orthographic);
    let mut widget = Widget::new(&ctx, Split).with_bounds(Rect::new(15.0, 15.0, 10.0, 10.0));
    widget.set_transform(Transform::scale(2.0));

    let image = blit(&device, &mut widget);
    assert_eq!(image.get_pixel(11, 20).0, RED);
    assert_eq!(image.get_pixel(28, 20).0, BLUE);
    assert_eq!(image.get_pixel(8, 20).0, BLACK);
    assert_eq!(image.get_pixel(31, 20).0, BLACK);
}

struct Window {
    size: Size,
}

impl WidgetHost for Window {
    fn viewport_size(&self) -> Size {
        self.size
    }

    fn take_redraw_request(&mut self) -> bool {
        false
    }
}

#[test]
fn test_grid_arranges_and_compositor_paints() {
    let (device, ctx) = setup(Projection::Orthographic);
    let mut compositor = Compositor::new(&ctx).clip_to_bounds(true);
    for _ in 0..4 {
        compositor.push(Box::new(Widget::new(&ctx, Split)));
    }
    compositor.arrange(&UniformGrid::new(2, 2), Size::new(40, 40));
    assert_eq!(compositor.controls()[3].bounds(), Rect::new(22.0, 22.0, 16.0, 16.0));

    let mut window = Window {
        size: Size::new(40, 40),
    };
    let stats = compositor.render_frame(&mut window).unwrap();
    assert_eq!(stats.recorded, 4);

    let image = device.read_pixels(None).unwrap();
    assert_eq!(image.get_pixel(3, 3).0, RED);
    assert_eq!(image.get_pixel(16, 3).0, BLUE);
    assert_eq!(image.get_pixel(20, 3).0, BLACK);
    assert_eq!(image.get_pixel(24, 24).0, RED);

    assert!(compositor.render_frame(&mut window).unwrap().skipped);
    if let Some(control) = compositor.control_mut(0) {
        control.invalidate();
    }
    assert_eq!(compositor.render_frame(&mut window).unwrap().recorded, 1);
}
