//! Choosing a backing resolution for canvases larger than the device allows.

use crate::error::{CanvasError, Result};
use crate::geometry::Size;

/// Backing texture size for a logical canvas size, and the uniform factor
/// it was scaled by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backing {
    pub size: Size,
    pub scale: f32,
}

impl Backing {
    /// Per-axis ratio of backing pixels to logical pixels after rounding.
    pub fn axis_scale(&self, logical: Size) -> (f32, f32) {
        (
            self.size.width as f32 / logical.width as f32,
            self.size.height as f32 / logical.height as f32,
        )
    }
}

/// `s = min(1, sqrt(max_area / area), max_dim / w, max_dim / h)`; the backing
/// is `round(w s) x round(h s)`, falling back to `floor` when rounding would
/// exceed `max_area`, and never smaller than one pixel.
pub fn backing_for(logical: Size, max_dimension: u32, max_area: u64) -> Result<Backing> {
    if logical.is_empty() {
        return Err(CanvasError::Allocation(format!(
            "canvas size {}x{} has a zero dimension",
            logical.width, logical.height
        )));
    }
    let w = logical.width as f64;
    let h = logical.height as f64;
    let max_dim = max_dimension.max(1) as f64;
    let max_area = max_area.max(1);

    let scale = 1.0f64
        .min((max_area as f64 / (w * h)).sqrt())
        .min(max_dim / w)
        .min(max_dim / h);

    let fit = |f: fn(f64) -> f64| {
        Size::new(
            (f(w * scale) as u32).clamp(1, max_dimension.max(1)),
            (f(h * scale) as u32).clamp(1, max_dimension.max(1)),
        )
    };
    let mut size = fit(f64::round);
    if size.area() > max_area {
        size = fit(f64::floor);
    }
    // Floating error can leave floor() one texel over on huge inputs.
    while size.area() > max_area && (size.width > 1 || size.height > 1) {
        if size.width >= size.height {
            size.width -= 1;
        } else {
            size.height -= 1;
        }
    }

    if scale < 1.0 {
        log::info!(
            "Canvas {}x{} exceeds device limits, backing at {}x{} (scale {scale:.4})",
            logical.width,
            logical.height,
            size.width,
            size.height
        );
    }

    Ok(Backing {
        size,
        scale: scale as f32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_canvas_is_unscaled() {
        let b = backing_for(Size::new(300, 200), 4096, 4096 * 4096).unwrap();
        assert_eq!(b.size, Size::new(300, 200));
        assert_eq!(b.scale, 1.0);
    }

    #[test]
    fn test_dimension_limit() {
        let b = backing_for(Size::new(10000, 100), 4096, 4096 * 4096).unwrap();
        assert!(b.scale <= 1.0);
        assert_eq!(b.size.width, 4096);
        assert_eq!(b.size.height, 41);
    }

    #[test]
    fn test_area_limit_holds() {
        for (w, h, area) in [(3000, 3000, 1_000_000), (1234, 987, 100_000), (7, 5, 3), (999, 1, 10)] {
            let b = backing_for(Size::new(w, h), 8192, area).unwrap();
            assert!(b.scale <= 1.0);
            assert!(b.size.area() <= area, "{w}x{h} -> {:?}", b.size);
            assert!(b.size.width >= 1 && b.size.height >= 1);
        }
    }

    #[test]
    fn test_zero_size_is_an_allocation_error() {
        assert!(matches!(
            backing_for(Size::new(0, 10), 4096, 100),
            Err(CanvasError::Allocation(_))
        ));
    }
}
