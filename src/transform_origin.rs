use crate::geometry::{Point, Rect};

/// Position along one axis of a widget's layout box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    /// Left or top edge.
    Start,
    Center,
    /// Right or bottom edge.
    End,
    /// Fraction of the extent, `0.0` at the start edge and `1.0` at the end edge.
    Fraction(f32),
    /// Fixed offset in pixels from the start edge.
    Px(f32),
}

impl Anchor {
    fn resolve(self, start: f32, extent: f32) -> f32 {
        match self {
            Anchor::Start => start,
            Anchor::Center => start + extent / 2.0,
            Anchor::End => start + extent,
            Anchor::Fraction(f) => start + extent * f,
            Anchor::Px(px) => start + px,
        }
    }
}

/// Pivot point for a widget's local transform.
///
/// Rotations and scales set on a widget are applied around this point, so a
/// widget rotated about `CENTER` spins in place while one rotated about
/// `TOP_LEFT` swings around its corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformOrigin {
    pub x: Anchor,
    pub y: Anchor,
}

impl TransformOrigin {
    pub const CENTER: Self = Self::new(Anchor::Center, Anchor::Center);
    pub const TOP_LEFT: Self = Self::new(Anchor::Start, Anchor::Start);
    pub const TOP_RIGHT: Self = Self::new(Anchor::End, Anchor::Start);
    pub const BOTTOM_LEFT: Self = Self::new(Anchor::Start, Anchor::End);
    pub const BOTTOM_RIGHT: Self = Self::new(Anchor::End, Anchor::End);

    pub const fn new(x: Anchor, y: Anchor) -> Self {
        Self { x, y }
    }

    /// Origin at fractions of the widget size, `(0.5, 0.5)` being the center.
    pub const fn fraction(x: f32, y: f32) -> Self {
        Self::new(Anchor::Fraction(x), Anchor::Fraction(y))
    }

    /// Origin at a pixel offset from the widget's top-left corner.
    pub const fn px(x: f32, y: f32) -> Self {
        Self::new(Anchor::Px(x), Anchor::Px(y))
    }

    /// Resolve to a point in the same coordinate space as `bounds`.
    pub fn resolve(&self, bounds: Rect) -> Point {
        Point::new(
            self.x.resolve(bounds.x, bounds.width),
            self.y.resolve(bounds.y, bounds.height),
        )
    }
}

impl Default for TransformOrigin {
    fn default() -> Self {
        Self::CENTER
    }
}
