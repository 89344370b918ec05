//! Layout box plus local transform to clip space.

use crate::color::Color;
use crate::config::Projection;
use crate::geometry::{Rect, Size};
use crate::renderer::Uniforms;
use crate::transform::Transform;
use crate::transform_origin::TransformOrigin;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrices {
    model: Transform,
    view: Transform,
    projection: Transform,
}

/// Per-widget geometry and the matrices derived from it.
///
/// The matrices are rebuilt lazily, only after one of the inputs or the parent
/// viewport size changed. The emitted quad sits at `(left, top, width, height)`
/// in parent pixels; `model` pivots the local transform around the resolved
/// origin and moves the parent center to `(0, 0)`, `view` looks down the z axis
/// from `max(W, H)` away and `projection` maps the parent viewport onto clip space.
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    left: f32,
    top: f32,
    size: Size,
    transform: Transform,
    origin: TransformOrigin,
    projection: Projection,
    parent: Size,
    cached: Option<Matrices>,
}

impl TransformPipeline {
    pub fn new(projection: Projection) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            size: Size::default(),
            transform: Transform::IDENTITY,
            origin: TransformOrigin::default(),
            projection,
            parent: Size::default(),
            cached: None,
        }
    }

    pub fn left(&self) -> f32 {
        self.left
    }

    pub fn top(&self) -> f32 {
        self.top
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn origin(&self) -> TransformOrigin {
        self.origin
    }

    /// Untransformed layout box in parent pixels.
    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.left,
            self.top,
            self.size.width as f32,
            self.size.height as f32,
        )
    }

    /// Returns whether the position changed.
    pub fn set_position(&mut self, left: f32, top: f32) -> bool {
        if self.left == left && self.top == top {
            return false;
        }
        self.left = left;
        self.top = top;
        self.cached = None;
        true
    }

    /// Returns whether the size changed.
    pub fn set_size(&mut self, size: Size) -> bool {
        if self.size == size {
            return false;
        }
        self.size = size;
        self.cached = None;
        true
    }

    /// Returns whether the transform changed.
    pub fn set_transform(&mut self, transform: Transform) -> bool {
        if self.transform == transform {
            return false;
        }
        self.transform = transform;
        self.cached = None;
        true
    }

    /// Returns whether the origin changed.
    pub fn set_origin(&mut self, origin: TransformOrigin) -> bool {
        if self.origin == origin {
            return false;
        }
        self.origin = origin;
        self.cached = None;
        true
    }

    pub fn set_projection(&mut self, projection: Projection) {
        if self.projection != projection {
            self.projection = projection;
            self.cached = None;
        }
    }

    /// Whether the matrices have to be rebuilt for a parent of `parent` pixels.
    pub fn is_stale(&self, parent: Size) -> bool {
        self.cached.is_none() || self.parent != parent
    }

    pub fn model(&mut self, parent: Size) -> Transform {
        self.matrices(parent).model
    }

    pub fn view(&mut self, parent: Size) -> Transform {
        self.matrices(parent).view
    }

    pub fn projection(&mut self, parent: Size) -> Transform {
        self.matrices(parent).projection
    }

    /// Uniforms for blitting the widget's canvas, tinted by `color`.
    pub fn uniforms(&mut self, parent: Size, color: Color) -> Uniforms {
        let m = self.matrices(parent);
        Uniforms::new(m.projection, color).with_model_view(m.view.then(&m.model))
    }

    fn matrices(&mut self, parent: Size) -> Matrices {
        if self.parent != parent {
            self.parent = parent;
            self.cached = None;
        }
        if let Some(m) = self.cached {
            return m;
        }
        let m = self.derive();
        self.cached = Some(m);
        m
    }

    fn derive(&self) -> Matrices {
        let w = self.parent.width.max(1) as f32;
        let h = self.parent.height.max(1) as f32;
        let (half_w, half_h) = (w / 2.0, h / 2.0);

        let o = self.origin.resolve(self.bounds());
        let model = Transform::translate(-half_w, -half_h)
            .then(&Transform::translate(o.x, o.y))
            .then(&self.transform)
            .then(&Transform::translate(-o.x, -o.y));

        let distance = w.max(h);
        let view = Transform::look_at([0.0, 0.0, distance], [0.0; 3], [0.0, 1.0, 0.0]);

        let near = distance / 10.0;
        let far = distance * 10.0;
        // y grows downwards in layout space, so bottom is +h/2.
        let projection = match self.projection {
            Projection::Orthographic => {
                Transform::orthographic_off_center(-half_w, half_w, half_h, -half_h, near, far)
            }
            Projection::Perspective => {
                let k = near / distance;
                Transform::perspective_off_center(
                    -half_w * k,
                    half_w * k,
                    half_h * k,
                    -half_h * k,
                    near,
                    far,
                )
            }
        };

        log::trace!(
            "Derived widget matrices for {}x{} at ({}, {}) in {}x{}",
            self.size.width,
            self.size.height,
            self.left,
            self.top,
            self.parent.width,
            self.parent.height
        );

        Matrices {
            model,
            view,
            projection,
        }
    }
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new(Projection::default())
    }
}
