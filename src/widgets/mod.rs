//! Widgets: retained canvases placed and transformed on a parent surface.
//!
//! A [`Widget`] owns a [`Canvas`](crate::canvas::Canvas) and a
//! [`TransformPipeline`]. Its content implements [`Renderable`] and is recorded
//! only when the widget is dirty; every frame the recorded texture is blitted
//! through the widget's model, view and projection matrices.

mod compositor;
mod controls;
mod grid;
mod pipeline;
mod widget;

pub use compositor::{Compositor, FrameStats, WidgetHost};
pub use controls::FpsLabel;
pub use grid::UniformGrid;
pub use pipeline::TransformPipeline;
pub use widget::{Control, DirtyFlags, Renderable, Widget};
