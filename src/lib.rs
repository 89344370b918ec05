pub mod assets;
pub mod canvas;
pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod text;
pub mod transform;
pub mod transform_origin;
pub mod widgets;

// Device-level access for hosts that drive rendering themselves
pub mod renderer;

pub use error::{CanvasError, Result};

pub mod prelude {
    pub use crate::assets::{AssetLoader, FsLoader, MemoryLoader};
    pub use crate::canvas::{Canvas, RenderContext};
    pub use crate::color::Color;
    pub use crate::config::{CanvasConfig, FillRule, Projection};
    pub use crate::error::{CanvasError, Result};
    pub use crate::geometry::{PixelRect, Point, Rect, Size};
    pub use crate::renderer::{GraphicsDevice, SoftwareDevice};
    pub use crate::text::{BlockFont, FontFace, TtfFont};
    pub use crate::transform::Transform;
    pub use crate::transform_origin::{Anchor, TransformOrigin};
    pub use crate::widgets::{
        Compositor, Control, FpsLabel, Renderable, UniformGrid, Widget, WidgetHost,
    };
}
