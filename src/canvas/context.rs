use std::cell::RefCell;
use std::rc::Rc;

use crate::assets::{AssetLoader, FsLoader};
use crate::config::CanvasConfig;
use crate::error::Result;
use crate::renderer::{GraphicsDevice, ShaderSet};
use crate::text::{BlockFont, FontFace, GlyphBatch, TextTessellator};

/// Everything canvases on one device share: the device, compiled programs,
/// the text tessellator with its caches, the asset loader and configuration.
pub struct RenderContext {
    device: Rc<dyn GraphicsDevice>,
    shaders: ShaderSet,
    text: RefCell<TextTessellator>,
    loader: Rc<dyn AssetLoader>,
    config: CanvasConfig,
}

impl RenderContext {
    /// Compile the built-in programs and load assets relative to the working directory.
    pub fn new(device: Rc<dyn GraphicsDevice>, config: CanvasConfig) -> Result<Rc<Self>> {
        Self::with_loader(device, config, Rc::new(FsLoader::default()))
    }

    pub fn with_loader(
        device: Rc<dyn GraphicsDevice>,
        config: CanvasConfig,
        loader: Rc<dyn AssetLoader>,
    ) -> Result<Rc<Self>> {
        let shaders = ShaderSet::new(device.clone())?;
        Ok(Self::from_parts(device, shaders, config, loader))
    }

    /// Assemble a context from an already compiled shader set, e.g. one loaded
    /// with [`ShaderSet::load`].
    pub fn from_parts(
        device: Rc<dyn GraphicsDevice>,
        shaders: ShaderSet,
        config: CanvasConfig,
        loader: Rc<dyn AssetLoader>,
    ) -> Rc<Self> {
        let mut text = TextTessellator::new(config.flatten_depth, config.fill_rule);
        text.register_font(Rc::new(BlockFont));
        Rc::new(Self {
            device,
            shaders,
            text: RefCell::new(text),
            loader,
            config,
        })
    }

    pub fn device(&self) -> &Rc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn shaders(&self) -> &ShaderSet {
        &self.shaders
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn loader(&self) -> &Rc<dyn AssetLoader> {
        &self.loader
    }

    /// Largest backing texel count a canvas may allocate.
    pub fn max_texture_area(&self) -> u64 {
        let dim = self.device.max_texture_dimension() as u64;
        let device_max = dim * dim;
        self.config
            .max_texture_area
            .map_or(device_max, |area| area.min(device_max))
    }

    /// Resolve a font by asset path, parsing it on first use.
    pub fn font(&self, path: &str) -> Result<Rc<dyn FontFace>> {
        self.text.borrow_mut().font(path, self.loader.as_ref())
    }

    pub fn register_font(&self, font: Rc<dyn FontFace>) {
        self.text.borrow_mut().register_font(font);
    }

    pub fn tessellate_text(
        &self,
        font: &dyn FontFace,
        text: &str,
        pixel_size: f32,
    ) -> Result<Vec<GlyphBatch>> {
        self.text.borrow_mut().tessellate(font, text, pixel_size)
    }

    pub fn measure_text(&self, font: &dyn FontFace, text: &str, pixel_size: f32) -> f32 {
        self.text.borrow().measure(font, text, pixel_size)
    }

    /// Number of outlines currently cached.
    pub fn cached_glyphs(&self) -> usize {
        self.text.borrow().glyph_cache().len()
    }

    /// Drop every cached font and outline. The built-in block font stays available.
    pub fn clear_text_caches(&self) {
        let mut text = self.text.borrow_mut();
        text.clear_caches();
        text.register_font(Rc::new(BlockFont));
    }
}
