use std::path::Path;
use std::rc::Rc;

use image::RgbaImage;

use super::device::{GraphicsDevice, TargetId};
use crate::error::{CanvasError, Result};
use crate::geometry::Size;

/// Off-screen multisampled color + depth/stencil surface with a sampleable
/// resolve texture.
///
/// The device objects are released by [`dispose`](Self::dispose) or on drop,
/// whichever comes first.
pub struct RenderTarget {
    device: Rc<dyn GraphicsDevice>,
    id: Option<TargetId>,
    size: Size,
    samples: u32,
}

impl RenderTarget {
    pub fn create(device: Rc<dyn GraphicsDevice>, size: Size, samples: u32) -> Result<Self> {
        let id = allocate(device.as_ref(), size, samples)?;
        Ok(Self {
            device,
            id: Some(id),
            size,
            samples,
        })
    }

    pub fn id(&self) -> Result<TargetId> {
        self.id
            .ok_or(CanvasError::InvalidState("render target has been disposed"))
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn sample_count(&self) -> u32 {
        self.samples
    }

    pub fn is_disposed(&self) -> bool {
        self.id.is_none()
    }

    /// Resolve the multisampled color into the sampleable texture.
    pub fn resolve(&self) -> Result<()> {
        self.device.resolve(self.id()?)
    }

    pub fn dispose(&mut self) {
        if let Some(id) = self.id.take() {
            log::debug!(
                "Disposing {}x{} render target",
                self.size.width,
                self.size.height
            );
            self.device.delete_target(id);
        }
    }

    /// Replace the backing with a fresh allocation of `size`. Contents are lost.
    pub fn resize(&mut self, size: Size) -> Result<()> {
        self.dispose();
        self.id = Some(allocate(self.device.as_ref(), size, self.samples)?);
        self.size = size;
        Ok(())
    }

    /// Read the resolved texture back to the CPU. Call after [`resolve`](Self::resolve).
    pub fn read_pixels(&self) -> Result<RgbaImage> {
        self.device.read_pixels(Some(self.id()?))
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.read_pixels()?
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| CanvasError::Readback(format!("{}: {e}", path.display())))
    }
}

fn allocate(device: &dyn GraphicsDevice, size: Size, samples: u32) -> Result<TargetId> {
    let max = device.max_texture_dimension();
    if size.is_empty() || size.width > max || size.height > max {
        return Err(CanvasError::Allocation(format!(
            "render target {}x{} must be within 1..={max} on both axes",
            size.width, size.height
        )));
    }
    let id = device.create_target(size, samples)?;
    log::info!(
        "Created {}x{} render target with {samples} samples",
        size.width,
        size.height
    );
    Ok(id)
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::software::SoftwareDevice;

    #[test]
    fn test_create_reports_size() {
        let device = Rc::new(SoftwareDevice::new(4, 4));
        let target = RenderTarget::create(device.clone(), Size::new(37, 11), 4).unwrap();
        assert_eq!(target.size(), Size::new(37, 11));
        target.resolve().unwrap();
        let image = target.read_pixels().unwrap();
        assert_eq!(image.dimensions(), (37, 11));
    }

    #[test]
    fn test_zero_and_oversize_fail() {
        let device = Rc::new(SoftwareDevice::with_max_dimension(4, 4, 128));
        assert!(matches!(
            RenderTarget::create(device.clone(), Size::new(0, 5), 1),
            Err(CanvasError::Allocation(_))
        ));
        assert!(matches!(
            RenderTarget::create(device, Size::new(5, 129), 1),
            Err(CanvasError::Allocation(_))
        ));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let device = Rc::new(SoftwareDevice::new(4, 4));
        let mut target = RenderTarget::create(device.clone(), Size::new(8, 8), 1).unwrap();
        assert_eq!(device.target_count(), 1);
        target.dispose();
        target.dispose();
        assert!(target.is_disposed());
        assert_eq!(device.target_count(), 0);
        assert!(target.resolve().is_err());
        drop(target);
        assert_eq!(device.target_count(), 0);
    }

    #[test]
    fn test_resize_replaces_backing() {
        let device = Rc::new(SoftwareDevice::new(4, 4));
        let mut target = RenderTarget::create(device.clone(), Size::new(8, 8), 4).unwrap();
        let before = target.id().unwrap();
        target.resize(Size::new(16, 4)).unwrap();
        assert_ne!(target.id().unwrap(), before);
        assert_eq!(target.size(), Size::new(16, 4));
        assert_eq!(device.target_size(target.id().unwrap()), Some(Size::new(16, 4)));
        assert_eq!(device.target_count(), 1);
    }
}
