use std::sync::Arc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::{Adapter, Device, Instance, Queue, Surface, SurfaceConfiguration};

use crate::error::{CanvasError, Result};

/// Instance, adapter, device and queue shared by every canvas on one GPU.
pub struct GpuContext {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
}

impl GpuContext {
    /// Open the default adapter without a surface, for off-screen rendering.
    pub fn new() -> Result<Self> {
        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        Self::with_instance(instance, None)
    }

    fn with_instance(instance: Instance, surface: Option<&Surface<'_>>) -> Result<Self> {
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: surface,
            force_fallback_adapter: false,
        }))
        .map_err(|e| CanvasError::Allocation(format!("no GPU adapter: {e}")))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Tessera Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| CanvasError::Allocation(format!("device request failed: {e}")))?;

        log::info!("Using GPU adapter: {}", adapter.get_info().name);

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Open an adapter able to present to `window` and configure a surface for it.
    pub fn for_window<W>(window: &W, width: u32, height: u32) -> Result<(Self, SurfaceState)>
    where
        W: HasWindowHandle + HasDisplayHandle,
    {
        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        // SAFETY: the caller keeps `window` alive for as long as the surface is used.
        let surface = unsafe {
            let target = wgpu::SurfaceTargetUnsafe::from_window(window)
                .map_err(|e| CanvasError::Allocation(format!("window handle: {e}")))?;
            instance.create_surface_unsafe(target)
        }
        .map_err(|e| CanvasError::Allocation(format!("surface creation failed: {e}")))?;

        let context = Self::with_instance(instance, Some(&surface))?;
        let state = context.configure_surface(surface, width, height)?;
        Ok((context, state))
    }

    fn configure_surface(
        &self,
        surface: Surface<'static>,
        width: u32,
        height: u32,
    ) -> Result<SurfaceState> {
        let caps = surface.get_capabilities(&self.adapter);

        // Prefer plain 8-bit formats so canvas textures can be blitted without conversion
        let format = caps
            .formats
            .iter()
            .find(|f| {
                matches!(
                    f,
                    wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Rgba8Unorm
                )
            })
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| CanvasError::Allocation("surface reports no formats".into()))?;

        log::info!("Using surface format: {:?}", format);

        let config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&self.device, &config);

        Ok(SurfaceState {
            surface,
            config,
            device: self.device.clone(),
        })
    }
}

pub struct SurfaceState {
    pub surface: Surface<'static>,
    pub config: SurfaceConfiguration,
    device: Arc<Device>,
}

impl SurfaceState {
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Acquire the next frame. A lost or outdated surface is reconfigured once and retried.
    pub fn acquire(&mut self) -> Result<wgpu::SurfaceTexture> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                self.surface
                    .get_current_texture()
                    .map_err(|e| CanvasError::Allocation(format!("surface frame: {e}")))
            }
            Err(e) => Err(CanvasError::Allocation(format!("surface frame: {e}"))),
        }
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }
}
