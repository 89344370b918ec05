//! [`GraphicsDevice`] backed by wgpu.
//!
//! Each render target is an MSAA color texture plus a single-sample resolve
//! texture (one texture when `samples == 1`). Draws are recorded and submitted
//! one render pass at a time with `LoadOp::Load`, so ordering on the queue
//! matches call order. Pipelines are built lazily per (program, topology,
//! sample count, format) and cached.
//!
//! The default target is whatever view the host installs with
//! [`WgpuDevice::set_default_target`], usually the current swapchain frame.
//! Depth/stencil is not attached: nothing canvases draw reads depth.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;
use wgpu::util::DeviceExt;
use wgpu::{
    BindGroupLayout, Device, PrimitiveTopology, Queue, RenderPipeline, Sampler, ShaderModule,
    TextureFormat, TextureView,
};

use super::device::{
    DrawCall, GraphicsDevice, ProgramId, ProgramKind, TargetId, Topology, Vertices,
};
use super::gpu_context::GpuContext;
use super::vertex::{SolidVertex, TexturedVertex};
use crate::color::Color;
use crate::error::{CanvasError, Result};
use crate::geometry::{PixelRect, Size};

/// Color format of every off-screen render target.
pub const TARGET_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

struct GpuProgram {
    kind: ProgramKind,
    module: ShaderModule,
}

struct GpuTarget {
    size: Size,
    samples: u32,
    color: wgpu::Texture,
    color_view: TextureView,
    /// Present only when `samples > 1`.
    resolve: Option<(wgpu::Texture, TextureView)>,
}

impl GpuTarget {
    fn sample_texture(&self) -> &wgpu::Texture {
        self.resolve.as_ref().map(|(t, _)| t).unwrap_or(&self.color)
    }

    fn sample_view(&self) -> &TextureView {
        self.resolve.as_ref().map(|(_, v)| v).unwrap_or(&self.color_view)
    }
}

struct DefaultTarget {
    view: TextureView,
    size: Size,
    format: TextureFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    topology: PrimitiveTopology,
    samples: u32,
    format: TextureFormat,
}

#[derive(Default)]
struct WgpuState {
    programs: HashMap<ProgramId, GpuProgram>,
    pipelines: HashMap<PipelineKey, RenderPipeline>,
    targets: HashMap<TargetId, GpuTarget>,
    default_target: Option<DefaultTarget>,
    next_id: u32,
    bound: Option<TargetId>,
    viewport: PixelRect,
    scissor: Option<PixelRect>,
}

/// The attachment a pass renders into.
struct Attachment<'a> {
    view: &'a TextureView,
    size: Size,
    samples: u32,
    format: TextureFormat,
}

impl WgpuState {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn attachment(&self) -> Option<Attachment<'_>> {
        match self.bound {
            Some(id) => self.targets.get(&id).map(|t| Attachment {
                view: &t.color_view,
                size: t.size,
                samples: t.samples,
                format: TARGET_FORMAT,
            }),
            None => self.default_target.as_ref().map(|d| Attachment {
                view: &d.view,
                size: d.size,
                samples: 1,
                format: d.format,
            }),
        }
    }
}

pub struct WgpuDevice {
    device: Arc<Device>,
    queue: Arc<Queue>,
    max_dimension: u32,
    supported_samples: Vec<u32>,
    uniform_layout: BindGroupLayout,
    texture_layout: BindGroupLayout,
    sampler: Sampler,
    state: RefCell<WgpuState>,
}

impl WgpuDevice {
    pub fn new(context: &GpuContext) -> Self {
        let device = context.device.clone();
        let flags = context
            .adapter
            .get_texture_format_features(TARGET_FORMAT)
            .flags;
        let supported_samples = [1, 2, 4, 8, 16]
            .into_iter()
            .filter(|&n| flags.sample_count_supported(n))
            .collect();

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Canvas Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Canvas Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Canvas Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        Self {
            max_dimension: device.limits().max_texture_dimension_2d,
            device,
            queue: context.queue.clone(),
            supported_samples,
            uniform_layout,
            texture_layout,
            sampler,
            state: RefCell::new(WgpuState::default()),
        }
    }

    /// Install the view drawn to when no render target is bound, e.g. the
    /// current swapchain frame. Resets the viewport when the default target is bound.
    pub fn set_default_target(&self, view: TextureView, size: Size, format: TextureFormat) {
        let mut state = self.state.borrow_mut();
        state.default_target = Some(DefaultTarget { view, size, format });
        if state.bound.is_none() {
            state.viewport = PixelRect::from_size(size);
        }
    }

    /// Drop the default view, typically right before presenting the frame it belongs to.
    pub fn clear_default_target(&self) {
        self.state.borrow_mut().default_target = None;
    }

    fn pipeline(&self, key: PipelineKey, program: &GpuProgram) -> RenderPipeline {
        let textured = program.kind.is_textured();
        let bind_group_layouts: &[&BindGroupLayout] = if textured {
            &[&self.uniform_layout, &self.texture_layout]
        } else {
            &[&self.uniform_layout]
        };
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Canvas Pipeline Layout"),
                bind_group_layouts,
                immediate_size: 0,
            });

        let buffers = if textured {
            [TexturedVertex::desc()]
        } else {
            [SolidVertex::desc()]
        };

        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(program.kind.name()),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.module,
                    entry_point: Some("vs_main"),
                    buffers: &buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: key.format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: key.topology,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: key.samples,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview_mask: None,
                cache: None,
            })
    }

    fn create_texture(&self, size: Size, samples: u32, usage: wgpu::TextureUsages) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Canvas Target"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: samples,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage,
            view_formats: &[],
        })
    }

    /// Vertex bytes for a draw, with fans expanded to lists.
    fn vertex_bytes(call: &DrawCall<'_>) -> (Vec<u8>, PrimitiveTopology) {
        fn expand<T: bytemuck::Pod>(v: &[T], topology: Topology) -> (Vec<u8>, PrimitiveTopology) {
            match topology {
                Topology::TriangleList => (
                    bytemuck::cast_slice(v).to_vec(),
                    PrimitiveTopology::TriangleList,
                ),
                Topology::TriangleStrip => (
                    bytemuck::cast_slice(v).to_vec(),
                    PrimitiveTopology::TriangleStrip,
                ),
                Topology::TriangleFan => {
                    let list: Vec<T> = topology
                        .triangles(v.len())
                        .into_iter()
                        .flat_map(|[a, b, c]| [v[a], v[b], v[c]])
                        .collect();
                    (
                        bytemuck::cast_slice(&list).to_vec(),
                        PrimitiveTopology::TriangleList,
                    )
                }
            }
        }

        match call.vertices {
            Vertices::Solid(v) => expand(v, call.topology),
            Vertices::Textured(v) => expand(v, call.topology),
        }
    }

    fn submit_pass(
        &self,
        attachment: &Attachment<'_>,
        resolve_target: Option<&TextureView>,
        load: wgpu::LoadOp<wgpu::Color>,
        record: impl FnOnce(&mut wgpu::RenderPass<'_>),
    ) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Canvas Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Canvas Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attachment.view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            record(&mut pass);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

/// Pixels a draw may touch: the viewport and scissor cut to the attachment.
/// The viewport is passed to the pass unchanged; only the scissor shrinks.
fn draw_region(viewport: PixelRect, scissor: Option<PixelRect>, size: Size) -> Option<PixelRect> {
    let visible = viewport.intersection(&PixelRect::from_size(size))?;
    match scissor {
        Some(s) => visible.intersection(&s),
        None => Some(visible),
    }
}

impl GraphicsDevice for WgpuDevice {
    fn max_texture_dimension(&self) -> u32 {
        self.max_dimension
    }

    fn create_program(&self, kind: ProgramKind, source: &str) -> Result<ProgramId> {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(kind.name()),
                source: wgpu::ShaderSource::Wgsl(source.to_owned().into()),
            });
        let mut state = self.state.borrow_mut();
        let id = ProgramId(state.next_id());
        state.programs.insert(id, GpuProgram { kind, module });
        Ok(id)
    }

    fn delete_program(&self, program: ProgramId) {
        let mut state = self.state.borrow_mut();
        state.programs.remove(&program);
        state.pipelines.retain(|key, _| key.program != program);
    }

    fn create_target(&self, size: Size, samples: u32) -> Result<TargetId> {
        if size.is_empty() || size.width > self.max_dimension || size.height > self.max_dimension
        {
            return Err(CanvasError::Allocation(format!(
                "render target {}x{} outside 1..={}",
                size.width, size.height, self.max_dimension
            )));
        }
        if !self.supported_samples.contains(&samples) {
            return Err(CanvasError::Allocation(format!(
                "sample count {samples} not supported (have {:?})",
                self.supported_samples
            )));
        }

        let sampled = wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC;
        let (color, resolve) = if samples > 1 {
            let msaa = self.create_texture(size, samples, wgpu::TextureUsages::RENDER_ATTACHMENT);
            let resolve = self.create_texture(size, 1, sampled);
            let view = resolve.create_view(&wgpu::TextureViewDescriptor::default());
            (msaa, Some((resolve, view)))
        } else {
            (self.create_texture(size, 1, sampled), None)
        };
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());

        let mut state = self.state.borrow_mut();
        let id = TargetId(state.next_id());
        state.targets.insert(
            id,
            GpuTarget {
                size,
                samples,
                color,
                color_view,
                resolve,
            },
        );
        Ok(id)
    }

    fn delete_target(&self, target: TargetId) {
        let mut state = self.state.borrow_mut();
        if let Some(t) = state.targets.remove(&target) {
            t.color.destroy();
            if let Some((resolve, _)) = t.resolve {
                resolve.destroy();
            }
        }
        if state.bound == Some(target) {
            state.bound = None;
        }
    }

    fn target_size(&self, target: TargetId) -> Option<Size> {
        self.state.borrow().targets.get(&target).map(|t| t.size)
    }

    fn bind_target(&self, target: Option<TargetId>) {
        self.state.borrow_mut().bound = target;
    }

    fn bound_target(&self) -> Option<TargetId> {
        self.state.borrow().bound
    }

    fn bound_size(&self) -> Size {
        self.state
            .borrow()
            .attachment()
            .map(|a| a.size)
            .unwrap_or_default()
    }

    fn set_viewport(&self, viewport: PixelRect) {
        self.state.borrow_mut().viewport = viewport;
    }

    fn viewport(&self) -> PixelRect {
        self.state.borrow().viewport
    }

    fn set_scissor(&self, scissor: Option<PixelRect>) {
        self.state.borrow_mut().scissor = scissor;
    }

    fn scissor(&self) -> Option<PixelRect> {
        self.state.borrow().scissor
    }

    fn clear(&self, color: Color) {
        let state = self.state.borrow();
        match state.attachment() {
            Some(attachment) => {
                self.submit_pass(&attachment, None, wgpu::LoadOp::Clear(color.into()), |_| {})
            }
            None => log::warn!("clear with no default target installed"),
        }
    }

    fn draw(&self, call: &DrawCall<'_>) -> Result<()> {
        if call.vertices.is_empty() {
            return Ok(());
        }
        let mut state = self.state.borrow_mut();
        let kind = state
            .programs
            .get(&call.program)
            .map(|p| p.kind)
            .ok_or(CanvasError::InvalidState("draw with a deleted program"))?;
        let (samples, format, size) = {
            let a = state
                .attachment()
                .ok_or(CanvasError::InvalidState("draw with no default target installed"))?;
            (a.samples, a.format, a.size)
        };

        let (bytes, topology) = Self::vertex_bytes(call);
        let key = PipelineKey {
            program: call.program,
            topology,
            samples,
            format,
        };
        if !state.pipelines.contains_key(&key) {
            let pipeline = match state.programs.get(&call.program) {
                Some(program) => self.pipeline(key, program),
                None => return Err(CanvasError::InvalidState("draw with a deleted program")),
            };
            state.pipelines.insert(key, pipeline);
        }

        let texture_group = if kind.is_textured() {
            let source = call
                .texture
                .and_then(|id| state.targets.get(&id))
                .ok_or(CanvasError::InvalidState("textured draw without a live texture"))?;
            Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Canvas Texture Bind Group"),
                layout: &self.texture_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(source.sample_view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            }))
        } else {
            None
        };

        let viewport = state.viewport;
        let Some(region) = draw_region(viewport, state.scissor, size) else {
            return Ok(());
        };

        let uniforms = call.uniforms.to_gpu();
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Canvas Uniform Buffer"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let uniform_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Canvas Uniform Bind Group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Canvas Vertex Buffer"),
                contents: &bytes,
                usage: wgpu::BufferUsages::VERTEX,
            });
        let stride = if kind.is_textured() {
            std::mem::size_of::<TexturedVertex>()
        } else {
            std::mem::size_of::<SolidVertex>()
        };
        let vertex_count = (bytes.len() / stride) as u32;

        let state = &*state;
        let attachment = state
            .attachment()
            .ok_or(CanvasError::InvalidState("draw with no default target installed"))?;
        let pipeline = state
            .pipelines
            .get(&key)
            .ok_or(CanvasError::InvalidState("pipeline cache miss"))?;

        self.submit_pass(&attachment, None, wgpu::LoadOp::Load, |pass| {
            pass.set_viewport(
                viewport.x as f32,
                viewport.y as f32,
                viewport.width as f32,
                viewport.height as f32,
                0.0,
                1.0,
            );
            pass.set_scissor_rect(region.x, region.y, region.width, region.height);
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &uniform_group, &[]);
            if let Some(group) = &texture_group {
                pass.set_bind_group(1, group, &[]);
            }
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.draw(0..vertex_count, 0..1);
        });
        Ok(())
    }

    fn resolve(&self, target: TargetId) -> Result<()> {
        let state = self.state.borrow();
        let t = state
            .targets
            .get(&target)
            .ok_or(CanvasError::InvalidState("resolve of a deleted target"))?;
        if let Some((_, resolve_view)) = &t.resolve {
            let attachment = Attachment {
                view: &t.color_view,
                size: t.size,
                samples: t.samples,
                format: TARGET_FORMAT,
            };
            self.submit_pass(&attachment, Some(resolve_view), wgpu::LoadOp::Load, |_| {});
        }
        Ok(())
    }

    fn read_pixels(&self, target: Option<TargetId>) -> Result<RgbaImage> {
        let state = self.state.borrow();
        let id = target.ok_or_else(|| {
            CanvasError::Readback("the default surface cannot be read back".into())
        })?;
        let t = state
            .targets
            .get(&id)
            .ok_or_else(|| CanvasError::Readback(format!("unknown target {id:?}")))?;

        let Size { width, height } = t.size;
        let row_bytes = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = row_bytes.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Canvas Readback Buffer"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Canvas Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: t.sample_texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            drop(sender.send(res));
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| CanvasError::Readback(e.to_string()))?;
        receiver
            .recv()
            .map_err(|e| CanvasError::Readback(e.to_string()))?
            .map_err(|e| CanvasError::Readback(e.to_string()))?;

        let mapped = slice.get_mapped_range();
        let mut out = Vec::with_capacity((row_bytes * height) as usize);
        for row in 0..height as usize {
            let start = row * padded_bytes_per_row as usize;
            out.extend_from_slice(&mapped[start..start + row_bytes as usize]);
        }
        drop(mapped);
        buffer.unmap();

        RgbaImage::from_raw(width, height, out)
            .ok_or_else(|| CanvasError::Readback("pixel buffer size mismatch".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_viewport_is_clipped_not_rescaled() {
        let size = Size::new(100, 80);
        let viewport = PixelRect::new(60, 50, 100, 80);
        assert_eq!(
            draw_region(viewport, None, size),
            Some(PixelRect::new(60, 50, 40, 30))
        );
    }

    #[test]
    fn test_scissor_is_intersected_with_visible_viewport() {
        let size = Size::new(100, 80);
        let viewport = PixelRect::new(0, 0, 100, 80);
        assert_eq!(
            draw_region(viewport, Some(PixelRect::new(90, 70, 50, 50)), size),
            Some(PixelRect::new(90, 70, 10, 10))
        );
        assert_eq!(
            draw_region(viewport, Some(PixelRect::new(100, 0, 10, 10)), size),
            None
        );
        assert_eq!(draw_region(PixelRect::new(120, 0, 10, 10), None, size), None);
    }
}
