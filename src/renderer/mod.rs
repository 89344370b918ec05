//! Device abstraction, render targets and programs.

mod device;
mod gpu_context;
mod render_target;
mod shader;
mod software;
mod vertex;
mod wgpu_device;

pub use device::{
    DrawCall, GraphicsDevice, ProgramId, ProgramKind, TargetId, Topology, Uniforms, Vertices,
};
pub use gpu_context::{GpuContext, SurfaceState};
pub use render_target::RenderTarget;
pub use shader::{compile, Program, ProgramLayout, ResourceSlot, ShaderSet, ShaderSources};
pub use software::SoftwareDevice;
pub use vertex::{GpuUniforms, SolidVertex, TexturedVertex};
pub use wgpu_device::{WgpuDevice, TARGET_FORMAT};
