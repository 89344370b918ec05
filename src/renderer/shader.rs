//! The three programs every canvas draws with, compiled once per render context.
//!
//! Sources are WGSL. Before a program reaches the device it is parsed and
//! validated with naga, and its interface is checked against what the canvas
//! feeds it (vertex attributes, uniform block, texture slots). Any failure
//! carries the compiler's own diagnostic text.

use std::borrow::Cow;
use std::collections::HashMap;
use std::rc::Rc;

use super::device::{GraphicsDevice, ProgramId, ProgramKind};
use crate::assets::AssetLoader;
use crate::error::{CanvasError, Result};

const SOLID_SHADER: &str = r#"
struct Uniforms {
    projection: mat4x4<f32>,
    model_view: mat4x4<f32>,
    color: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexInput {
    @location(0) position: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> @builtin(position) vec4<f32> {
    return uniforms.projection * uniforms.model_view * vec4<f32>(in.position, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return uniforms.color;
}
"#;

const TEXT_SHADER: &str = r#"
struct Uniforms {
    projection: mat4x4<f32>,
    model_view: mat4x4<f32>,
    color: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexInput {
    // Glyph triangle corner in canvas pixels, already placed on the baseline
    @location(0) position: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = uniforms.projection * uniforms.model_view * vec4<f32>(in.position, 0.0, 1.0);
    out.color = uniforms.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

const TEXTURED_SHADER: &str = r#"
struct Uniforms {
    projection: mat4x4<f32>,
    model_view: mat4x4<f32>,
    color: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

@group(1) @binding(0)
var t_source: texture_2d<f32>;
@group(1) @binding(1)
var s_source: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = uniforms.projection * uniforms.model_view * vec4<f32>(in.position, 0.0, 1.0);
    out.uv = in.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(t_source, s_source, in.uv) * uniforms.color;
}
"#;

/// WGSL sources for the three programs.
#[derive(Debug, Clone)]
pub struct ShaderSources {
    pub solid: Cow<'static, str>,
    pub text: Cow<'static, str>,
    pub textured: Cow<'static, str>,
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self {
            solid: Cow::Borrowed(SOLID_SHADER),
            text: Cow::Borrowed(TEXT_SHADER),
            textured: Cow::Borrowed(TEXTURED_SHADER),
        }
    }
}

impl ShaderSources {
    /// Read `solid.wgsl`, `text.wgsl` and `textured.wgsl` from `dir`.
    pub fn load(loader: &dyn AssetLoader, dir: &str) -> Result<Self> {
        let path = |name: &str| {
            if dir.is_empty() {
                name.to_string()
            } else {
                format!("{}/{name}", dir.trim_end_matches('/'))
            }
        };
        Ok(Self {
            solid: Cow::Owned(loader.read_to_string(&path("solid.wgsl"))?),
            text: Cow::Owned(loader.read_to_string(&path("text.wgsl"))?),
            textured: Cow::Owned(loader.read_to_string(&path("textured.wgsl"))?),
        })
    }

    pub fn get(&self, kind: ProgramKind) -> &str {
        match kind {
            ProgramKind::Solid => &self.solid,
            ProgramKind::Text => &self.text,
            ProgramKind::Textured => &self.textured,
        }
    }
}

/// A resource slot declared by a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSlot {
    pub name: String,
    pub group: u32,
    pub binding: u32,
}

/// Attribute and uniform locations reflected from a validated program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramLayout {
    pub attributes: Vec<(String, u32)>,
    pub resources: Vec<ResourceSlot>,
}

impl ProgramLayout {
    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, location)| *location)
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceSlot> {
        self.resources.iter().find(|slot| slot.name == name)
    }

    fn has_slot(&self, group: u32, binding: u32) -> bool {
        self.resources
            .iter()
            .any(|slot| slot.group == group && slot.binding == binding)
    }
}

/// Parse and validate `source`, then check it exposes the interface `kind` needs.
pub fn compile(kind: ProgramKind, source: &str) -> Result<ProgramLayout> {
    let program = kind.name();
    let module = naga::front::wgsl::parse_str(source).map_err(|e| CanvasError::CompileLink {
        program,
        diagnostic: e.emit_to_string(source),
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    );
    validator
        .validate(&module)
        .map_err(|e| CanvasError::CompileLink {
            program,
            diagnostic: e.emit_to_string(source),
        })?;

    let link_error = |diagnostic: String| CanvasError::CompileLink {
        program,
        diagnostic,
    };

    let vertex = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Vertex && ep.name == "vs_main")
        .ok_or_else(|| link_error("missing @vertex entry point `vs_main`".into()))?;
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Fragment && ep.name == "fs_main")
        .ok_or_else(|| link_error("missing @fragment entry point `fs_main`".into()))?;

    let mut layout = ProgramLayout::default();
    for arg in &vertex.function.arguments {
        match &arg.binding {
            Some(naga::Binding::Location { location, .. }) => {
                layout
                    .attributes
                    .push((arg.name.clone().unwrap_or_default(), *location));
            }
            Some(_) => {}
            None => {
                if let naga::TypeInner::Struct { members, .. } = &module.types[arg.ty].inner {
                    for member in members {
                        if let Some(naga::Binding::Location { location, .. }) = &member.binding {
                            layout
                                .attributes
                                .push((member.name.clone().unwrap_or_default(), *location));
                        }
                    }
                }
            }
        }
    }

    for (_, var) in module.global_variables.iter() {
        if let Some(binding) = &var.binding {
            layout.resources.push(ResourceSlot {
                name: var.name.clone().unwrap_or_default(),
                group: binding.group,
                binding: binding.binding,
            });
        }
    }

    for (expected, name) in kind.required_attributes().iter().enumerate() {
        match layout.attribute_location(name) {
            Some(location) if location == expected as u32 => {}
            Some(location) => {
                return Err(link_error(format!(
                    "vertex attribute `{name}` is at location {location}, expected {expected}"
                )));
            }
            None => return Err(link_error(format!("missing vertex attribute `{name}`"))),
        }
    }
    if !layout.has_slot(0, 0) {
        return Err(link_error(
            "missing uniform block at @group(0) @binding(0)".into(),
        ));
    }
    if kind.is_textured() && !(layout.has_slot(1, 0) && layout.has_slot(1, 1)) {
        return Err(link_error(
            "missing texture/sampler at @group(1) @binding(0..=1)".into(),
        ));
    }

    Ok(layout)
}

#[derive(Debug, Clone)]
pub struct Program {
    pub id: ProgramId,
    pub kind: ProgramKind,
    pub layout: ProgramLayout,
}

/// Owns the solid, text and textured programs on one device.
pub struct ShaderSet {
    device: Rc<dyn GraphicsDevice>,
    programs: HashMap<ProgramKind, Program>,
}

impl ShaderSet {
    /// Compile the built-in programs.
    pub fn new(device: Rc<dyn GraphicsDevice>) -> Result<Self> {
        Self::from_sources(device, &ShaderSources::default())
    }

    pub fn from_sources(device: Rc<dyn GraphicsDevice>, sources: &ShaderSources) -> Result<Self> {
        let mut set = Self {
            device,
            programs: HashMap::new(),
        };
        for kind in ProgramKind::ALL {
            // On error `set` drops here and releases the programs created so far.
            let source = sources.get(kind);
            let layout = compile(kind, source)?;
            let id = set.device.create_program(kind, source)?;
            log::info!("Compiled {} program", kind.name());
            set.programs.insert(kind, Program { id, kind, layout });
        }
        Ok(set)
    }

    pub fn load(
        device: Rc<dyn GraphicsDevice>,
        loader: &dyn AssetLoader,
        dir: &str,
    ) -> Result<Self> {
        let sources = ShaderSources::load(loader, dir)?;
        Self::from_sources(device, &sources)
    }

    pub fn program(&self, kind: ProgramKind) -> Result<&Program> {
        self.programs
            .get(&kind)
            .ok_or(CanvasError::InvalidState("shader set has been disposed"))
    }

    pub fn dispose(&mut self) {
        for (_, program) in self.programs.drain() {
            self.device.delete_program(program.id);
        }
    }
}

impl Drop for ShaderSet {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryLoader;
    use crate::renderer::software::SoftwareDevice;

    #[test]
    fn test_builtin_programs_reflect() {
        let layout = compile(ProgramKind::Textured, TEXTURED_SHADER).unwrap();
        assert_eq!(layout.attribute_location("position"), Some(0));
        assert_eq!(layout.attribute_location("uv"), Some(1));
        assert_eq!(
            layout.resource("t_source"),
            Some(&ResourceSlot {
                name: "t_source".into(),
                group: 1,
                binding: 0
            })
        );

        for kind in [ProgramKind::Solid, ProgramKind::Text] {
            let layout = compile(kind, ShaderSources::default().get(kind)).unwrap();
            assert_eq!(layout.attribute_location("position"), Some(0));
            assert!(layout.resource("uniforms").is_some());
        }
    }

    #[test]
    fn test_syntax_error_carries_diagnostic() {
        let err = compile(ProgramKind::Solid, "fn vs_main( {").unwrap_err();
        match err {
            CanvasError::CompileLink {
                program,
                diagnostic,
            } => {
                assert_eq!(program, "solid");
                assert!(!diagnostic.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_attribute_fails_link() {
        let source = SOLID_SHADER
            .replace("@location(0) position", "@location(0) pos")
            .replace("in.position", "in.pos");
        match compile(ProgramKind::Solid, &source) {
            Err(CanvasError::CompileLink { diagnostic, .. }) => {
                assert_eq!(diagnostic, "missing vertex attribute `position`");
            }
            other => panic!("expected a link error, got {other:?}"),
        }
    }

    #[test]
    fn test_textured_requires_sampler_slots() {
        let err = compile(ProgramKind::Textured, SOLID_SHADER).unwrap_err();
        assert!(matches!(err, CanvasError::CompileLink { .. }));
    }

    #[test]
    fn test_failed_set_releases_programs() {
        let device = Rc::new(SoftwareDevice::new(4, 4));
        let sources = ShaderSources {
            textured: Cow::Borrowed("not wgsl"),
            ..ShaderSources::default()
        };
        assert!(ShaderSet::from_sources(device.clone(), &sources).is_err());
        assert_eq!(device.program_count(), 0);

        let mut set = ShaderSet::new(device.clone()).unwrap();
        assert_eq!(device.program_count(), 3);
        set.dispose();
        assert_eq!(device.program_count(), 0);
        assert!(set.program(ProgramKind::Solid).is_err());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let device = Rc::new(SoftwareDevice::new(4, 4));
        let loader = MemoryLoader::new()
            .with_file("shaders/solid.wgsl", SOLID_SHADER)
            .with_file("shaders/text.wgsl", TEXT_SHADER);
        let result = ShaderSet::load(device, &loader, "shaders");
        assert!(matches!(result, Err(CanvasError::MissingResource(_))));
    }
}
