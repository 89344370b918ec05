//! Renders the same scenes on the CPU reference device and on wgpu and
//! compares the results.

mod compare;
mod scenes;

pub use compare::{compare_images, generate_diff_image, CompareResult};
pub use scenes::{render_scene, SCENES};

use std::path::PathBuf;
use std::rc::Rc;

use tessera::renderer::{GpuContext, SoftwareDevice, WgpuDevice};
use tessera::CanvasError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisualTestError {
    #[error("Failed to render scene: {0}")]
    Render(#[from] CanvasError),
    #[error("Failed to compare images: {0}")]
    Compare(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, VisualTestError>;

/// Configuration for a parity test
#[derive(Clone)]
pub struct ParityTestConfig {
    /// Name of the scene to render, one of [`SCENES`]
    pub scene: String,
    /// Similarity threshold (0.0 to 1.0, default 0.97)
    pub similarity_threshold: f64,
}

impl Default for ParityTestConfig {
    fn default() -> Self {
        Self {
            scene: String::new(),
            // Rasterization rules differ slightly at antialiased edges.
            similarity_threshold: 0.97,
        }
    }
}

/// Result of a parity test
pub struct ParityTestResult {
    /// Whether the test passed (similarity >= threshold)
    pub passed: bool,
    /// The similarity score (0.0 to 1.0)
    pub similarity: f64,
    /// Largest per-channel difference of any pixel
    pub max_difference: u8,
    /// Path to the wgpu render
    pub gpu_path: PathBuf,
    /// Path to the CPU reference render
    pub reference_path: PathBuf,
    /// Path to diff image (if generated on failure)
    pub diff_path: Option<PathBuf>,
}

/// Get the path to the output directory for test artifacts
pub fn output_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("output")
}

/// Get the path to a diff image
pub fn diff_path(scene: &str) -> PathBuf {
    output_dir().join(format!("{}_diff.png", scene))
}

/// Render `config.scene` on both devices and compare.
///
/// Returns `Ok(None)` when no GPU adapter is available.
pub fn run_parity_test(config: &ParityTestConfig) -> Result<Option<ParityTestResult>> {
    let gpu = match GpuContext::new() {
        Ok(gpu) => gpu,
        Err(e) => {
            log::warn!("Skipping '{}': {}", config.scene, e);
            return Ok(None);
        }
    };

    let reference = render_scene(&config.scene, Rc::new(SoftwareDevice::new(1, 1)))?;
    let rendered = render_scene(&config.scene, Rc::new(WgpuDevice::new(&gpu)))?;

    std::fs::create_dir_all(output_dir())?;
    let reference_path = output_dir().join(format!("{}_reference.png", config.scene));
    let gpu_path = output_dir().join(format!("{}_gpu.png", config.scene));
    reference.save(&reference_path)?;
    rendered.save(&gpu_path)?;

    let compare_result = compare_images(&reference, &rendered)?;
    let passed = compare_result.similarity >= config.similarity_threshold;
    log::debug!(
        "{}: similarity {:.4}, max channel difference {}",
        config.scene,
        compare_result.similarity,
        compare_result.max_difference
    );

    let diff = if !passed {
        let diff_file = diff_path(&config.scene);
        generate_diff_image(&reference, &rendered, &diff_file)?;
        Some(diff_file)
    } else {
        None
    };

    Ok(Some(ParityTestResult {
        passed,
        similarity: compare_result.similarity,
        max_difference: compare_result.max_difference,
        gpu_path,
        reference_path,
        diff_path: diff,
    }))
}
