use thiserror::Error;

/// Everything that can go wrong while creating or recording canvases.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// A render target or program could not be allocated on the device.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// A shader failed to parse, validate or link. Carries the compiler output verbatim.
    #[error("program `{program}` failed to compile or link:\n{diagnostic}")]
    CompileLink {
        program: &'static str,
        diagnostic: String,
    },

    /// A call was made in a state that does not allow it.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// A resource path could not be resolved by the asset loader.
    #[error("missing resource: {0}")]
    MissingResource(String),

    #[error("font error: {0}")]
    Font(String),

    #[error("tessellation failed: {0}")]
    Tessellation(String),

    #[error("pixel readback failed: {0}")]
    Readback(String),
}

pub type Result<T> = std::result::Result<T, CanvasError>;
