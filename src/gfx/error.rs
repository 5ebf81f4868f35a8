//! Error types for the rendering layer
//!
//! Every fault the renderer can surface is a [`RenderError`]. Compile, link and
//! geometry faults are fatal by policy: callers propagate them instead of
//! retrying or falling back to a degraded mode.

use thiserror::Error;

use super::backend::ShaderStage;

/// Errors produced by the shader, buffer and draw layers
#[derive(Debug, Error)]
pub enum RenderError {
    /// A shader stage failed to compile; `log` holds the driver diagnostics.
    #[error("failed to compile {stage} shader: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    /// A program failed to link; no rendering is possible without it.
    #[error("unable to link shader program '{label}': {log}")]
    ProgramLink { label: String, log: String },

    #[error("program '{program}' has no active attribute '{name}'")]
    MissingAttribute { program: String, name: String },

    #[error("program '{program}' has no active uniform '{name}'")]
    MissingUniform { program: String, name: String },

    /// Geometry handed over by the simulation was not made of x,y pairs.
    #[error("geometry has odd length {len}, expected flat x,y pairs")]
    OddGeometry { len: usize },

    #[error("geometry of {len} floats holds more points than a draw call can address")]
    TooManyVertices { len: usize },

    #[error("draw requests {requested} vertices but the buffer holds {available}")]
    VertexCountExceedsBuffer { requested: u64, available: u64 },

    #[error("vertex layout {details} does not match program '{program}'")]
    VertexLayoutMismatch { program: String, details: String },

    #[error("static buffer {id} cannot be respecified")]
    ImmutableBuffer { id: u32 },

    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u32 },

    #[error("invalid frame state: {0}")]
    FrameState(&'static str),

    #[error("surface error: {0}")]
    Surface(String),

    #[error("GPU device initialization failed: {0}")]
    Device(String),
}
