// src/gfx/rendering/mod.rs
//! Core rendering functionality
//!
//! Shader programs, geometry buffers, frame composition and the engine that
//! owns them.

pub mod draw_pass;
pub mod geometry_buffers;
pub mod render_engine;
pub mod shader_programs;
pub mod shaders;

// Re-export main types
pub use draw_pass::{DrawPass, FrameSummary};
pub use geometry_buffers::{GeometryBuffers, GpuBuffer};
pub use render_engine::RenderEngine;
pub use shader_programs::{ShaderProgram, ShaderPrograms};
