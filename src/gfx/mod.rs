//! # Graphics Module
//!
//! Everything between a grid simulation's exported geometry and pixels on screen.
//!
//! ## Architecture Overview
//!
//! - **Backend** ([`backend`]) - The GPU driver seam and its wgpu implementation
//! - **Rendering** ([`rendering`]) - Shader programs, geometry buffers and the draw pass
//! - **Resources** ([`resources`]) - Textures owned by the wgpu driver
//! - **Errors** ([`error`]) - Failures surfaced by any of the above
//!
//! Drivers hand out opaque handles; the rendering layer wraps them in owned types
//! with an explicit `destroy`, so teardown releases every GPU object.
//!
//! ## Usage
//!
//! ```no_run
//! use lifeview::gfx::{rendering::{DrawPass, RenderEngine}, WgpuBackend};
//!
//! // The engine is typically created by the windowed app once a surface exists
//! // let backend = pollster::block_on(WgpuBackend::new(window, width, height))?;
//! // let engine = RenderEngine::new(backend, &universe, DrawPass::new(1.0, false))?;
//! ```

pub mod backend;
pub mod error;
pub mod rendering;
pub mod resources;

// Re-export commonly used types
pub use backend::{RenderBackend, WgpuBackend};
pub use error::RenderError;
pub use rendering::render_engine::RenderEngine;
