//! GPU driver seam
//!
//! [`RenderBackend`] is the narrow set of driver capabilities the renderer relies
//! on: shader objects, programs, vertex buffers and a frame that collects draw
//! calls. Handles are plain ids owned by the backend; the owned-resource types in
//! [`crate::gfx::rendering`] wrap them and release them explicitly.
//!
//! All calls are synchronous from the caller's point of view.

pub mod wgpu_backend;

#[cfg(test)]
pub(crate) mod recording;

use std::fmt;

use super::error::RenderError;

pub use wgpu_backend::WgpuBackend;

/// Opaque shader object id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub(crate) u32);

/// Opaque program id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u32);

/// Opaque vertex buffer id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Usage hint given to the driver when a buffer is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Uploaded once, drawn many times. The driver may place it in read-mostly memory.
    Static,
    /// Respecified frequently (every simulation tick).
    Dynamic,
}

/// Primitive assembly mode for a draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// Pairs of vertices form line segments.
    Lines,
    /// Every vertex is rasterized as a screen-space square sized by `point_size`.
    Points,
}

/// Clear values for the start of a frame
///
/// Depth testing is always on: a fragment passes when its depth is nearer than
/// or equal to the stored one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearState {
    pub color: [f64; 4],
    pub depth: f32,
}

impl Default for ClearState {
    /// Opaque white, depth at the far plane.
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            depth: 1.0,
        }
    }
}

/// A vertex attribute a program consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDesc {
    pub name: &'static str,
    pub location: u32,
    /// Number of `f32` components per vertex.
    pub components: u32,
}

/// A scalar `f32` uniform a program consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformDesc {
    pub name: &'static str,
    pub location: u32,
}

/// The attribute and uniform interface a program is linked against
#[derive(Debug, Clone, Copy)]
pub struct ProgramInterface {
    pub label: &'static str,
    pub primitive: Primitive,
    pub attributes: &'static [AttributeDesc],
    pub uniforms: &'static [UniformDesc],
}

/// How one attribute reads from the bound buffer
///
/// A `stride` of zero means tightly packed, as in GL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    pub location: u32,
    pub components: u32,
    pub stride: u32,
    pub offset: u32,
}

impl VertexLayout {
    /// Tightly packed 2D positions starting at the beginning of the buffer.
    pub const fn packed_vec2(location: u32) -> Self {
        Self {
            location,
            components: 2,
            stride: 0,
            offset: 0,
        }
    }

    /// Effective distance in bytes between consecutive vertices.
    pub fn effective_stride(&self) -> u32 {
        if self.stride == 0 {
            self.components * std::mem::size_of::<f32>() as u32
        } else {
            self.stride
        }
    }

    /// True when vertices start at offset zero with no gaps between them.
    pub fn is_tightly_packed(&self) -> bool {
        self.offset == 0 && self.effective_stride() == self.components * 4
    }
}

/// Everything one draw call binds: program, buffer, layout, uniforms, range
#[derive(Debug, Clone)]
pub struct DrawCall<'a> {
    pub program: ProgramHandle,
    pub buffer: BufferHandle,
    pub layout: VertexLayout,
    pub uniforms: &'a [(u32, f32)],
    pub primitive: Primitive,
    pub first: u32,
    pub count: u32,
}

/// Driver capabilities consumed by the renderer
pub trait RenderBackend {
    /// Creates an empty shader object for `stage`.
    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderHandle, RenderError>;

    /// Compiles `source` into `shader`, returning the diagnostic log on failure.
    fn compile_shader(&mut self, shader: ShaderHandle, source: &str) -> Result<(), String>;

    fn delete_shader(&mut self, shader: ShaderHandle);

    fn create_program(&mut self, label: &str) -> Result<ProgramHandle, RenderError>;

    /// Links the compiled `shaders` into `program`, returning the diagnostic log on failure.
    fn link_program(
        &mut self,
        program: ProgramHandle,
        shaders: &[ShaderHandle],
        interface: &ProgramInterface,
    ) -> Result<(), String>;

    fn delete_program(&mut self, program: ProgramHandle);

    /// Location of an active attribute in a linked program.
    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Option<u32>;

    /// Location of an active uniform in a linked program.
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<u32>;

    /// Creates a vertex buffer and uploads `data` with the given usage hint.
    fn create_buffer(&mut self, data: &[f32], usage: BufferUsage)
        -> Result<BufferHandle, RenderError>;

    /// Replaces the full contents of a dynamic buffer.
    fn write_buffer(&mut self, buffer: BufferHandle, data: &[f32]) -> Result<(), RenderError>;

    fn delete_buffer(&mut self, buffer: BufferHandle);

    /// Starts a frame, clearing color and depth as requested.
    fn begin_frame(&mut self, clear: ClearState) -> Result<(), RenderError>;

    /// Records a draw call into the current frame.
    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), RenderError>;

    /// Submits and presents the current frame.
    fn end_frame(&mut self) -> Result<(), RenderError>;
}
