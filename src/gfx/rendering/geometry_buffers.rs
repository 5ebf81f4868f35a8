//! Vertex buffers for grid lines and live cells
//!
//! The line buffer is uploaded once with a static hint and never touched again.
//! The cell buffer is respecified every time a frame is drawn, reusing the same
//! handle after the first upload.

use crate::gfx::{
    backend::{BufferHandle, BufferUsage, RenderBackend},
    error::RenderError,
};

/// `f32` components per vertex: one 2D point is an x,y pair.
pub const FLOATS_PER_VERTEX: usize = 2;

/// Number of 2D points in flat x,y geometry
///
/// Odd lengths are a contract breach by the producer of the data and are
/// rejected rather than truncated.
pub fn point_count(data: &[f32]) -> Result<u32, RenderError> {
    points_for_len(data.len())
}

fn points_for_len(len: usize) -> Result<u32, RenderError> {
    if len % FLOATS_PER_VERTEX != 0 {
        return Err(RenderError::OddGeometry { len });
    }
    u32::try_from(len / FLOATS_PER_VERTEX).map_err(|_| RenderError::TooManyVertices { len })
}

/// A vertex buffer owned on the GPU
#[derive(Debug)]
pub struct GpuBuffer {
    handle: BufferHandle,
    usage: BufferUsage,
    vertex_count: u32,
}

impl GpuBuffer {
    fn create<B: RenderBackend>(
        backend: &mut B,
        data: &[f32],
        usage: BufferUsage,
    ) -> Result<Self, RenderError> {
        let vertex_count = point_count(data)?;
        let handle = backend.create_buffer(data, usage)?;
        Ok(Self {
            handle,
            usage,
            vertex_count,
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Number of 2D vertices currently stored
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn destroy<B: RenderBackend>(self, backend: &mut B) {
        backend.delete_buffer(self.handle);
    }
}

/// Owner of the static line buffer and the dynamic cell buffer
#[derive(Debug)]
pub struct GeometryBuffers {
    lines: GpuBuffer,
    line_vertex_count: u32,
    cells: Option<GpuBuffer>,
}

impl GeometryBuffers {
    /// Uploads the grid lines once
    ///
    /// # Arguments
    /// * `line_geometry` - Flat x,y pairs of line segment endpoints
    /// * `line_vertex_count` - Vertices to draw, which may be fewer than stored
    pub fn new<B: RenderBackend>(
        backend: &mut B,
        line_geometry: &[f32],
        line_vertex_count: usize,
    ) -> Result<Self, RenderError> {
        let lines = Self::upload_static(backend, line_geometry)?;

        if line_vertex_count as u64 > lines.vertex_count() as u64 {
            let available = lines.vertex_count() as u64;
            lines.destroy(backend);
            return Err(RenderError::VertexCountExceedsBuffer {
                requested: line_vertex_count as u64,
                available,
            });
        }

        log::debug!(
            "uploaded {} line vertices ({} drawn)",
            lines.vertex_count(),
            line_vertex_count
        );

        Ok(Self {
            lines,
            line_vertex_count: line_vertex_count as u32,
            cells: None,
        })
    }

    /// Creates a buffer hinted as never changing
    pub fn upload_static<B: RenderBackend>(
        backend: &mut B,
        data: &[f32],
    ) -> Result<GpuBuffer, RenderError> {
        GpuBuffer::create(backend, data, BufferUsage::Static)
    }

    /// Replaces the cell geometry and returns the buffer with its point count
    ///
    /// The point count is checked before anything reaches the GPU, so a rejected
    /// upload leaves the previous contents in place.
    pub fn upload_dynamic<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        data: &[f32],
    ) -> Result<(&GpuBuffer, u32), RenderError> {
        let points = point_count(data)?;

        match self.cells.as_mut() {
            Some(buffer) => {
                backend.write_buffer(buffer.handle, data)?;
                buffer.vertex_count = points;
            }
            None => {
                self.cells = Some(GpuBuffer::create(backend, data, BufferUsage::Dynamic)?);
            }
        }

        let buffer = self
            .cells
            .as_ref()
            .ok_or(RenderError::FrameState("cell buffer missing after upload"))?;
        Ok((buffer, points))
    }

    pub fn lines(&self) -> &GpuBuffer {
        &self.lines
    }

    pub fn line_vertex_count(&self) -> u32 {
        self.line_vertex_count
    }

    /// The most recently uploaded cell buffer, if any upload happened yet
    pub fn cells(&self) -> Option<&GpuBuffer> {
        self.cells.as_ref()
    }

    pub fn destroy<B: RenderBackend>(self, backend: &mut B) {
        self.lines.destroy(backend);
        if let Some(cells) = self.cells {
            cells.destroy(backend);
        }
    }
}
