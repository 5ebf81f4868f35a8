//! Frame composition
//!
//! A frame is a clear followed by the (optional) line pass and the cell pass.
//! The cell pass pulls fresh geometry from the simulation and re-uploads it on
//! every call; there is no delta encoding.

use crate::{
    gfx::{
        backend::{ClearState, DrawCall, Primitive, RenderBackend, VertexLayout},
        error::RenderError,
    },
    simulation::GridSimulation,
};

use super::{
    geometry_buffers::GeometryBuffers,
    shader_programs::ShaderPrograms,
    shaders::{POINT_SIZE_UNIFORM, POSITION_ATTRIBUTE},
};

/// What one call to [`DrawPass::draw_scene`] submitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSummary {
    pub line_vertices: u32,
    pub cell_points: u32,
    pub draw_calls: u32,
}

/// Issues the draw calls that make up one frame
#[derive(Debug, Clone)]
pub struct DrawPass {
    clear: ClearState,
    cell_size: f32,
    draw_lines: bool,
}

impl DrawPass {
    /// # Arguments
    /// * `cell_size` - Edge length of a cell in device pixels, used as the point size
    /// * `draw_lines` - Whether the grid line pass runs
    pub fn new(cell_size: f32, draw_lines: bool) -> Self {
        Self {
            clear: ClearState::default(),
            cell_size,
            draw_lines,
        }
    }

    pub fn draws_lines(&self) -> bool {
        self.draw_lines
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Clears to white with far depth, then runs the line and cell passes
    pub fn draw_scene<B, S>(
        &self,
        backend: &mut B,
        programs: &ShaderPrograms,
        buffers: &mut GeometryBuffers,
        simulation: &S,
    ) -> Result<FrameSummary, RenderError>
    where
        B: RenderBackend,
        S: GridSimulation + ?Sized,
    {
        backend.begin_frame(self.clear)?;

        let mut summary = FrameSummary::default();
        let passes = self.record_passes(backend, programs, buffers, simulation, &mut summary);

        // Close the frame even when a pass failed so the backend is not left mid-frame
        let ended = backend.end_frame();
        passes?;
        ended?;

        log::trace!(
            "frame: {} cells, {} line vertices, {} draw calls",
            summary.cell_points,
            summary.line_vertices,
            summary.draw_calls
        );
        Ok(summary)
    }

    fn record_passes<B, S>(
        &self,
        backend: &mut B,
        programs: &ShaderPrograms,
        buffers: &mut GeometryBuffers,
        simulation: &S,
        summary: &mut FrameSummary,
    ) -> Result<(), RenderError>
    where
        B: RenderBackend,
        S: GridSimulation + ?Sized,
    {
        if self.draw_lines {
            summary.line_vertices = self.line_pass(backend, programs, buffers)?;
            summary.draw_calls += 1;
        }

        summary.cell_points = self.cell_pass(backend, programs, buffers, simulation)?;
        summary.draw_calls += 1;
        Ok(())
    }

    /// Draws the static grid lines
    pub fn line_pass<B: RenderBackend>(
        &self,
        backend: &mut B,
        programs: &ShaderPrograms,
        buffers: &GeometryBuffers,
    ) -> Result<u32, RenderError> {
        let program = &programs.lines;
        let count = buffers.line_vertex_count();

        backend.draw(&DrawCall {
            program: program.handle(),
            buffer: buffers.lines().handle(),
            layout: VertexLayout::packed_vec2(program.attribute(POSITION_ATTRIBUTE)?),
            uniforms: &[],
            primitive: Primitive::Lines,
            first: 0,
            count,
        })?;
        Ok(count)
    }

    /// Re-uploads the live cells and draws one point per cell
    pub fn cell_pass<B, S>(
        &self,
        backend: &mut B,
        programs: &ShaderPrograms,
        buffers: &mut GeometryBuffers,
        simulation: &S,
    ) -> Result<u32, RenderError>
    where
        B: RenderBackend,
        S: GridSimulation + ?Sized,
    {
        let program = &programs.cells;
        let geometry = simulation.cell_geometry();
        let (buffer, points) = buffers.upload_dynamic(backend, &geometry)?;
        let buffer = buffer.handle();

        backend.draw(&DrawCall {
            program: program.handle(),
            buffer,
            layout: VertexLayout::packed_vec2(program.attribute(POSITION_ATTRIBUTE)?),
            uniforms: &[(program.uniform(POINT_SIZE_UNIFORM)?, self.cell_size)],
            primitive: Primitive::Points,
            first: 0,
            count: points,
        })?;
        Ok(points)
    }
}
