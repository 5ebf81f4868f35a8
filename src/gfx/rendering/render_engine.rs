//! Rendering engine for grid simulations
//!
//! Ties the driver, the two programs, the geometry buffers and the draw pass
//! together. Everything GPU-side is created in [`RenderEngine::new`] and released
//! in [`RenderEngine::destroy`].

use crate::{
    gfx::{backend::RenderBackend, error::RenderError},
    simulation::GridSimulation,
};

use super::{
    draw_pass::{DrawPass, FrameSummary},
    geometry_buffers::GeometryBuffers,
    shader_programs::ShaderPrograms,
};

/// Owner of the GPU driver and every long-lived GPU resource
pub struct RenderEngine<B: RenderBackend> {
    backend: B,
    programs: ShaderPrograms,
    buffers: GeometryBuffers,
    pass: DrawPass,
    frames_drawn: u64,
}

impl<B: RenderBackend> RenderEngine<B> {
    /// Builds both programs and uploads the static grid lines
    ///
    /// Fails if either program does not compile or link, or if the simulation's
    /// line geometry is malformed. Nothing is leaked on failure.
    ///
    /// # Arguments
    /// * `backend` - GPU driver
    /// * `simulation` - Source of the static line geometry
    /// * `pass` - Frame composition settings
    pub fn new<S>(mut backend: B, simulation: &S, pass: DrawPass) -> Result<Self, RenderError>
    where
        S: GridSimulation + ?Sized,
    {
        let programs = ShaderPrograms::new(&mut backend)?;

        let buffers = match GeometryBuffers::new(
            &mut backend,
            &simulation.line_geometry(),
            simulation.line_vertex_count(),
        ) {
            Ok(buffers) => buffers,
            Err(err) => {
                programs.destroy(&mut backend);
                return Err(err);
            }
        };

        log::info!(
            "render engine ready (cell size {}px, grid lines {})",
            pass.cell_size(),
            if pass.draws_lines() { "on" } else { "off" }
        );

        Ok(Self {
            backend,
            programs,
            buffers,
            pass,
            frames_drawn: 0,
        })
    }

    /// Draws one frame from the simulation's current state
    pub fn draw_scene<S>(&mut self, simulation: &S) -> Result<FrameSummary, RenderError>
    where
        S: GridSimulation + ?Sized,
    {
        let summary =
            self.pass
                .draw_scene(&mut self.backend, &self.programs, &mut self.buffers, simulation)?;
        self.frames_drawn += 1;
        Ok(summary)
    }

    /// Number of frames drawn since creation
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable driver access for host-level concerns such as surface resizes
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn programs(&self) -> &ShaderPrograms {
        &self.programs
    }

    pub fn buffers(&self) -> &GeometryBuffers {
        &self.buffers
    }

    /// Releases every program and buffer and hands the driver back
    pub fn destroy(self) -> B {
        let Self {
            mut backend,
            programs,
            buffers,
            ..
        } = self;
        buffers.destroy(&mut backend);
        programs.destroy(&mut backend);
        log::debug!("render engine destroyed");
        backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gfx::backend::{recording::RecordingBackend, BufferUsage, ClearState, Primitive, ShaderStage},
        simulation::scripted::ScriptedSimulation,
    };

    fn engine(draw_lines: bool) -> (RenderEngine<RecordingBackend>, ScriptedSimulation) {
        let simulation = ScriptedSimulation::new();
        let engine = RenderEngine::new(
            RecordingBackend::new(),
            &simulation,
            DrawPass::new(3.0, draw_lines),
        )
        .unwrap();
        (engine, simulation)
    }

    #[test]
    fn test_frame_clears_white_with_far_depth() {
        let (mut engine, simulation) = engine(false);
        engine.draw_scene(&simulation).unwrap();

        let frame = engine.backend().last_frame().unwrap();
        assert_eq!(frame.clear.color, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(frame.clear.depth, 1.0);
        assert_eq!(frame.clear, ClearState::default());
    }

    #[test]
    fn test_line_pass_disabled_by_default_policy() {
        let (mut engine, simulation) = engine(false);
        let summary = engine.draw_scene(&simulation).unwrap();

        let frame = engine.backend().last_frame().unwrap();
        assert_eq!(frame.draws.len(), 1);
        assert_eq!(frame.draws[0].primitive, Primitive::Points);
        assert_eq!(summary.draw_calls, 1);
        assert_eq!(summary.line_vertices, 0);
    }

    #[test]
    fn test_line_pass_precedes_cell_pass_when_enabled() {
        let (mut engine, simulation) = engine(true);
        engine.draw_scene(&simulation).unwrap();

        let frame = engine.backend().last_frame().unwrap();
        assert_eq!(frame.draws.len(), 2);
        assert_eq!(frame.draws[0].primitive, Primitive::Lines);
        assert_eq!(frame.draws[0].count, 4);
        assert_eq!(frame.draws[0].program, engine.programs().lines.handle());
        assert_eq!(frame.draws[1].primitive, Primitive::Points);
    }

    #[test]
    fn test_cell_pass_binds_fresh_geometry_and_point_size() {
        let (mut engine, mut simulation) = engine(false);
        simulation.tick();
        simulation.tick();
        engine.draw_scene(&simulation).unwrap();

        let draw = &engine.backend().last_frame().unwrap().draws[0];
        assert_eq!(draw.program, engine.programs().cells.handle());
        assert_eq!(draw.count, simulation.expected_points());
        assert_eq!(draw.vertices, simulation.cell_geometry());
        assert_eq!(draw.uniforms, vec![(0, 3.0)]);
        assert_eq!(draw.layout.components, 2);
        assert_eq!(draw.layout.stride, 0);
        assert_eq!(draw.layout.offset, 0);

        let cells = engine.buffers().cells().unwrap();
        assert_eq!(engine.backend().buffers[&cells.handle()].usage, BufferUsage::Dynamic);
    }

    #[test]
    fn test_point_count_never_stale_after_tick() {
        let (mut engine, mut simulation) = engine(false);
        engine.draw_scene(&simulation).unwrap();
        assert_eq!(engine.backend().last_frame().unwrap().draws[0].count, 1);

        simulation.tick();
        engine.draw_scene(&simulation).unwrap();
        assert_eq!(engine.backend().last_frame().unwrap().draws[0].count, 2);
        assert_eq!(engine.buffers().cells().unwrap().vertex_count(), 2);
    }

    #[test]
    fn test_odd_cell_geometry_is_fatal_and_frame_is_closed() {
        let (mut engine, mut simulation) = engine(false);
        simulation.corrupt_geometry = true;

        let err = engine.draw_scene(&simulation).unwrap_err();
        assert!(matches!(err, RenderError::OddGeometry { .. }));
        assert_eq!(engine.frames_drawn(), 0);

        // The backend is not stuck inside a frame
        simulation.corrupt_geometry = false;
        engine.draw_scene(&simulation).unwrap();
    }

    #[test]
    fn test_startup_link_failure_is_fatal() {
        let mut backend = RecordingBackend::new();
        backend.fail_link = Some("lines");
        let simulation = ScriptedSimulation::new();

        let result = RenderEngine::new(backend, &simulation, DrawPass::new(1.0, false));
        assert!(matches!(result, Err(RenderError::ProgramLink { .. })));
    }

    #[test]
    fn test_startup_compile_failure_is_fatal() {
        let mut backend = RecordingBackend::new();
        backend.fail_compile = Some(ShaderStage::Vertex);
        let simulation = ScriptedSimulation::new();

        let result = RenderEngine::new(backend, &simulation, DrawPass::new(1.0, false));
        assert!(matches!(
            result,
            Err(RenderError::ShaderCompile {
                stage: ShaderStage::Vertex,
                ..
            })
        ));
    }

    #[test]
    fn test_destroy_releases_every_gpu_object() {
        let (mut engine, simulation) = engine(true);
        engine.draw_scene(&simulation).unwrap();

        let backend = engine.destroy();
        assert!(backend.is_empty());
        assert_eq!(backend.deleted_programs.len(), 2);
        assert_eq!(backend.deleted_buffers.len(), 2);
    }
}
