//! Simulation manager
//!
//! Owns the simulation, the render engine and the frame scheduler, and exposes
//! the four host controls: start, pause, reset and set speed.

use super::{
    scheduler::{FrameDecision, FrameHandle, FrameScheduler, FrameSource, SchedulerPhase},
    traits::GridSimulation,
};
use crate::gfx::{
    backend::RenderBackend,
    error::RenderError,
    rendering::{FrameSummary, RenderEngine},
};

/// Counters kept across the manager's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub ticks: u64,
    pub redraws: u64,
    pub resets: u64,
}

/// Couples a grid simulation to the renderer through a refresh-paced scheduler
pub struct SimulationManager<B, S, F>
where
    B: RenderBackend,
    S: GridSimulation,
    F: FrameSource,
{
    simulation: S,
    engine: RenderEngine<B>,
    scheduler: FrameScheduler<F>,
    stats: ManagerStats,
    last_frame: FrameSummary,
}

impl<B, S, F> SimulationManager<B, S, F>
where
    B: RenderBackend,
    S: GridSimulation,
    F: FrameSource,
{
    /// Creates a stopped manager; nothing is drawn until [`redraw`](Self::redraw)
    /// or the first tick
    pub fn new(simulation: S, engine: RenderEngine<B>, scheduler: FrameScheduler<F>) -> Self {
        Self {
            simulation,
            engine,
            scheduler,
            stats: ManagerStats::default(),
            last_frame: FrameSummary::default(),
        }
    }

    /// Begins ticking on refresh callbacks
    pub fn start(&mut self) {
        self.scheduler.start();
    }

    /// Stops ticking; safe to call when already stopped
    pub fn pause(&mut self) {
        self.scheduler.pause();
    }

    /// Reinitializes the simulation, stops, and draws the reset state once
    pub fn reset(&mut self) -> Result<(), RenderError> {
        self.simulation.reset();
        self.scheduler.pause();
        self.stats.resets += 1;
        log::debug!("simulation reset");
        self.redraw()?;
        Ok(())
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.scheduler.set_speed(speed);
    }

    /// Handles one refresh callback
    ///
    /// On [`FrameDecision::Advance`] the simulation ticks before the redraw so the
    /// frame shows the state that tick produced.
    pub fn on_refresh(&mut self, handle: FrameHandle) -> Result<FrameDecision, RenderError> {
        let decision = self.scheduler.on_frame(handle);
        if decision == FrameDecision::Advance {
            self.simulation.tick();
            self.stats.ticks += 1;
            self.redraw()?;
        }
        Ok(decision)
    }

    /// Draws the current state without ticking
    pub fn redraw(&mut self) -> Result<FrameSummary, RenderError> {
        let summary = self.engine.draw_scene(&self.simulation)?;
        self.stats.redraws += 1;
        self.last_frame = summary;
        Ok(summary)
    }

    pub fn speed(&self) -> f64 {
        self.scheduler.speed()
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.scheduler.phase()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn stats(&self) -> ManagerStats {
        self.stats
    }

    /// Summary of the most recent successful redraw
    pub fn last_frame(&self) -> FrameSummary {
        self.last_frame
    }

    pub fn simulation(&self) -> &S {
        &self.simulation
    }

    pub fn engine(&self) -> &RenderEngine<B> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut RenderEngine<B> {
        &mut self.engine
    }

    pub fn scheduler(&self) -> &FrameScheduler<F> {
        &self.scheduler
    }

    pub fn frames_mut(&mut self) -> &mut F {
        self.scheduler.frames_mut()
    }

    /// Stops the scheduler and releases every GPU resource
    pub fn destroy(mut self) -> (B, S) {
        self.scheduler.pause();
        let backend = self.engine.destroy();
        (backend, self.simulation)
    }
}
