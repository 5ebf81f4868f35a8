// src/simulation/mod.rs
//! Simulation system
//!
//! Grid simulations, the refresh-paced scheduler that steps them, and the
//! manager that ties both to the renderer.

pub mod manager;
pub mod scheduler;
pub mod traits;
pub mod universe;

#[cfg(test)]
pub(crate) mod scripted;

pub use manager::{ManagerStats, SimulationManager};
pub use scheduler::{
    FrameDecision, FrameHandle, FrameScheduler, FrameSource, SchedulerPhase, SchedulerState,
};
pub use traits::GridSimulation;
pub use universe::{Cell, Universe, UniverseError};
