//! Lifeview
//!
//! Frame-paced GPU visualization of stepping grid simulations, built on wgpu
//! and winit. Ships with a Conway's Game of Life universe.

pub mod app;
pub mod config;
pub mod gfx;
pub mod logging;
pub mod performance;
pub mod simulation;

// Re-export main types for convenience
pub use app::LifeApp;
pub use config::LifeConfig;
pub use simulation::{GridSimulation, SimulationManager, Universe};

/// Creates the viewer with configuration taken from the environment
pub fn default() -> anyhow::Result<LifeApp> {
    LifeApp::new(LifeConfig::from_env()?)
}
