//! Core simulation trait
//!
//! Defines the interface a stepping grid simulation implements so the renderer
//! and the frame scheduler can drive it without knowing its rules.

/// A stepping grid simulation that exports its state as GPU-ready geometry
///
/// All geometry is flat `x, y` pairs in normalized device coordinates
/// (`-1.0..=1.0` on both axes).
pub trait GridSimulation {
    /// Advance by one generation. Must be valid in any state.
    fn tick(&mut self);

    /// Reinitialize to the implementation's initial configuration.
    fn reset(&mut self);

    /// One point per live cell; the length is always even.
    fn cell_geometry(&self) -> Vec<f32>;

    /// Endpoints of the static grid line segments, fixed for the simulation's lifetime.
    fn line_geometry(&self) -> Vec<f32>;

    /// Number of line vertices to draw
    ///
    /// Kept separate from `line_geometry().len() / 2` so implementations may encode
    /// degenerate or duplicate vertices.
    fn line_vertex_count(&self) -> usize;
}
