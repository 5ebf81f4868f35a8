//! Deterministic simulation used by unit tests
//!
//! Generation `n` exports `n + 1` live cells along the diagonal, so every tick
//! visibly changes the point count.

use super::traits::GridSimulation;

#[derive(Debug, Default)]
pub struct ScriptedSimulation {
    pub generation: u32,
    pub ticks: u32,
    pub resets: u32,
    /// When set, `cell_geometry` returns an odd-length sequence.
    pub corrupt_geometry: bool,
}

impl ScriptedSimulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expected_points(&self) -> u32 {
        self.generation + 1
    }
}

impl GridSimulation for ScriptedSimulation {
    fn tick(&mut self) {
        self.generation += 1;
        self.ticks += 1;
    }

    fn reset(&mut self) {
        self.generation = 0;
        self.resets += 1;
    }

    fn cell_geometry(&self) -> Vec<f32> {
        let mut geometry: Vec<f32> = (0..=self.generation)
            .flat_map(|i| {
                let t = i as f32 / (self.generation as f32 + 1.0);
                [t, t]
            })
            .collect();
        if self.corrupt_geometry {
            geometry.push(0.0);
        }
        geometry
    }

    fn line_geometry(&self) -> Vec<f32> {
        vec![0.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0, 0.0]
    }

    fn line_vertex_count(&self) -> usize {
        4
    }
}
