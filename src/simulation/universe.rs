//! Conway's Game of Life on a wrapping grid
//!
//! Cells are bit-packed eight to a byte in row-major order. Neighbour counting
//! wraps at the edges, so the grid is a torus.

use rand::{rngs::StdRng, Rng, SeedableRng};
use thiserror::Error;

use super::traits::GridSimulation;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UniverseError {
    #[error("grid must be at least 1x1 cells, got {width}x{height}")]
    EmptyGrid { width: usize, height: usize },
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Dead = 0,
    Alive = 1,
}

/// A Life grid plus the random source used to refill it on reset
#[derive(Debug, Clone)]
pub struct Universe {
    width: usize,
    height: usize,
    cells: Vec<u8>,
    rng: StdRng,
}

impl Universe {
    /// Creates an all-dead grid
    pub fn new(width: usize, height: usize) -> Result<Self, UniverseError> {
        Self::with_rng(width, height, StdRng::from_os_rng())
    }

    /// Creates a grid with roughly half the cells alive
    pub fn new_random(width: usize, height: usize) -> Result<Self, UniverseError> {
        let mut universe = Self::new(width, height)?;
        universe.randomize();
        Ok(universe)
    }

    /// Random grid whose initial fill and every reset are reproducible
    pub fn new_seeded(width: usize, height: usize, seed: u64) -> Result<Self, UniverseError> {
        let mut universe = Self::with_rng(width, height, StdRng::seed_from_u64(seed))?;
        universe.randomize();
        Ok(universe)
    }

    fn with_rng(width: usize, height: usize, rng: StdRng) -> Result<Self, UniverseError> {
        if width == 0 || height == 0 {
            return Err(UniverseError::EmptyGrid { width, height });
        }
        Ok(Self {
            width,
            height,
            cells: vec![0; Self::packed_len(width, height)],
            rng,
        })
    }

    fn packed_len(width: usize, height: usize) -> usize {
        (width * height).div_ceil(8)
    }

    fn randomize(&mut self) {
        self.rng.fill(&mut self.cells[..]);

        // Keep the padding bits of the last byte clear
        let used = (self.width * self.height) % 8;
        if used != 0 {
            if let Some(last) = self.cells.last_mut() {
                *last &= (1u8 << used) - 1;
            }
        }
    }

    fn accessor(&self, row: usize, col: usize) -> (usize, u8) {
        let index = row * self.width + col;
        (index / 8, 1 << (index % 8))
    }

    fn live_neighbour_count(&self, row: usize, col: usize) -> u8 {
        let mut count = 0;
        for delta_row in [self.height - 1, 0, 1] {
            for delta_col in [self.width - 1, 0, 1] {
                if delta_row == 0 && delta_col == 0 {
                    continue;
                }
                let neighbour_row = (row + delta_row) % self.height;
                let neighbour_col = (col + delta_col) % self.width;
                count += self.get_cell(neighbour_row, neighbour_col) as u8;
            }
        }
        count
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// # Panics
    /// If `row` or `col` is outside the grid.
    pub fn get_cell(&self, row: usize, col: usize) -> Cell {
        let (index, flag) = self.accessor(row, col);
        if self.cells[index] & flag == 0 {
            Cell::Dead
        } else {
            Cell::Alive
        }
    }

    /// # Panics
    /// If `row` or `col` is outside the grid.
    pub fn set_cell(&mut self, row: usize, col: usize, cell: Cell) {
        let (index, flag) = self.accessor(row, col);
        match cell {
            Cell::Alive => self.cells[index] |= flag,
            Cell::Dead => self.cells[index] &= !flag,
        }
    }

    /// Marks every `(row, col)` pair alive
    pub fn set_cells(&mut self, cells: &[(usize, usize)]) {
        for &(row, col) in cells {
            self.set_cell(row, col, Cell::Alive);
        }
    }

    /// Every cell in row-major order
    pub fn cells(&self) -> Vec<Cell> {
        (0..self.height)
            .flat_map(|row| (0..self.width).map(move |col| self.get_cell(row, col)))
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.cells.iter().map(|byte| byte.count_ones() as usize).sum()
    }
}

impl GridSimulation for Universe {
    fn tick(&mut self) {
        let mut next = self.cells.clone();

        for row in 0..self.height {
            for col in 0..self.width {
                let next_cell = match (self.get_cell(row, col), self.live_neighbour_count(row, col)) {
                    (Cell::Alive, 2) | (Cell::Alive, 3) => Cell::Alive,
                    (Cell::Alive, _) => Cell::Dead,
                    (Cell::Dead, 3) => Cell::Alive,
                    (otherwise, _) => otherwise,
                };

                let (index, flag) = self.accessor(row, col);
                match next_cell {
                    Cell::Alive => next[index] |= flag,
                    Cell::Dead => next[index] &= !flag,
                }
            }
        }

        self.cells = next;
    }

    fn reset(&mut self) {
        self.randomize();
    }

    fn cell_geometry(&self) -> Vec<f32> {
        let (width, height) = (self.width as f32, self.height as f32);
        (0..self.height)
            .flat_map(|row| (0..self.width).map(move |col| (row, col)))
            .filter(|&(row, col)| self.get_cell(row, col) == Cell::Alive)
            .flat_map(|(row, col)| {
                let x = ((col as f32 + 0.5) * 2.0) / width - 1.0;
                let y = ((row as f32 + 0.5) * 2.0) / height - 1.0;
                [x, y]
            })
            .collect()
    }

    fn line_geometry(&self) -> Vec<f32> {
        let (width, height) = (self.width as f32, self.height as f32);

        let vertical = (1..self.width).map(|col| {
            let x = col as f32 * 2.0 / width - 1.0;
            [x, -1.0, x, 1.0]
        });
        let horizontal = (1..self.height).map(|row| {
            let y = row as f32 * 2.0 / height - 1.0;
            [-1.0, y, 1.0, y]
        });

        vertical.chain(horizontal).flatten().collect()
    }

    fn line_vertex_count(&self) -> usize {
        ((self.width - 1) + (self.height - 1)) * 2
    }
}
