//! Startup configuration
//!
//! Fixed for the lifetime of the process: grid size, cell size, initial speed and
//! whether grid lines are drawn. Values come from [`LifeConfig::default`], the
//! builder methods, or `LIFEVIEW_*` environment variables.

use thiserror::Error;

pub const ENV_WIDTH: &str = "LIFEVIEW_WIDTH";
pub const ENV_HEIGHT: &str = "LIFEVIEW_HEIGHT";
pub const ENV_CELL_SIZE: &str = "LIFEVIEW_CELL_SIZE";
pub const ENV_SPEED: &str = "LIFEVIEW_SPEED";
pub const ENV_GRID_LINES: &str = "LIFEVIEW_GRID_LINES";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a valid value")]
    InvalidValue { var: &'static str, value: String },
    #[error("grid must be at least 1x1 cells, got {width}x{height}")]
    EmptyGrid { width: usize, height: usize },
    #[error("cell size must be positive, got {0}")]
    NonPositiveCellSize(f32),
}

/// Startup settings for the viewer
#[derive(Debug, Clone, PartialEq)]
pub struct LifeConfig {
    /// Grid width in cells
    pub width: usize,
    /// Grid height in cells
    pub height: usize,
    /// Cell edge length in device pixels
    pub cell_size: f32,
    /// Ticks per display refresh
    pub speed: f64,
    pub grid_lines: bool,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            width: 1140,
            height: 750,
            cell_size: 1.0,
            speed: 1.0 / 15.0,
            grid_lines: false,
        }
    }
}

impl LifeConfig {
    pub fn with_grid_size(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_cell_size(mut self, cell_size: f32) -> Self {
        self.cell_size = cell_size;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_grid_lines(mut self, grid_lines: bool) -> Self {
        self.grid_lines = grid_lines;
        self
    }

    /// Defaults overridden by any `LIFEVIEW_*` variables that are set
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through an arbitrary key lookup
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_WIDTH) {
            config.width = parse(ENV_WIDTH, &value)?;
        }
        if let Some(value) = lookup(ENV_HEIGHT) {
            config.height = parse(ENV_HEIGHT, &value)?;
        }
        if let Some(value) = lookup(ENV_CELL_SIZE) {
            config.cell_size = parse(ENV_CELL_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_SPEED) {
            config.speed = parse(ENV_SPEED, &value)?;
        }
        if let Some(value) = lookup(ENV_GRID_LINES) {
            config.grid_lines = parse_flag(ENV_GRID_LINES, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks grid and cell sizes; speed is left to the caller
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyGrid {
                width: self.width,
                height: self.height,
            });
        }
        if self.cell_size.is_nan() || self.cell_size <= 0.0 {
            return Err(ConfigError::NonPositiveCellSize(self.cell_size));
        }
        Ok(())
    }

    /// Drawing surface size in physical pixels: one cell edge per grid cell
    pub fn surface_size(&self) -> (u32, u32) {
        let scale = |cells: usize| (cells as f32 * self.cell_size).ceil().max(1.0) as u32;
        (scale(self.width), scale(self.height))
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_owned(),
    })
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_owned(),
        }),
    }
}
