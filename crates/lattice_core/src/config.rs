//! Simulation configuration.
//!
//! A run is described by a `SimulationConfig`: grid size, seed, evaluation
//! mode, the model with its parameters and an optional fixture grid. The
//! config is stored as JSON.
//!
//! # Example
//!
//! ```ignore
//! use lattice_core::SimulationConfig;
//!
//! let config = SimulationConfig::load("runs/pairs.json")?;
//! let mut world = config.build_world()?;
//! world.run(500)?;
//! ```
//!
//! ```json
//! {
//!   "width": 128,
//!   "height": 96,
//!   "seed": 7,
//!   "model": { "kind": "reproducing_pairs", "patience": 80 }
//! }
//! ```

use crate::automaton::models::{ModelKind, ReproducingPairs};
use crate::automaton::{ChannelGrid, ConfigError, GridError, LatticeRng, StdRandom, World};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors raised while loading or saving a config file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type ConfigResult<T> = Result<T, ConfigFileError>;

/// Everything needed to start a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub width: usize,
    pub height: usize,
    /// Run seed. Drawn from OS entropy when absent.
    pub seed: Option<u64>,
    /// Evaluate the interaction phase on the rayon pool.
    pub parallel: bool,
    pub model: ModelKind,
    /// Fixture grid used instead of the model's random population.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_grid: Option<ChannelGrid>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            seed: None,
            parallel: true,
            model: ModelKind::ReproducingPairs(ReproducingPairs::default()),
            initial_grid: None,
        }
    }
}

impl SimulationConfig {
    /// Read and validate a JSON config.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(GridError::ZeroDimension {
                width: self.width,
                height: self.height,
            }
            .into());
        }
        self.model.validate()?;

        if let Some(grid) = &self.initial_grid {
            grid.validate()?;
            if (grid.width(), grid.height()) != (self.width, self.height) {
                return Err(ConfigError::InvalidParameter(format!(
                    "initial grid is {}x{}, config asks for {}x{}",
                    grid.width(),
                    grid.height(),
                    self.width,
                    self.height
                )));
            }
        }
        Ok(())
    }

    /// The configured seed, or a fresh one from OS entropy.
    pub fn resolved_seed(&self) -> u64 {
        self.seed
            .unwrap_or_else(|| StdRandom::from_entropy().next_u64())
    }

    /// Validate and assemble the world.
    pub fn build_world(&self) -> Result<World, ConfigError> {
        self.validate()?;
        let rule = self.model.clone().into_rule()?;
        let seed = self.resolved_seed();
        info!(model = self.model.name(), seed, "building world");

        let mut world = match &self.initial_grid {
            Some(grid) => World::with_grid(grid.clone(), rule, seed)?,
            None => World::new(self.width, self.height, rule, seed)?,
        };
        world.set_parallel(self.parallel);
        Ok(world)
    }
}
