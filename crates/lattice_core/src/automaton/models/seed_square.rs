//! A single seed growing into a diamond.
//!
//! Each cell keeps the largest value it has seen and passes that value
//! minus one to its neighbours, so a seed of value `n` fills every cell
//! within Manhattan distance `n` of it.

use crate::automaton::codec::CodecError;
use crate::automaton::rng::LatticeRng;
use crate::automaton::rule::{CellContext, ChannelLayout, Rule, RuleError};
use crate::automaton::world::ConfigError;
use crate::automaton::{ChannelGrid, PORTS};
use serde::{Deserialize, Serialize};

const VALUE: usize = PORTS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedSquare {
    pub seed_value: i32,
}

impl Default for SeedSquare {
    fn default() -> Self {
        Self { seed_value: 200 }
    }
}

impl SeedSquare {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seed_value <= 0 {
            return Err(ConfigError::InvalidParameter(format!(
                "seed_value must be positive, got {}",
                self.seed_value
            )));
        }
        Ok(())
    }
}

impl Rule for SeedSquare {
    fn name(&self) -> &'static str {
        "seed_square"
    }

    fn layout(&self) -> ChannelLayout {
        ChannelLayout::new(&["value"])
    }

    fn step_cell(
        &self,
        input: &[i32],
        output: &mut [i32],
        _ctx: &mut CellContext,
    ) -> Result<(), RuleError> {
        let value = input.iter().copied().max().unwrap_or(0);
        if let Some(&raw) = input.iter().find(|&&v| v < 0) {
            return Err(CodecError::invalid(raw, "values are never negative").into());
        }

        output[..PORTS].fill((value - 1).max(0));
        output[VALUE] = value;
        Ok(())
    }

    /// Places the seed at the centre cell.
    fn populate(&self, grid: &mut ChannelGrid, _rng: &mut dyn LatticeRng) {
        let (cx, cy) = (grid.width() / 2, grid.height() / 2);
        grid.cell_at_mut(cx, cy).fill(self.seed_value);
    }

    fn color(&self, cell: &[i32]) -> [f32; 3] {
        [0.0, cell[VALUE] as f32 / (self.seed_value + 1) as f32, 0.0]
    }
}
