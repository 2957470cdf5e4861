//! Depth awareness inside aggregates of live cells.
//!
//! Every live cell takes the smallest depth its neighbours announced plus
//! one, then announces that depth on all four ports. Dead cells (depth 0)
//! stay dead and announce 0, so depth converges to the distance from the
//! nearest dead cell.

use super::check_probability;
use crate::automaton::codec::CodecError;
use crate::automaton::rng::LatticeRng;
use crate::automaton::rule::{CellContext, ChannelLayout, Rule, RuleError};
use crate::automaton::world::ConfigError;
use crate::automaton::{ChannelGrid, PORTS};
use serde::{Deserialize, Serialize};

const DEPTH: usize = PORTS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthField {
    /// Depth drawn at full brightness.
    pub target_depth: i32,
    /// Probability that a channel starts at 1.
    pub density: f64,
}

impl Default for DepthField {
    fn default() -> Self {
        Self {
            target_depth: 7,
            density: 0.9,
        }
    }
}

impl DepthField {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_depth <= 0 {
            return Err(ConfigError::InvalidParameter(format!(
                "target_depth must be positive, got {}",
                self.target_depth
            )));
        }
        check_probability("density", self.density)
    }
}

impl Rule for DepthField {
    fn name(&self) -> &'static str {
        "depth_field"
    }

    fn layout(&self) -> ChannelLayout {
        ChannelLayout::new(&["depth"])
    }

    fn step_cell(
        &self,
        input: &[i32],
        output: &mut [i32],
        _ctx: &mut CellContext,
    ) -> Result<(), RuleError> {
        if let Some(&raw) = input.iter().find(|&&v| v < 0) {
            return Err(CodecError::invalid(raw, "depths are never negative").into());
        }
        if input[DEPTH] == 0 {
            return Ok(());
        }

        let nearest = input[..PORTS].iter().copied().min().unwrap_or(0);
        let depth = nearest.saturating_add(1);
        output[..PORTS].fill(depth);
        output[DEPTH] = depth;
        Ok(())
    }

    fn populate(&self, grid: &mut ChannelGrid, rng: &mut dyn LatticeRng) {
        for v in grid.values_mut() {
            *v = rng.chance(self.density) as i32;
        }
    }

    fn color(&self, cell: &[i32]) -> [f32; 3] {
        match cell[DEPTH] {
            0 => [0.2, 0.15, 0.0],
            depth => [0.0, depth as f32 / self.target_depth as f32, 0.0],
        }
    }
}
