//! HPP lattice gas.
//!
//! Four particle bits per cell, no state. A head-on pair whose
//! perpendicular ports are empty leaves rotated by a quarter turn, every
//! other configuration passes through unchanged. Walls reflect.

use super::particle_bits;
use crate::automaton::rng::LatticeRng;
use crate::automaton::rule::{CellContext, ChannelLayout, Rule, RuleError};
use crate::automaton::transport::BoundaryPolicy;
use crate::automaton::{ChannelGrid, PORTS};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HppGas {
    /// Particle placement attempts in `populate`. Defaults to the cell count.
    pub particles: Option<usize>,
}

impl Rule for HppGas {
    fn name(&self) -> &'static str {
        "hpp_gas"
    }

    fn layout(&self) -> ChannelLayout {
        ChannelLayout::new(&[])
    }

    fn boundary(&self) -> BoundaryPolicy {
        BoundaryPolicy::Bounce
    }

    fn step_cell(
        &self,
        input: &[i32],
        output: &mut [i32],
        _ctx: &mut CellContext,
    ) -> Result<(), RuleError> {
        let mut p = particle_bits(input)?;

        let collides = (0..2).any(|i| p[i] && p[i + 2] && !p[i + 1] && !p[(i + 3) % PORTS]);
        if collides {
            p = p.map(|bit| !bit);
        }

        for (slot, bit) in output.iter_mut().zip(p) {
            *slot = bit as i32;
        }
        Ok(())
    }

    /// Fills the lower-left quadrant.
    fn populate(&self, grid: &mut ChannelGrid, rng: &mut dyn LatticeRng) {
        let (width, height) = (grid.width(), grid.height());
        let (qw, qh) = (width.div_ceil(2), height.div_ceil(2));
        for _ in 0..self.particles.unwrap_or(width * height) {
            let c = rng.next_usize_max(PORTS);
            let x = rng.next_usize_max(qw);
            let y = rng.next_usize_max(qh);
            grid.set(x, y, c, 1);
        }
    }

    fn color(&self, cell: &[i32]) -> [f32; 3] {
        let shared = cell[3] != 0;
        [0, 1, 2].map(|c| if cell[c] != 0 || shared { 1.0 } else { 0.0 })
    }
}
