//! Head-on collision gas.
//!
//! One particle kind on four directional bits plus a `rest` marker:
//! - a particle entering a rest cell is sent back the way it came
//! - two particles meeting head-on on one axis annihilate and leave a rest
//!   marker behind
//! - anything else keeps moving

use super::particle_bits;
use crate::automaton::codec::{rotate_half, CodecError};
use crate::automaton::rng::LatticeRng;
use crate::automaton::rule::{CellContext, ChannelLayout, Rule, RuleError};
use crate::automaton::{ChannelGrid, PORTS};
use serde::{Deserialize, Serialize};

const REST: usize = PORTS;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadOnCollision {
    /// Interior particles placed by `populate`. Defaults to the grid width.
    pub particles: Option<usize>,
}

fn rest_marker(raw: i32) -> Result<bool, CodecError> {
    match raw {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(CodecError::invalid(raw, "rest marker holds 0 or 1")),
    }
}

impl Rule for HeadOnCollision {
    fn name(&self) -> &'static str {
        "head_on_collision"
    }

    fn layout(&self) -> ChannelLayout {
        ChannelLayout::new(&["rest"])
    }

    fn step_cell(
        &self,
        input: &[i32],
        output: &mut [i32],
        _ctx: &mut CellContext,
    ) -> Result<(), RuleError> {
        let mut particles = particle_bits(input)?;
        let mut rest = rest_marker(input[REST])?;

        if rest {
            particles = rotate_half(particles);
        }
        for axis in 0..2 {
            if particles[axis] && particles[axis + 2] {
                particles[axis] = false;
                particles[axis + 2] = false;
                rest = true;
            }
        }

        for (slot, bit) in output.iter_mut().zip(particles) {
            *slot = bit as i32;
        }
        output[REST] = rest as i32;
        Ok(())
    }

    fn absorb(&self, input: &[i32], output: &mut [i32]) {
        output[..PORTS].fill(0);
        output[REST] = (input[REST] != 0) as i32;
    }

    fn populate(&self, grid: &mut ChannelGrid, rng: &mut dyn LatticeRng) {
        let (width, height) = (grid.width(), grid.height());
        for y in 0..height {
            for x in 0..width {
                if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                    grid.set(x, y, REST, 1);
                }
            }
        }

        if width < 3 || height < 3 {
            return;
        }
        for _ in 0..self.particles.unwrap_or(width) {
            let x = 1 + rng.next_usize_max(width - 2);
            let y = 1 + rng.next_usize_max(height - 2);
            let c = rng.next_usize_max(PORTS);
            grid.set(x, y, c, 1);
        }
    }

    fn color(&self, cell: &[i32]) -> [f32; 3] {
        if cell[REST] != 0 {
            return [1.0, 1.0, 0.0];
        }
        let count = cell[..PORTS].iter().filter(|&&v| v != 0).count();
        if count == 0 {
            [0.0; 3]
        } else {
            let level = 0.4 + 0.15 * count as f32;
            [level; 3]
        }
    }
}
