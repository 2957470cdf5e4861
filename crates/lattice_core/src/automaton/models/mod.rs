//! Concrete rule sets.
//!
//! Each model is a plain parameter struct that implements `Rule`. The
//! structs double as their own serde config, and `ModelKind` selects one
//! of them by name.
//!
//! | Model | Channels | Boundary |
//! |-------|----------|----------|
//! | `HeadOnCollision` | 4 + rest | wrap |
//! | `HppGas` | 4 | bounce |
//! | `DepthField` | 4 + depth | wrap |
//! | `SeedSquare` | 4 + value | wrap |
//! | `MovingLattices` | 4 + state, heading | wrap |
//! | `ReproducingPairs` | 4 + state, data, timer | wrap |

mod depth_field;
mod head_on;
mod hpp_gas;
mod moving_lattices;
mod reproducing_pairs;
mod seed_square;

pub use depth_field::DepthField;
pub use head_on::HeadOnCollision;
pub use hpp_gas::HppGas;
pub use moving_lattices::{LatticeState, MovingLattices, MovingSignal};
pub use reproducing_pairs::{PairSignal, PairState, RacePolicy, ReproducingPairs, Side, TravellingSeed};
pub use seed_square::SeedSquare;

use super::codec::CodecError;
use super::rng::LatticeRng;
use super::rule::Rule;
use super::world::ConfigError;
use super::{Direction, PORTS};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Rule selection with per-model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    HeadOnCollision(HeadOnCollision),
    HppGas(HppGas),
    DepthField(DepthField),
    SeedSquare(SeedSquare),
    MovingLattices(MovingLattices),
    ReproducingPairs(ReproducingPairs),
}

impl ModelKind {
    /// Names accepted by `from_str`.
    pub const NAMES: [&'static str; 6] = [
        "head_on_collision",
        "hpp_gas",
        "depth_field",
        "seed_square",
        "moving_lattices",
        "reproducing_pairs",
    ];

    pub fn name(&self) -> &'static str {
        self.as_rule().name()
    }

    fn as_rule(&self) -> &dyn Rule {
        match self {
            ModelKind::HeadOnCollision(m) => m,
            ModelKind::HppGas(m) => m,
            ModelKind::DepthField(m) => m,
            ModelKind::SeedSquare(m) => m,
            ModelKind::MovingLattices(m) => m,
            ModelKind::ReproducingPairs(m) => m,
        }
    }

    /// Check the model parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            ModelKind::HeadOnCollision(_) | ModelKind::HppGas(_) => Ok(()),
            ModelKind::DepthField(m) => m.validate(),
            ModelKind::SeedSquare(m) => m.validate(),
            ModelKind::MovingLattices(m) => m.validate(),
            ModelKind::ReproducingPairs(m) => m.validate(),
        }
    }

    /// Validate and box the rule.
    pub fn into_rule(self) -> Result<Box<dyn Rule>, ConfigError> {
        self.validate()?;
        let rule: Box<dyn Rule> = match self {
            ModelKind::HeadOnCollision(m) => Box::new(m),
            ModelKind::HppGas(m) => Box::new(m),
            ModelKind::DepthField(m) => Box::new(m),
            ModelKind::SeedSquare(m) => Box::new(m),
            ModelKind::MovingLattices(m) => Box::new(m),
            ModelKind::ReproducingPairs(m) => Box::new(m),
        };
        Ok(rule)
    }
}

/// Model with default parameters, by name.
impl FromStr for ModelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "head_on_collision" => Ok(ModelKind::HeadOnCollision(HeadOnCollision::default())),
            "hpp_gas" => Ok(ModelKind::HppGas(HppGas::default())),
            "depth_field" => Ok(ModelKind::DepthField(DepthField::default())),
            "seed_square" => Ok(ModelKind::SeedSquare(SeedSquare::default())),
            "moving_lattices" => Ok(ModelKind::MovingLattices(MovingLattices::default())),
            "reproducing_pairs" => Ok(ModelKind::ReproducingPairs(ReproducingPairs::default())),
            other => Err(ConfigError::InvalidParameter(format!(
                "unknown model '{}', expected one of: {}",
                other,
                Self::NAMES.join(", ")
            ))),
        }
    }
}

/// Read the four directional channels as particle occupancy bits.
fn particle_bits(cell: &[i32]) -> Result<[bool; PORTS], CodecError> {
    let mut bits = [false; PORTS];
    for (bit, &raw) in bits.iter_mut().zip(&cell[..PORTS]) {
        *bit = match raw {
            0 => false,
            1 => true,
            _ => return Err(CodecError::invalid(raw, "particle channels hold 0 or 1")),
        };
    }
    Ok(bits)
}

/// Uniformly random direction.
fn random_direction(rng: &mut dyn LatticeRng) -> Direction {
    Direction::ALL[rng.next_usize_max(PORTS)]
}

/// Keep `heading`, or with probability `jitter` replace it by a random one.
fn jittered(heading: Direction, jitter: f64, rng: &mut dyn LatticeRng) -> Direction {
    if rng.chance(jitter) {
        random_direction(rng)
    } else {
        heading
    }
}

fn check_probability(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}
