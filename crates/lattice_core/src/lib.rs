//! Lattice automata driven by local message passing.
//!
//! This crate provides:
//! - A double-buffered two-phase lattice engine (interaction, transport)
//! - A packed-integer signal codec and a reservation arbiter
//! - Six rule sets, from a plain lattice gas to self-reproducing pairs
//! - A render adapter producing RGB frames and PNG files
//! - JSON run configuration

pub mod automaton;
pub mod config;

pub use automaton::models::{
    DepthField, HeadOnCollision, HppGas, ModelKind, MovingLattices, RacePolicy, ReproducingPairs,
    SeedSquare,
};
pub use automaton::{
    BoundaryPolicy, ChannelGrid, ConfigError, Counters, Direction, Frame, GridError, Rule,
    StepError, StepReport, World,
};
pub use config::{ConfigFileError, ConfigResult, SimulationConfig};
