//! The per-cell rule contract.
//!
//! A `Rule` is a pure transition from one cell's channel vector to its next
//! vector. The scheduler hands it the cell's input slice from the current
//! buffer and a zeroed output slice from the next buffer, so a rule cannot
//! observe or disturb its neighbours. Everything else it may use comes
//! through `CellContext`: the tick, the tick clock, the world counters as
//! they stood when the tick began, and a random substream private to the
//! cell.

use super::codec::CodecError;
use super::rng::LatticeRng;
use super::transport::BoundaryPolicy;
use super::{ChannelGrid, PORTS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single cell evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// A channel held a value no signal or state decodes to. The scheduler
    /// absorbs the cell instead of failing the tick.
    #[error(transparent)]
    InvalidEncoding(#[from] CodecError),
    /// The rule cannot produce a next vector. Fails the whole tick.
    #[error("rule fault: {0}")]
    Fault(String),
}

/// Channel layout declared by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    /// Names of the channels after the four directional ones.
    pub state: Vec<&'static str>,
}

impl ChannelLayout {
    pub fn new(state: &[&'static str]) -> Self {
        Self {
            state: state.to_vec(),
        }
    }

    /// Total channels per cell.
    pub fn channels(&self) -> usize {
        PORTS + self.state.len()
    }

    /// Channel index of a named state channel.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.state.iter().position(|&n| n == name).map(|i| PORTS + i)
    }
}

/// World-global tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Rule-defined events, e.g. completed reproductions.
    pub events: u64,
    /// Cells reset by the absorb fallback.
    pub absorbed: u64,
}

/// Everything a cell evaluation may read besides its own vector.
pub struct CellContext<'a> {
    /// Tick being evaluated, starting at 0.
    pub tick: u64,
    /// Counters as of the start of this tick.
    pub counters: Counters,
    /// Random substream private to this cell and tick.
    pub random: &'a mut dyn LatticeRng,
    events: u64,
}

impl<'a> CellContext<'a> {
    pub fn new(tick: u64, counters: Counters, random: &'a mut dyn LatticeRng) -> Self {
        Self {
            tick,
            counters,
            random,
            events: 0,
        }
    }

    /// Tick clock. High on even ticks, so it reads high on the first one.
    #[inline]
    pub fn clock(&self) -> bool {
        self.tick % 2 == 0
    }

    /// Tally one rule event into the world counters.
    pub fn record_event(&mut self) {
        self.events += 1;
    }

    /// Events recorded during this evaluation.
    pub fn events(&self) -> u64 {
        self.events
    }
}

/// A lattice rule set.
///
/// Implementors must be total: `step_cell` either fills `output` or returns
/// `RuleError::InvalidEncoding`, in which case `absorb` is applied instead.
pub trait Rule: Send + Sync {
    /// Short identifier used in logs and configs.
    fn name(&self) -> &'static str;

    /// Channel layout. The channel count is fixed for the rule's lifetime.
    fn layout(&self) -> ChannelLayout;

    /// Edge behaviour of the transport phase.
    fn boundary(&self) -> BoundaryPolicy {
        BoundaryPolicy::Wrap
    }

    /// Compute the next vector of one cell.
    ///
    /// `output` is zeroed on entry; channels the rule leaves untouched are
    /// zero next tick.
    fn step_cell(
        &self,
        input: &[i32],
        output: &mut [i32],
        ctx: &mut CellContext,
    ) -> Result<(), RuleError>;

    /// Fallback for cells whose input does not decode: drop the
    /// directional channels and keep the state channels.
    fn absorb(&self, input: &[i32], output: &mut [i32]) {
        output[..PORTS].fill(0);
        output[PORTS..].copy_from_slice(&input[PORTS..]);
    }

    /// Fill a zeroed grid with a random initial condition.
    fn populate(&self, grid: &mut ChannelGrid, rng: &mut dyn LatticeRng);

    /// Display color of a cell, each component in [0, 1].
    fn color(&self, cell: &[i32]) -> [f32; 3];
}
