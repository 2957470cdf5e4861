//! Double-buffered two-phase scheduler.
//!
//! `World` owns the current grid, a scratch grid of the same shape, the
//! rule, the tick counter and the world counters. A tick is:
//!
//! 1. Interaction: every cell of the current grid is evaluated into the
//!    zeroed scratch grid. Cells are independent, so this runs on rayon
//!    with one disjoint output chunk per cell.
//! 2. Swap the buffers.
//! 3. Transport the directional planes of the new current grid.
//! 4. Advance the tick.
//!
//! A rule fault fails the tick and halts the world. The current grid is
//! left as it was before the failed tick.

use super::render::{render, Frame};
use super::rng::StdRandom;
use super::rule::{CellContext, Counters, Rule, RuleError};
use super::transport::transport;
use super::{ChannelGrid, GridError};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Errors raised while assembling a world.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("rule {rule} needs {expected} channels per cell, grid has {found}")]
    ChannelMismatch {
        rule: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Errors raised by `World::step`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("rule fault at ({x}, {y}) on tick {tick}: {message}")]
    RuleFault {
        tick: u64,
        x: usize,
        y: usize,
        message: String,
    },
    #[error("world halted: {reason}")]
    Halted { reason: String },
}

/// Summary of one completed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    /// Tick that was evaluated.
    pub tick: u64,
    /// Rule events recorded during the tick.
    pub events: u64,
    /// Cells absorbed during the tick.
    pub absorbed: u64,
}

/// Per-cell result of the interaction phase.
#[derive(Debug, Clone, Copy, Default)]
struct CellOutcome {
    events: u64,
    absorbed: u64,
}

impl CellOutcome {
    fn merge(self, other: Self) -> Self {
        Self {
            events: self.events + other.events,
            absorbed: self.absorbed + other.absorbed,
        }
    }
}

/// Fixed inputs of one interaction phase, shared by every cell.
#[derive(Clone, Copy)]
struct Phase<'a> {
    rule: &'a dyn Rule,
    tick: u64,
    seed: u64,
    counters: Counters,
}

impl Phase<'_> {
    /// Evaluate one cell into a zeroed output slice.
    ///
    /// Decode failures are absorbed here; faults are passed up.
    fn evaluate(&self, index: usize, input: &[i32], output: &mut [i32]) -> Result<CellOutcome, String> {
        output.fill(0);
        let mut random = StdRandom::for_cell(self.seed, self.tick, index);
        let mut ctx = CellContext::new(self.tick, self.counters, &mut random);

        match self.rule.step_cell(input, output, &mut ctx) {
            Ok(()) => Ok(CellOutcome {
                events: ctx.events(),
                absorbed: 0,
            }),
            Err(RuleError::InvalidEncoding(err)) => {
                debug!(rule = self.rule.name(), cell = index, tick = self.tick, %err, "cell absorbed");
                output.fill(0);
                self.rule.absorb(input, output);
                Ok(CellOutcome {
                    events: 0,
                    absorbed: 1,
                })
            }
            Err(RuleError::Fault(message)) => Err(message),
        }
    }

    /// Evaluate every cell of `current` into `next`.
    fn run(&self, current: &ChannelGrid, next: &mut ChannelGrid, parallel: bool) -> Result<CellOutcome, StepError> {
        let channels = current.channels();
        let input = current.values();
        let fault = |index: usize, message: String| {
            let (x, y) = current.coords(index);
            StepError::RuleFault {
                tick: self.tick,
                x,
                y,
                message,
            }
        };

        if parallel {
            next.values_mut()
                .par_chunks_mut(channels)
                .enumerate()
                .map(|(index, output)| {
                    let cell = &input[index * channels..(index + 1) * channels];
                    self.evaluate(index, cell, output).map_err(|m| fault(index, m))
                })
                .try_reduce(CellOutcome::default, |a, b| Ok(a.merge(b)))
        } else {
            let mut total = CellOutcome::default();
            for (index, output) in next.values_mut().chunks_mut(channels).enumerate() {
                let cell = &input[index * channels..(index + 1) * channels];
                let outcome = self.evaluate(index, cell, output).map_err(|m| fault(index, m))?;
                total = total.merge(outcome);
            }
            Ok(total)
        }
    }
}

/// A running lattice simulation.
pub struct World {
    rule: Box<dyn Rule>,
    grid: ChannelGrid,
    /// Scratch buffer the interaction phase writes into.
    next: ChannelGrid,
    seed: u64,
    tick: u64,
    counters: Counters,
    parallel: bool,
    halted: Option<String>,
}

impl World {
    /// Create a world with a random initial condition drawn from `seed`.
    pub fn new(width: usize, height: usize, rule: Box<dyn Rule>, seed: u64) -> Result<Self, ConfigError> {
        let mut grid = ChannelGrid::new(width, height, rule.layout().channels())?;
        let mut rng = StdRandom::from_u64_seed(seed);
        rule.populate(&mut grid, &mut rng);
        Self::assemble(grid, rule, seed)
    }

    /// Create a world from an explicit grid, e.g. a test fixture.
    pub fn with_grid(grid: ChannelGrid, rule: Box<dyn Rule>, seed: u64) -> Result<Self, ConfigError> {
        grid.validate()?;
        let expected = rule.layout().channels();
        if grid.channels() != expected {
            return Err(ConfigError::ChannelMismatch {
                rule: rule.name(),
                expected,
                found: grid.channels(),
            });
        }
        Self::assemble(grid, rule, seed)
    }

    fn assemble(grid: ChannelGrid, rule: Box<dyn Rule>, seed: u64) -> Result<Self, ConfigError> {
        info!(
            rule = rule.name(),
            width = grid.width(),
            height = grid.height(),
            channels = grid.channels(),
            seed,
            "world created"
        );
        let next = grid.clone();
        Ok(Self {
            rule,
            grid,
            next,
            seed,
            tick: 0,
            counters: Counters::default(),
            parallel: true,
            halted: None,
        })
    }

    /// Choose rayon or sequential evaluation of the interaction phase.
    /// Both produce identical grids.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Ticks completed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn rule(&self) -> &dyn Rule {
        self.rule.as_ref()
    }

    /// Current grid, valid between ticks.
    pub fn grid(&self) -> &ChannelGrid {
        &self.grid
    }

    /// Owned copy of the current grid.
    pub fn snapshot(&self) -> ChannelGrid {
        self.grid.clone()
    }

    /// Render the current grid.
    pub fn render(&self) -> Frame {
        render(&self.grid, self.rule.as_ref())
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    fn phase(&self) -> Phase<'_> {
        Phase {
            rule: self.rule.as_ref(),
            tick: self.tick,
            seed: self.seed,
            counters: self.counters,
        }
    }

    /// Next vector of a single cell, as the coming interaction phase would
    /// produce it.
    pub fn evaluate_cell(&self, index: usize) -> Result<Vec<i32>, StepError> {
        let (x, y) = self.grid.coords(index);
        let mut output = vec![0; self.grid.channels()];
        self.phase()
            .evaluate(index, self.grid.cell(index), &mut output)
            .map_err(|message| StepError::RuleFault {
                tick: self.tick,
                x,
                y,
                message,
            })?;
        Ok(output)
    }

    /// Result of the coming interaction phase, before transport. Does not
    /// advance the world.
    pub fn preview_interaction(&self) -> Result<ChannelGrid, StepError> {
        let mut next = self.grid.clone();
        self.phase().run(&self.grid, &mut next, self.parallel)?;
        Ok(next)
    }

    /// Advance one tick.
    pub fn step(&mut self) -> Result<StepReport, StepError> {
        if let Some(reason) = &self.halted {
            return Err(StepError::Halted {
                reason: reason.clone(),
            });
        }

        let outcome = {
            let phase = Phase {
                rule: self.rule.as_ref(),
                tick: self.tick,
                seed: self.seed,
                counters: self.counters,
            };
            match phase.run(&self.grid, &mut self.next, self.parallel) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(rule = self.rule.name(), tick = self.tick, %err, "world halted");
                    self.halted = Some(err.to_string());
                    return Err(err);
                }
            }
        };

        std::mem::swap(&mut self.grid, &mut self.next);
        transport(&mut self.grid, self.rule.boundary());

        self.counters.events += outcome.events;
        self.counters.absorbed += outcome.absorbed;
        let report = StepReport {
            tick: self.tick,
            events: outcome.events,
            absorbed: outcome.absorbed,
        };
        self.tick += 1;

        trace!(tick = report.tick, events = report.events, absorbed = report.absorbed, "tick");
        Ok(report)
    }

    /// Advance `ticks` ticks, stopping at the first failure.
    pub fn run(&mut self, ticks: u64) -> Result<Counters, StepError> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(self.counters)
    }
}
