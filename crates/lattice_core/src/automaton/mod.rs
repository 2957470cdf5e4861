//! Lattice automaton engine.
//!
//! A fixed W×H grid of cells, each cell a fixed-length vector of integer
//! channels. Every tick runs two phases:
//!
//! 1. Interaction: a `Rule` maps each cell's channel vector to a new one,
//!    reading nothing but that cell.
//! 2. Transport: the four directional channel planes are shifted one cell
//!    along their direction, which is the only way information crosses
//!    cell boundaries.
//!
//! This module provides:
//! - `ChannelGrid`: flat channel storage with the grid geometry
//! - `codec`: packed-integer signal encoding, `find`, port rotation
//! - `arbiter`: resolution of competing reservation requests
//! - `rule`: the per-cell rule contract and its context
//! - `transport`: wrap and bounce shifting of directional planes
//! - `world`: the double-buffered two-phase scheduler
//! - `render`: snapshot to RGB frame conversion
//! - `models`: the concrete rule sets
//!
//! ## Example
//!
//! ```ignore
//! use lattice_core::automaton::{models::MovingLattices, World};
//!
//! let mut world = World::new(64, 64, Box::new(MovingLattices::default()), 42)?;
//! world.run(100)?;
//! let frame = world.render();
//! ```

pub mod arbiter;
pub mod codec;
pub mod models;
pub mod render;
pub mod rng;
pub mod rule;
pub mod transport;
pub mod world;

pub use arbiter::{arbitrate, replies, Replies};
pub use codec::{
    decode_ports, encode_ports, find, packed_field, rotate_half, CodecError, SignalCodec,
};
pub use render::{render, Frame};
pub use rng::{shuffle_with_rng, substream_seed, LatticeRng, StdRandom};
pub use rule::{CellContext, ChannelLayout, Counters, Rule, RuleError};
pub use transport::{transport, BoundaryPolicy};
pub use world::{ConfigError, StepError, StepReport, World};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of directional channels at the front of every cell.
pub const PORTS: usize = 4;

/// Largest number of channel slots a grid may hold.
pub const MAX_SLOTS: usize = 1 << 28;

/// Errors raised when building or validating a grid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid dimensions must be positive, got {width}x{height}")]
    ZeroDimension { width: usize, height: usize },
    #[error("cells need at least 4 channels, got {0}")]
    TooFewChannels(usize),
    #[error("grid of {width}x{height}x{channels} exceeds the slot limit")]
    TooLarge {
        width: usize,
        height: usize,
        channels: usize,
    },
    #[error("expected {expected} channel values, got {found}")]
    LengthMismatch { expected: usize, found: usize },
}

/// Axis of a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

/// One of the four cardinal directions. The discriminant is the index of
/// the directional channel bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    PlusX = 0,
    PlusY = 1,
    MinusX = 2,
    MinusY = 3,
}

impl Direction {
    /// All directions in channel scan order.
    pub const ALL: [Direction; 4] = [
        Direction::PlusX,
        Direction::PlusY,
        Direction::MinusX,
        Direction::MinusY,
    ];

    /// Direction bound to channel `index`, if it is a directional channel.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Like `from_index` for raw channel values.
    pub fn from_raw(raw: i32) -> Option<Self> {
        usize::try_from(raw).ok().and_then(Self::from_index)
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn opposite(self) -> Self {
        Self::ALL[(self.index() + 2) % 4]
    }

    #[inline]
    pub fn clockwise(self) -> Self {
        Self::ALL[(self.index() + 1) % 4]
    }

    #[inline]
    pub fn counter_clockwise(self) -> Self {
        Self::ALL[(self.index() + 3) % 4]
    }

    pub fn axis(self) -> Axis {
        match self {
            Direction::PlusX | Direction::MinusX => Axis::X,
            Direction::PlusY | Direction::MinusY => Axis::Y,
        }
    }

    /// Grid step taken by a value moving in this direction.
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::PlusX => (1, 0),
            Direction::PlusY => (0, 1),
            Direction::MinusX => (-1, 0),
            Direction::MinusY => (0, -1),
        }
    }
}

/// A W×H grid of cells with `channels` integer slots each.
///
/// Storage is flat and cell-major: `index = (x + y * width) * channels + c`,
/// so one cell's vector is a contiguous slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelGrid {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<i32>,
}

impl ChannelGrid {
    /// Create a grid with every channel zeroed.
    pub fn new(width: usize, height: usize, channels: usize) -> Result<Self, GridError> {
        let slots = Self::slot_count(width, height, channels)?;
        Ok(Self {
            width,
            height,
            channels,
            data: vec![0; slots],
        })
    }

    /// Create a grid from existing cell-major channel values.
    pub fn from_values(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<i32>,
    ) -> Result<Self, GridError> {
        let grid = Self {
            width,
            height,
            channels,
            data,
        };
        grid.validate()?;
        Ok(grid)
    }

    fn slot_count(width: usize, height: usize, channels: usize) -> Result<usize, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::ZeroDimension { width, height });
        }
        if channels < PORTS {
            return Err(GridError::TooFewChannels(channels));
        }
        width
            .checked_mul(height)
            .and_then(|cells| cells.checked_mul(channels))
            .filter(|&slots| slots <= MAX_SLOTS)
            .ok_or(GridError::TooLarge {
                width,
                height,
                channels,
            })
    }

    /// Check the shape invariants. Grids built through the constructors
    /// always pass; deserialized ones may not.
    pub fn validate(&self) -> Result<(), GridError> {
        let expected = Self::slot_count(self.width, self.height, self.channels)?;
        if self.data.len() != expected {
            return Err(GridError::LengthMismatch {
                expected,
                found: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Channels per cell.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Cell index for `(x, y)`, or `None` when out of bounds.
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| x + y * self.width)
    }

    /// Coordinates of a cell index.
    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    /// Channel vector of the cell at `index`.
    #[inline]
    pub fn cell(&self, index: usize) -> &[i32] {
        let start = index * self.channels;
        &self.data[start..start + self.channels]
    }

    #[inline]
    pub fn cell_mut(&mut self, index: usize) -> &mut [i32] {
        let start = index * self.channels;
        &mut self.data[start..start + self.channels]
    }

    /// Channel vector of the cell at `(x, y)`.
    ///
    /// # Panics
    /// Panics if `(x, y)` is out of bounds.
    pub fn cell_at(&self, x: usize, y: usize) -> &[i32] {
        assert!(x < self.width && y < self.height, "cell ({x}, {y}) out of bounds");
        self.cell(x + y * self.width)
    }

    /// Mutable channel vector of the cell at `(x, y)`.
    ///
    /// # Panics
    /// Panics if `(x, y)` is out of bounds.
    pub fn cell_at_mut(&mut self, x: usize, y: usize) -> &mut [i32] {
        assert!(x < self.width && y < self.height, "cell ({x}, {y}) out of bounds");
        self.cell_mut(x + y * self.width)
    }

    /// Value of channel `c` at `(x, y)`.
    pub fn get(&self, x: usize, y: usize, c: usize) -> i32 {
        self.cell_at(x, y)[c]
    }

    /// Set channel `c` at `(x, y)`.
    pub fn set(&mut self, x: usize, y: usize, c: usize, value: i32) {
        self.cell_at_mut(x, y)[c] = value;
    }

    /// Cell index of the neighbour of `index` in `dir`, wrapping at the edges.
    pub fn wrapped_neighbor(&self, index: usize, dir: Direction) -> usize {
        let (x, y) = self.coords(index);
        let (dx, dy) = dir.offset();
        let nx = (x as isize + dx).rem_euclid(self.width as isize) as usize;
        let ny = (y as isize + dy).rem_euclid(self.height as isize) as usize;
        nx + ny * self.width
    }

    /// Cell index of the neighbour of `index` in `dir`, or `None` past an edge.
    pub fn bounded_neighbor(&self, index: usize, dir: Direction) -> Option<usize> {
        let (x, y) = self.coords(index);
        let (dx, dy) = dir.offset();
        let nx = x.checked_add_signed(dx)?;
        let ny = y.checked_add_signed(dy)?;
        self.index(nx, ny)
    }

    /// Values of channel `c` for every cell, in cell order.
    pub fn plane(&self, c: usize) -> Vec<i32> {
        self.data
            .iter()
            .skip(c)
            .step_by(self.channels)
            .copied()
            .collect()
    }

    /// Iterate over cell vectors in cell order.
    pub fn cells(&self) -> std::slice::Chunks<'_, i32> {
        self.data.chunks(self.channels)
    }

    /// Raw cell-major storage.
    pub fn values(&self) -> &[i32] {
        &self.data
    }

    pub fn values_mut(&mut self) -> &mut [i32] {
        &mut self.data
    }

    /// Number of nonzero values across the four directional planes.
    pub fn count_directional(&self) -> usize {
        self.cells()
            .map(|cell| cell[..PORTS].iter().filter(|&&v| v != 0).count())
            .sum()
    }

    /// Zero every channel.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}
