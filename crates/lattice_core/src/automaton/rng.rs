//! Random number generator abstraction for lattice rules.
//!
//! Rules never own a generator. They draw from the `LatticeRng` handed to
//! them through the cell context, which lets the scheduler decide how
//! randomness is laid out across cells:
//!
//! - `StdRandom`: wraps `rand::rngs::StdRng`, used for random initial
//!   conditions and for the per-cell substreams of a tick
//! - `substream_seed`: derives the seed of one cell's substream from the
//!   run seed, the tick and the cell index
//!
//! Because every cell gets its own substream, a tick produces the same
//! result whether cells are evaluated sequentially, in parallel or in a
//! shuffled order.
//!
//! # Example
//!
//! ```ignore
//! use lattice_core::automaton::rng::{LatticeRng, StdRandom};
//!
//! let mut rng = StdRandom::from_u64_seed(42);
//! let bounded = rng.next_int_max(100); // 0..100
//! let float = rng.next_double(); // 0.0..1.0
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Trait for random number generators used by lattice rules.
pub trait LatticeRng {
    /// Returns a random integer in [0, max).
    fn next_int_max(&mut self, max: i32) -> i32;

    /// Returns a random double in [0.0, 1.0).
    fn next_double(&mut self) -> f64;

    /// Returns a random u64, used for seeding derived generators.
    fn next_u64(&mut self) -> u64;

    /// Returns a random usize in [0, max).
    /// Convenience method for array indexing.
    fn next_usize_max(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        ((self.next_double() * max as f64) as usize).min(max - 1)
    }

    /// Returns true with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.next_double() < p
    }

    /// Returns a random boolean.
    fn next_bool(&mut self) -> bool {
        self.chance(0.5)
    }
}

/// Shuffle a slice in place using Fisher-Yates algorithm.
/// This is a free function since generic methods aren't dyn-compatible.
pub fn shuffle_with_rng<T>(slice: &mut [T], rng: &mut dyn LatticeRng) {
    for i in (1..slice.len()).rev() {
        let j = rng.next_usize_max(i + 1);
        slice.swap(i, j);
    }
}

/// Standard Rust RNG wrapper using `rand::rngs::StdRng`.
#[derive(Clone)]
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    /// Create from a u64 seed directly.
    pub fn from_u64_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create a generator seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self::from_u64_seed(rand::random())
    }

    /// Create the substream for one cell of one tick.
    pub fn for_cell(seed: u64, tick: u64, cell: usize) -> Self {
        Self::from_u64_seed(substream_seed(seed, tick, cell))
    }
}

impl LatticeRng for StdRandom {
    fn next_int_max(&mut self, max: i32) -> i32 {
        if max <= 0 {
            return 0;
        }
        self.rng.gen_range(0..max)
    }

    fn next_double(&mut self) -> f64 {
        self.rng.gen()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.gen()
    }
}

/// SplitMix64 finalizer.
#[inline]
fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed of the random substream owned by `cell` during `tick`.
///
/// Distinct `(tick, cell)` pairs of one run map to well separated seeds, so
/// neighbouring cells never share a sequence.
pub fn substream_seed(seed: u64, tick: u64, cell: usize) -> u64 {
    const GOLDEN: u64 = 0x9E37_79B9_7F4A_7C15;
    let a = mix64(seed.wrapping_add(GOLDEN));
    let b = mix64(a ^ tick.wrapping_mul(GOLDEN));
    mix64(b ^ (cell as u64).wrapping_add(1).wrapping_mul(0xD1B5_4A32_D192_ED03))
}
