//! Transport stage: moves directional channels to neighbouring cells.
//!
//! Channel `d` of every cell is shifted one cell along `Direction d`. The
//! four planes are independent, so each output plane is computed from a
//! copy of the input planes and they are built in parallel. State channels
//! are never touched.
//!
//! Edge behaviour is chosen per rule:
//! - `Wrap`: the grid is a torus, a value leaving one edge enters at the
//!   opposite edge
//! - `Bounce`: a value that would leave the grid is written into the
//!   opposite-direction channel of the same cell instead, which reflects it
//!   off the wall on the next transport

use super::{ChannelGrid, Direction, PORTS};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Edge behaviour of the transport phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Toroidal wraparound.
    #[default]
    Wrap,
    /// Reflecting walls.
    Bounce,
}

/// Shift every directional plane of `grid` by one cell.
pub fn transport(grid: &mut ChannelGrid, policy: BoundaryPolicy) {
    let (width, height, channels) = (grid.width(), grid.height(), grid.channels());
    let planes: Vec<Vec<i32>> = (0..PORTS).map(|c| grid.plane(c)).collect();

    let shifted: Vec<Vec<i32>> = (0..PORTS)
        .into_par_iter()
        .map(|c| shift_plane(&planes, Direction::ALL[c], width, height, policy))
        .collect();

    let values = grid.values_mut();
    for (c, plane) in shifted.iter().enumerate() {
        for (cell, &value) in plane.iter().enumerate() {
            values[cell * channels + c] = value;
        }
    }
}

/// Build the next contents of plane `dir`.
fn shift_plane(
    planes: &[Vec<i32>],
    dir: Direction,
    width: usize,
    height: usize,
    policy: BoundaryPolicy,
) -> Vec<i32> {
    let source = &planes[dir.index()];
    let mut out = vec![0; width * height];

    for y in 0..height {
        for x in 0..width {
            let value = source[x + y * width];
            if value == 0 {
                continue;
            }
            match (policy, step(x, y, dir, width, height)) {
                (_, Some((nx, ny))) => out[nx + ny * width] = value,
                (BoundaryPolicy::Wrap, None) => {
                    let (nx, ny) = wrap(x, y, dir, width, height);
                    out[nx + ny * width] = value;
                }
                // Reflected into the opposite plane, picked up below.
                (BoundaryPolicy::Bounce, None) => {}
            }
        }
    }

    if policy == BoundaryPolicy::Bounce {
        // Values of the opposite plane that hit a wall land here, in place.
        let back = dir.opposite();
        let reflected = &planes[back.index()];
        for y in 0..height {
            for x in 0..width {
                let value = reflected[x + y * width];
                if value != 0 && step(x, y, back, width, height).is_none() {
                    out[x + y * width] = value;
                }
            }
        }
    }

    out
}

/// In-bounds neighbour of `(x, y)` in `dir`.
#[inline]
fn step(x: usize, y: usize, dir: Direction, width: usize, height: usize) -> Option<(usize, usize)> {
    let (dx, dy) = dir.offset();
    let nx = x.checked_add_signed(dx)?;
    let ny = y.checked_add_signed(dy)?;
    (nx < width && ny < height).then_some((nx, ny))
}

/// Toroidal neighbour of `(x, y)` in `dir`.
#[inline]
fn wrap(x: usize, y: usize, dir: Direction, width: usize, height: usize) -> (usize, usize) {
    let (dx, dy) = dir.offset();
    (
        (x as isize + dx).rem_euclid(width as isize) as usize,
        (y as isize + dy).rem_euclid(height as isize) as usize,
    )
}
