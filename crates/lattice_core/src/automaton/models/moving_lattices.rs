//! Lattices that travel in a straight line until blocked.
//!
//! A moving lattice reserves the cell in front of it every tick. An empty
//! cell grants one reservation per tick through the arbiter and denies
//! the rest. On a grant the lattice vacates its cell and sends a seed
//! into the reserved cell, which becomes the lattice on the following
//! tick. A denied or blocked lattice comes to rest for good.
//!
//! A cell that granted a reservation stays claimed by that requester until
//! the seed lands, so a second lattice arriving a tick later is stopped
//! instead of being granted the same cell.
//!
//! Channels: four ports, `state`, `heading`. A claimed cell keeps the
//! channel of the granted request in `heading`.

use super::{check_probability, jittered, random_direction};
use crate::automaton::arbiter::{arbitrate, replies, Replies};
use crate::automaton::codec::{
    decode_ports, encode_ports, find, rotate_half, CodecError, SignalCodec,
};
use crate::automaton::rng::LatticeRng;
use crate::automaton::rule::{CellContext, ChannelLayout, Rule, RuleError};
use crate::automaton::world::ConfigError;
use crate::automaton::{ChannelGrid, Direction, PORTS};
use serde::{Deserialize, Serialize};

const STATE: usize = PORTS;
const HEADING: usize = PORTS + 1;

/// Signals exchanged on the directional channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovingSignal {
    Silent,
    Move,
    Stop,
    Reservation,
    /// Creates a lattice with the given heading in the receiving cell.
    Seed(Direction),
}

impl SignalCodec for MovingSignal {
    fn encode(self) -> i32 {
        match self {
            MovingSignal::Silent => 0,
            MovingSignal::Move => 2,
            MovingSignal::Stop => 3,
            MovingSignal::Reservation => 9,
            MovingSignal::Seed(dir) => 10 + dir.index() as i32,
        }
    }

    fn decode(raw: i32) -> Result<Self, CodecError> {
        match raw {
            0 => Ok(MovingSignal::Silent),
            2 => Ok(MovingSignal::Move),
            3 => Ok(MovingSignal::Stop),
            9 => Ok(MovingSignal::Reservation),
            10..=13 => Ok(MovingSignal::Seed(Direction::ALL[(raw - 10) as usize])),
            _ => Err(CodecError::invalid(raw, "unknown lattice signal")),
        }
    }
}

/// Contents of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatticeState {
    Empty,
    Moving(Direction),
    Resting(Direction),
    /// Empty, promised to the request arriving on this channel.
    Claimed(Direction),
}

impl LatticeState {
    fn decode(cell: &[i32]) -> Result<Self, CodecError> {
        let heading = || {
            Direction::from_raw(cell[HEADING])
                .ok_or(CodecError::invalid(cell[HEADING], "heading out of range"))
        };
        match cell[STATE] {
            0 => Ok(LatticeState::Empty),
            1 => Ok(LatticeState::Moving(heading()?)),
            2 => Ok(LatticeState::Resting(heading()?)),
            3 => Ok(LatticeState::Claimed(heading()?)),
            raw => Err(CodecError::invalid(raw, "unknown lattice state")),
        }
    }

    fn encode(self, cell: &mut [i32]) {
        let (state, heading) = match self {
            LatticeState::Empty => (0, 0),
            LatticeState::Moving(dir) => (1, dir.index() as i32),
            LatticeState::Resting(dir) => (2, dir.index() as i32),
            LatticeState::Claimed(channel) => (3, channel.index() as i32),
        };
        cell[STATE] = state;
        cell[HEADING] = heading;
    }
}

/// Heading carried by the first seed in scan order.
fn first_seed(ports: &[MovingSignal; PORTS]) -> Option<Direction> {
    let dir = find(ports, |s| matches!(s, MovingSignal::Seed(_)))?;
    match ports[dir.index()] {
        MovingSignal::Seed(heading) => Some(heading),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovingLattices {
    /// Lattices placed by `populate`. Defaults to twice the grid width.
    pub lattices: Option<usize>,
    /// Probability that a lattice picks a random heading when it moves.
    pub jitter: f64,
}

impl Default for MovingLattices {
    fn default() -> Self {
        Self {
            lattices: None,
            jitter: 0.05,
        }
    }
}

impl MovingLattices {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("jitter", self.jitter)
    }

    fn transition(
        &self,
        state: LatticeState,
        ports: [MovingSignal; PORTS],
        ctx: &mut CellContext,
    ) -> (LatticeState, [MovingSignal; PORTS]) {
        use MovingSignal::*;

        let mut out = [Silent; PORTS];
        match state {
            LatticeState::Empty | LatticeState::Claimed(_) => {
                if let Some(heading) = first_seed(&ports) {
                    return (LatticeState::Moving(heading), [Stop; PORTS]);
                }
                let requests = ports.map(|s| s == Reservation);
                if !requests.contains(&true) {
                    return (LatticeState::Empty, out);
                }
                let granted = match state {
                    LatticeState::Claimed(channel) if requests[channel.index()] => Some(channel),
                    _ => arbitrate(requests, ctx.random),
                };
                let codes = Replies {
                    grant: Move,
                    deny: Stop,
                    idle: Stop,
                };
                let next = granted.map_or(LatticeState::Empty, LatticeState::Claimed);
                (next, replies(requests, granted, codes))
            }
            LatticeState::Moving(heading) => match ports[heading.opposite().index()] {
                Move => {
                    out[heading.index()] = Seed(jittered(heading, self.jitter, ctx.random));
                    (LatticeState::Empty, out)
                }
                Stop | Reservation => (LatticeState::Resting(heading), out),
                _ => {
                    out[heading.index()] = Reservation;
                    (state, out)
                }
            },
            LatticeState::Resting(_) => {
                let out = rotate_half(ports.map(|s| if s == Reservation { Stop } else { Silent }));
                (state, out)
            }
        }
    }
}

impl Rule for MovingLattices {
    fn name(&self) -> &'static str {
        "moving_lattices"
    }

    fn layout(&self) -> ChannelLayout {
        ChannelLayout::new(&["state", "heading"])
    }

    fn step_cell(
        &self,
        input: &[i32],
        output: &mut [i32],
        ctx: &mut CellContext,
    ) -> Result<(), RuleError> {
        let ports = decode_ports::<MovingSignal>(input)?;
        let state = LatticeState::decode(input)?;

        let (next, out) = self.transition(state, ports, ctx);
        encode_ports(out, output);
        next.encode(output);
        Ok(())
    }

    /// Drops the ports, and the lattice too when its state is unreadable.
    fn absorb(&self, input: &[i32], output: &mut [i32]) {
        output.fill(0);
        if let Ok(state) = LatticeState::decode(input) {
            state.encode(output);
        }
    }

    fn populate(&self, grid: &mut ChannelGrid, rng: &mut dyn LatticeRng) {
        let (width, height) = (grid.width(), grid.height());
        for _ in 0..self.lattices.unwrap_or(2 * width) {
            let x = rng.next_usize_max(width);
            let y = rng.next_usize_max(height);
            LatticeState::Moving(random_direction(rng)).encode(grid.cell_at_mut(x, y));
        }
    }

    fn color(&self, cell: &[i32]) -> [f32; 3] {
        match cell[STATE] {
            1 => [1.0, 1.0, 1.0],
            2 => [0.2, 0.5, 1.0],
            _ if cell[..PORTS].iter().any(|v| (10..=13).contains(v)) => [0.6, 0.6, 0.6],
            _ => [0.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::rng::StdRandom;
    use MovingSignal::*;

    fn rule() -> MovingLattices {
        MovingLattices {
            lattices: None,
            jitter: 0.0,
        }
    }

    fn run(
        state: LatticeState,
        ports: [MovingSignal; 4],
        seed: u64,
    ) -> (LatticeState, [MovingSignal; 4]) {
        let mut rng = StdRandom::from_u64_seed(seed);
        let mut ctx = CellContext::new(0, Default::default(), &mut rng);
        rule().transition(state, ports, &mut ctx)
    }

    #[test]
    fn test_signal_codes() {
        for signal in [Silent, Move, Stop, Reservation, Seed(Direction::MinusY)] {
            assert_eq!(MovingSignal::decode(signal.encode()), Ok(signal));
        }
        assert_eq!(Seed(Direction::PlusY).encode(), 11);
        assert!(MovingSignal::decode(1).is_err());
        assert!(MovingSignal::decode(14).is_err());
    }

    #[test]
    fn test_empty_cell_becomes_lattice_on_seed() {
        let (next, out) = run(
            LatticeState::Empty,
            [Silent, Seed(Direction::MinusX), Reservation, Silent],
            0,
        );
        assert_eq!(next, LatticeState::Moving(Direction::MinusX));
        assert_eq!(out, [Stop; 4]);
    }

    #[test]
    fn test_empty_cell_grants_single_reservation() {
        // Request arrived in channel +x, so the requester sits at -x.
        let (next, out) = run(LatticeState::Empty, [Reservation, Silent, Silent, Silent], 0);
        assert_eq!(next, LatticeState::Claimed(Direction::PlusX));
        assert_eq!(out, [Stop, Stop, Move, Stop]);
    }

    #[test]
    fn test_claimed_cell_stops_latecomers() {
        let claimed = LatticeState::Claimed(Direction::PlusX);

        // The granted lattice's last request and a newcomer from -y.
        let (next, out) = run(claimed, [Reservation, Reservation, Silent, Silent], 3);
        assert_eq!(next, claimed);
        assert_eq!(out, [Stop, Stop, Move, Stop]);

        let (next, _) = run(claimed, [Silent, Silent, Silent, Seed(Direction::PlusX)], 0);
        assert_eq!(next, LatticeState::Moving(Direction::PlusX));

        let (next, out) = run(claimed, [Silent; 4], 0);
        assert_eq!((next, out), (LatticeState::Empty, [Silent; 4]));
    }

    #[test]
    fn test_empty_cell_grants_one_of_many() {
        let (_, out) = run(LatticeState::Empty, [Reservation, Silent, Reservation, Silent], 3);
        assert_eq!(out.iter().filter(|&&s| s == Move).count(), 1);
        assert_eq!(out.iter().filter(|&&s| s == Stop).count(), 3);
        assert!(out[1] == Stop && out[3] == Stop);
    }

    #[test]
    fn test_quiet_empty_cell_stays_silent() {
        assert_eq!(run(LatticeState::Empty, [Silent; 4], 0), (LatticeState::Empty, [Silent; 4]));
    }

    #[test]
    fn test_moving_lattice_reserves_ahead() {
        let (next, out) = run(LatticeState::Moving(Direction::PlusY), [Silent; 4], 0);
        assert_eq!(next, LatticeState::Moving(Direction::PlusY));
        assert_eq!(out, [Silent, Reservation, Silent, Silent]);
    }

    #[test]
    fn test_moving_lattice_moves_on_grant() {
        // A Move from the cell at +y arrives in the -y channel.
        let (next, out) = run(
            LatticeState::Moving(Direction::PlusY),
            [Silent, Silent, Silent, Move],
            0,
        );
        assert_eq!(next, LatticeState::Empty);
        assert_eq!(out, [Silent, Seed(Direction::PlusY), Silent, Silent]);
    }

    #[test]
    fn test_moving_lattice_rests_when_blocked() {
        for blocker in [Stop, Reservation] {
            let mut ports = [Silent; 4];
            ports[Direction::MinusX.index()] = blocker;
            let (next, out) = run(LatticeState::Moving(Direction::PlusX), ports, 0);
            assert_eq!(next, LatticeState::Resting(Direction::PlusX));
            assert_eq!(out, [Silent; 4]);
        }
    }

    #[test]
    fn test_signals_from_behind_are_ignored() {
        let (next, out) = run(
            LatticeState::Moving(Direction::PlusX),
            [Stop, Silent, Silent, Silent],
            0,
        );
        assert_eq!(next, LatticeState::Moving(Direction::PlusX));
        assert_eq!(out[Direction::PlusX.index()], Reservation);
    }

    #[test]
    fn test_resting_lattice_refuses_reservations() {
        let (next, out) = run(
            LatticeState::Resting(Direction::MinusY),
            [Silent, Reservation, Silent, Silent],
            0,
        );
        assert_eq!(next, LatticeState::Resting(Direction::MinusY));
        assert_eq!(out, [Silent, Silent, Silent, Stop]);
    }

    #[test]
    fn test_bad_state_is_absorbed_to_empty() {
        let mut output = [7; 6];
        rule().absorb(&[2, 0, 0, 0, 5, 1], &mut output);
        assert_eq!(output, [0; 6]);

        rule().absorb(&[2, 0, 99, 0, 2, 3], &mut output);
        assert_eq!(output, [0, 0, 0, 0, 2, 3]);
    }

    #[test]
    fn test_step_cell_reports_invalid_ports() {
        let mut rng = StdRandom::from_u64_seed(0);
        let mut ctx = CellContext::new(0, Default::default(), &mut rng);
        let mut output = [0; 6];
        let result = rule().step_cell(&[0, 77, 0, 0, 0, 0], &mut output, &mut ctx);
        assert!(matches!(result, Err(RuleError::InvalidEncoding(_))));
    }

    #[test]
    fn test_populate_places_moving_lattices() {
        let mut grid = ChannelGrid::new(8, 8, 6).unwrap();
        let rule = MovingLattices {
            lattices: Some(10),
            jitter: 0.05,
        };
        rule.populate(&mut grid, &mut StdRandom::from_u64_seed(6));
        let moving = grid.cells().filter(|c| c[STATE] == 1).count();
        assert!((1..=10).contains(&moving));
        assert!(grid.cells().all(|c| LatticeState::decode(c).is_ok()));
    }
}
