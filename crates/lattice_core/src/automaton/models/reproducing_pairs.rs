//! Pairs of lattices that reproduce by grabbing passers-by.
//!
//! Free lattices drift in a straight line. Two free lattices that meet
//! head-on lock into a pair of grabbers. A grabber tries to grab free
//! lattices passing on either side of the pair axis and tells its
//! partner which side it holds. Once both partners hold a lattice on the
//! same side they release them together as a travelling pair, a child
//! that walks a few steps away in lockstep before settling as a new pair
//! of grabbers.
//!
//! Channels: four ports, `state`, `data` and `timer`. `data` holds the
//! heading, the partner direction, the packed travelling seed or the
//! claimed channel depending on the state; `timer` holds the patience of
//! grabbers and travelling children.
//!
//! State codes: 0 empty, 1 free, 2 grabber, 3 travelling, 4 claimed, and
//! a negative value `-n` for a grabber recovering from a release with `n`
//! ticks left.
//!
//! An empty cell that grants a reservation becomes claimed: it keeps
//! granting the same requester and turns every other requester away until
//! the lattice arrives or the requester gives up. A cell is therefore
//! never promised to two lattices at once.

use super::{check_probability, jittered, random_direction};
use crate::automaton::arbiter::{arbitrate, replies, Replies};
use crate::automaton::codec::{
    decode_ports, encode_ports, find, packed_field, rotate_half, CodecError, SignalCodec,
};
use crate::automaton::rng::LatticeRng;
use crate::automaton::rule::{CellContext, ChannelLayout, Rule, RuleError};
use crate::automaton::world::ConfigError;
use crate::automaton::{Axis, ChannelGrid, Direction, PORTS};
use serde::{Deserialize, Serialize};

const STATE: usize = PORTS;
const DATA: usize = PORTS + 1;
const TIMER: usize = PORTS + 2;

/// Side of the pair axis a grabbed lattice sits on. Positive covers `+x`
/// and `+y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Positive,
    Negative,
}

impl Side {
    pub fn of(dir: Direction) -> Self {
        match dir {
            Direction::PlusX | Direction::PlusY => Side::Positive,
            Direction::MinusX | Direction::MinusY => Side::Negative,
        }
    }

    /// Direction on this side, perpendicular to `axis`.
    pub fn across(self, axis: Axis) -> Direction {
        match (axis, self) {
            (Axis::X, Side::Positive) => Direction::PlusY,
            (Axis::X, Side::Negative) => Direction::MinusY,
            (Axis::Y, Side::Positive) => Direction::PlusX,
            (Axis::Y, Side::Negative) => Direction::MinusX,
        }
    }
}

/// A child lattice on its way out. Packed as
/// `1000 * (partner + 1) + 10 * steps + heading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TravellingSeed {
    /// Direction of the other half of the travelling pair.
    pub partner: Direction,
    /// Moves left before the pair settles.
    pub steps: u8,
    pub heading: Direction,
}

impl TravellingSeed {
    pub const MAX_STEPS: u8 = 99;

    fn encode(self) -> i32 {
        1000 * (self.partner.index() as i32 + 1) + 10 * self.steps as i32 + self.heading.index() as i32
    }

    fn decode(raw: i32) -> Result<Self, CodecError> {
        if !(1000..5000).contains(&raw) {
            return Err(CodecError::invalid(raw, "travelling seed out of range"));
        }
        let partner = Direction::from_raw(raw / 1000 - 1)
            .ok_or(CodecError::invalid(raw, "partner digit out of range"))?;
        let heading = Direction::from_raw(raw % 10)
            .ok_or(CodecError::invalid(raw, "heading digit out of range"))?;
        Ok(Self {
            partner,
            steps: packed_field(raw, 10, 100) as u8,
            heading,
        })
    }

    /// The same seed one step further along.
    fn advanced(self) -> Self {
        Self {
            steps: self.steps.saturating_sub(1),
            ..self
        }
    }
}

/// Signals exchanged on the directional channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairSignal {
    Silent,
    /// Travelling partner: my reservation was granted.
    Ok,
    Move,
    Flip,
    /// Grabbed lattice to its grabber.
    Grabbed,
    Grabbing,
    /// Grabber to its partner: I hold a lattice on this side.
    HasGrabbed(Side),
    PairReservation,
    Reservation,
    PairDisband,
    Seed(Direction),
    Travelling(TravellingSeed),
}

impl SignalCodec for PairSignal {
    fn encode(self) -> i32 {
        match self {
            PairSignal::Silent => 0,
            PairSignal::Ok => 1,
            PairSignal::Move => 2,
            PairSignal::Flip => 3,
            PairSignal::Grabbed => 4,
            PairSignal::Grabbing => 5,
            PairSignal::HasGrabbed(Side::Positive) => 6,
            PairSignal::HasGrabbed(Side::Negative) => 7,
            PairSignal::PairReservation => 8,
            PairSignal::Reservation => 9,
            PairSignal::PairDisband => 90,
            PairSignal::Seed(dir) => 10 + dir.index() as i32,
            PairSignal::Travelling(seed) => seed.encode(),
        }
    }

    fn decode(raw: i32) -> Result<Self, CodecError> {
        match raw {
            0 => Ok(PairSignal::Silent),
            1 => Ok(PairSignal::Ok),
            2 => Ok(PairSignal::Move),
            3 => Ok(PairSignal::Flip),
            4 => Ok(PairSignal::Grabbed),
            5 => Ok(PairSignal::Grabbing),
            6 => Ok(PairSignal::HasGrabbed(Side::Positive)),
            7 => Ok(PairSignal::HasGrabbed(Side::Negative)),
            8 => Ok(PairSignal::PairReservation),
            9 => Ok(PairSignal::Reservation),
            10..=13 => Ok(PairSignal::Seed(Direction::ALL[(raw - 10) as usize])),
            90 => Ok(PairSignal::PairDisband),
            1000..=4999 => TravellingSeed::decode(raw).map(PairSignal::Travelling),
            _ => Err(CodecError::invalid(raw, "unknown pair signal")),
        }
    }
}

/// Contents of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    Empty,
    Free { heading: Direction },
    Grabber { partner: Direction, patience: i32 },
    Recovering { partner: Direction, remaining: i32 },
    /// Child waiting to move with its partner; gives up at zero patience.
    Travelling { seed: TravellingSeed, patience: i32 },
    /// Empty cell promised to the requester whose request arrives on
    /// `channel`.
    Claimed { channel: Direction },
}

impl PairState {
    /// Read the state channels of a whole cell.
    pub fn decode(cell: &[i32]) -> Result<Self, CodecError> {
        let direction = || {
            Direction::from_raw(cell[DATA]).ok_or(CodecError::invalid(cell[DATA], "direction out of range"))
        };
        match cell[STATE] {
            0 => Ok(PairState::Empty),
            1 => Ok(PairState::Free {
                heading: direction()?,
            }),
            2 if cell[TIMER] >= 0 => Ok(PairState::Grabber {
                partner: direction()?,
                patience: cell[TIMER],
            }),
            2 => Err(CodecError::invalid(cell[TIMER], "negative patience")),
            3 if cell[TIMER] >= 0 => Ok(PairState::Travelling {
                seed: TravellingSeed::decode(cell[DATA])?,
                patience: cell[TIMER],
            }),
            3 => Err(CodecError::invalid(cell[TIMER], "negative patience")),
            4 => Ok(PairState::Claimed {
                channel: direction()?,
            }),
            s if s < 0 && s != i32::MIN => Ok(PairState::Recovering {
                partner: direction()?,
                remaining: -s,
            }),
            s => Err(CodecError::invalid(s, "unknown pair state")),
        }
    }

    /// Write the state channels of a whole cell.
    pub fn encode(self, cell: &mut [i32]) {
        let (state, data, timer) = match self {
            PairState::Empty => (0, 0, 0),
            PairState::Free { heading } => (1, heading.index() as i32, 0),
            PairState::Grabber { partner, patience } => (2, partner.index() as i32, patience),
            PairState::Travelling { seed, patience } => (3, seed.encode(), patience),
            PairState::Claimed { channel } => (4, channel.index() as i32, 0),
            PairState::Recovering { partner, remaining } => (-remaining, partner.index() as i32, 0),
        };
        cell[STATE] = state;
        cell[DATA] = data;
        cell[TIMER] = timer;
    }
}

/// How an empty cell answers several travelling pairs reserving it in the
/// same tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RacePolicy {
    /// Nobody moves; a lone pair reservation is still granted.
    #[default]
    DenyAll,
    /// One requester is granted through the arbiter.
    GrantOne,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReproducingPairs {
    /// Free lattices placed by `populate`. Defaults to twice the grid width.
    pub lattices: Option<usize>,
    /// Probability that a free lattice picks a random heading when it moves.
    pub jitter: f64,
    /// Ticks a grabber waits for a reproduction, and a travelling child
    /// for its next move, before disbanding.
    pub patience: i32,
    /// Ticks a grabber rests after releasing a child.
    pub recovery: i32,
    /// Steps a travelling pair walks before settling.
    pub child_steps: u8,
    pub pair_race: RacePolicy,
}

impl Default for ReproducingPairs {
    fn default() -> Self {
        Self {
            lattices: None,
            jitter: 0.05,
            patience: 64,
            recovery: 20,
            child_steps: 5,
            pair_race: RacePolicy::DenyAll,
        }
    }
}

const MOVE_REPLIES: Replies<PairSignal> = Replies {
    grant: PairSignal::Move,
    deny: PairSignal::Silent,
    idle: PairSignal::Silent,
};

type Transition = (PairState, [PairSignal; PORTS]);

fn first_seed(ports: &[PairSignal; PORTS]) -> Option<Direction> {
    ports.iter().find_map(|s| match s {
        PairSignal::Seed(heading) => Some(*heading),
        _ => None,
    })
}

fn first_travelling(ports: &[PairSignal; PORTS]) -> Option<TravellingSeed> {
    ports.iter().find_map(|s| match s {
        PairSignal::Travelling(seed) => Some(*seed),
        _ => None,
    })
}

impl ReproducingPairs {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("jitter", self.jitter)?;
        if self.patience <= 0 {
            return Err(ConfigError::InvalidParameter(format!(
                "patience must be positive, got {}",
                self.patience
            )));
        }
        if self.recovery <= 0 {
            return Err(ConfigError::InvalidParameter(format!(
                "recovery must be positive, got {}",
                self.recovery
            )));
        }
        if !(1..=TravellingSeed::MAX_STEPS).contains(&self.child_steps) {
            return Err(ConfigError::InvalidParameter(format!(
                "child_steps must be within 1..={}, got {}",
                TravellingSeed::MAX_STEPS,
                self.child_steps
            )));
        }
        Ok(())
    }

    fn transition(&self, state: PairState, ports: [PairSignal; PORTS], ctx: &mut CellContext) -> Transition {
        match state {
            PairState::Empty => self.empty(None, ports, ctx),
            PairState::Claimed { channel } => self.empty(Some(channel), ports, ctx),
            PairState::Free { heading } => self.free(heading, ports, ctx),
            PairState::Grabber { partner, patience } => self.grabber(partner, patience, ports, ctx),
            PairState::Recovering { partner, remaining } => {
                let next = if remaining > 1 {
                    PairState::Recovering {
                        partner,
                        remaining: remaining - 1,
                    }
                } else {
                    PairState::Grabber {
                        partner,
                        patience: self.patience,
                    }
                };
                (next, grabber_defaults(partner))
            }
            PairState::Travelling { seed, patience } => self.travelling(seed, patience, ports, ctx),
        }
    }

    fn arrive(&self, seed: TravellingSeed) -> PairState {
        PairState::Travelling {
            seed,
            patience: self.patience,
        }
    }

    fn empty(&self, claim: Option<Direction>, ports: [PairSignal; PORTS], ctx: &mut CellContext) -> Transition {
        let silent = [PairSignal::Silent; PORTS];
        if let Some(seed) = first_travelling(&ports) {
            return (self.arrive(seed), silent);
        }
        if let Some(heading) = first_seed(&ports) {
            return (PairState::Free { heading }, silent);
        }

        let reservations = ports.map(|s| s == PairSignal::Reservation);
        let pair_reservations = ports.map(|s| s == PairSignal::PairReservation);
        let anyone: [bool; PORTS] = std::array::from_fn(|i| reservations[i] || pair_reservations[i]);

        let (requests, granted) = match claim {
            Some(channel) if anyone[channel.index()] => (anyone, Some(channel)),
            _ if pair_reservations.contains(&true) => {
                let requesters = pair_reservations.iter().filter(|&&r| r).count();
                let granted = match self.pair_race {
                    RacePolicy::DenyAll if requesters > 1 => None,
                    _ => arbitrate(pair_reservations, ctx.random),
                };
                (pair_reservations, granted)
            }
            _ if reservations.contains(&true) => (reservations, arbitrate(reservations, ctx.random)),
            _ => return (PairState::Empty, silent),
        };

        let next = match granted {
            Some(channel) => PairState::Claimed { channel },
            None => PairState::Empty,
        };
        (next, replies(requests, granted, MOVE_REPLIES))
    }

    fn free(&self, heading: Direction, ports: [PairSignal; PORTS], ctx: &mut CellContext) -> Transition {
        let mut out = [PairSignal::Silent; PORTS];
        let ahead = ports[heading.opposite().index()];

        if ahead == PairSignal::Move {
            out[heading.index()] = PairSignal::Seed(jittered(heading, self.jitter, ctx.random));
            return (PairState::Empty, out);
        }

        // Grabbing arriving in channel d was sent by the grabber at opposite(d).
        if let Some(dir) = find(&ports, |s| *s == PairSignal::Grabbing) {
            let mut out = [PairSignal::Flip; PORTS];
            for from in Direction::ALL {
                if ports[from.index()] == PairSignal::PairReservation {
                    out[from.opposite().index()] = PairSignal::PairDisband;
                }
            }
            out[dir.opposite().index()] = PairSignal::Grabbed;
            return (PairState::Free { heading }, out);
        }

        if let Some(seed) = first_travelling(&ports) {
            return (self.arrive(seed), out);
        }

        match ahead {
            PairSignal::Reservation => {
                out[heading.index()] = PairSignal::Reservation;
                let grabber = PairState::Grabber {
                    partner: heading,
                    patience: self.patience,
                };
                (grabber, out)
            }
            PairSignal::Flip | PairSignal::PairReservation => (
                PairState::Free {
                    heading: heading.opposite(),
                },
                out,
            ),
            _ => {
                out[heading.index()] = PairSignal::Reservation;
                (PairState::Free { heading }, out)
            }
        }
    }

    fn grabber(
        &self,
        partner: Direction,
        patience: i32,
        ports: [PairSignal; PORTS],
        ctx: &mut CellContext,
    ) -> Transition {
        if patience == 0 {
            let free = PairState::Free {
                heading: partner.opposite(),
            };
            return (free, [PairSignal::Silent; PORTS]);
        }

        let incoming = rotate_half(ports);
        let grabbed = find(&incoming, |s| *s == PairSignal::Grabbed);
        let partner_side = match incoming[partner.index()] {
            PairSignal::HasGrabbed(side) => Some(side),
            _ => None,
        };

        let mut out = grabber_defaults(partner);
        let waiting = PairState::Grabber {
            partner,
            patience: patience - 1,
        };
        match (grabbed, partner_side) {
            (Some(child), Some(side)) if side == Side::of(child) && ctx.clock() => {
                out[partner.index()] = PairSignal::HasGrabbed(side);
                out[child.index()] = PairSignal::Travelling(TravellingSeed {
                    partner,
                    steps: self.child_steps,
                    heading: child,
                });
                // Both partners release together; count the pair once.
                if Side::of(partner) == Side::Positive {
                    ctx.record_event();
                }
                let recovering = PairState::Recovering {
                    partner,
                    remaining: self.recovery,
                };
                (recovering, out)
            }
            (Some(child), _) => {
                out[partner.index()] = PairSignal::HasGrabbed(Side::of(child));
                out[child.index()] = PairSignal::Grabbing;
                (waiting, out)
            }
            (None, Some(side)) => {
                out[side.across(partner.axis()).index()] = PairSignal::Grabbing;
                (waiting, out)
            }
            (None, None) => {
                out[partner.clockwise().index()] = PairSignal::Grabbing;
                out[partner.counter_clockwise().index()] = PairSignal::Grabbing;
                (waiting, out)
            }
        }
    }

    fn travelling(
        &self,
        seed: TravellingSeed,
        patience: i32,
        ports: [PairSignal; PORTS],
        ctx: &mut CellContext,
    ) -> Transition {
        let mut out = [PairSignal::Silent; PORTS];
        let incoming = rotate_half(ports);
        let partner = seed.partner;
        let disband = PairState::Free {
            heading: partner.opposite(),
        };

        if incoming
            .iter()
            .any(|s| matches!(s, PairSignal::Grabbing | PairSignal::PairDisband))
        {
            out[partner.index()] = PairSignal::PairDisband;
            return (disband, out);
        }

        if seed.steps == 0 {
            let grabber = PairState::Grabber {
                partner,
                patience: self.patience,
            };
            return (grabber, out);
        }

        if patience == 0 {
            out[partner.index()] = PairSignal::PairDisband;
            return (disband, out);
        }

        let granted = incoming.contains(&PairSignal::Move);
        let partner_ready = incoming[partner.index()] == PairSignal::Ok;
        if granted && partner_ready && ctx.clock() {
            out[seed.heading.index()] = PairSignal::Travelling(seed.advanced());
            return (PairState::Empty, out);
        }

        out[seed.heading.index()] = PairSignal::PairReservation;
        if granted {
            out[partner.index()] = PairSignal::Ok;
        }
        let waiting = PairState::Travelling {
            seed,
            patience: patience - 1,
        };
        (waiting, out)
    }
}

/// Flip on every port except the one facing the partner.
fn grabber_defaults(partner: Direction) -> [PairSignal; PORTS] {
    let mut out = [PairSignal::Flip; PORTS];
    out[partner.index()] = PairSignal::Silent;
    out
}

impl Rule for ReproducingPairs {
    fn name(&self) -> &'static str {
        "reproducing_pairs"
    }

    fn layout(&self) -> ChannelLayout {
        ChannelLayout::new(&["state", "data", "timer"])
    }

    fn step_cell(
        &self,
        input: &[i32],
        output: &mut [i32],
        ctx: &mut CellContext,
    ) -> Result<(), RuleError> {
        let ports = decode_ports::<PairSignal>(input)?;
        let state = PairState::decode(input)?;

        let (next, out) = self.transition(state, ports, ctx);
        encode_ports(out, output);
        next.encode(output);
        Ok(())
    }

    /// Drops the ports, and the lattice too when its state is unreadable.
    fn absorb(&self, input: &[i32], output: &mut [i32]) {
        output.fill(0);
        if let Ok(state) = PairState::decode(input) {
            state.encode(output);
        }
    }

    fn populate(&self, grid: &mut ChannelGrid, rng: &mut dyn LatticeRng) {
        let (width, height) = (grid.width(), grid.height());
        for _ in 0..self.lattices.unwrap_or(2 * width) {
            let x = rng.next_usize_max(width);
            let y = rng.next_usize_max(height);
            let free = PairState::Free {
                heading: random_direction(rng),
            };
            free.encode(grid.cell_at_mut(x, y));
        }
    }

    fn color(&self, cell: &[i32]) -> [f32; 3] {
        let ports = &cell[..PORTS];
        let mut color = match cell[STATE] {
            1 => [1.0, 1.0, 1.0],
            2 => [0.2, 0.5, 1.0],
            3 => [0.5, 0.0, 0.5],
            s if s < 0 => [0.1, 0.3, 0.6],
            _ => [0.0, 0.0, 0.0],
        };
        if ports.iter().any(|&v| v >= 10) {
            color = color.map(|c: f32| (c - 0.2).max(0.0));
        }
        if ports.iter().any(|&v| v >= 1000) {
            color[0] = 1.0;
        }
        color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::rng::StdRandom;
    use crate::automaton::World;
    use Direction::*;
    use PairSignal::{
        Flip, Grabbed, Grabbing, HasGrabbed, Move, PairDisband, PairReservation, Reservation, Seed,
        Silent, Travelling,
    };

    fn rule() -> ReproducingPairs {
        ReproducingPairs {
            jitter: 0.0,
            ..Default::default()
        }
    }

    /// Run one transition at `tick`, returning the events it recorded too.
    fn run_at(
        rule: &ReproducingPairs,
        tick: u64,
        state: PairState,
        ports: [PairSignal; 4],
    ) -> (PairState, [PairSignal; 4], u64) {
        let mut rng = StdRandom::from_u64_seed(tick + 1);
        let mut ctx = CellContext::new(tick, Default::default(), &mut rng);
        let (next, out) = rule.transition(state, ports, &mut ctx);
        (next, out, ctx.events())
    }

    fn run(state: PairState, ports: [PairSignal; 4]) -> (PairState, [PairSignal; 4]) {
        let (next, out, _) = run_at(&rule(), 0, state, ports);
        (next, out)
    }

    fn seed(partner: Direction, steps: u8, heading: Direction) -> TravellingSeed {
        TravellingSeed {
            partner,
            steps,
            heading,
        }
    }

    fn travelling(seed: TravellingSeed, patience: i32) -> PairState {
        PairState::Travelling { seed, patience }
    }

    #[test]
    fn test_signal_codes() {
        assert_eq!(Travelling(seed(PlusX, 5, PlusY)).encode(), 1051);
        assert_eq!(Travelling(seed(MinusY, 0, MinusX)).encode(), 4002);
        assert_eq!(PairSignal::decode(3043), Ok(Travelling(seed(MinusX, 4, MinusY))));
        assert_eq!(PairSignal::decode(7), Ok(HasGrabbed(Side::Negative)));
        assert_eq!(PairSignal::decode(90), Ok(PairDisband));

        for raw in [14, 89, 999, 1005, 5000, -1] {
            assert!(PairSignal::decode(raw).is_err(), "{} decoded", raw);
        }
    }

    #[test]
    fn test_state_codes() {
        let states = [
            PairState::Empty,
            PairState::Free { heading: MinusY },
            PairState::Grabber {
                partner: PlusY,
                patience: 12,
            },
            PairState::Recovering {
                partner: MinusX,
                remaining: 20,
            },
            travelling(seed(PlusY, 3, PlusX), 7),
            PairState::Claimed { channel: MinusY },
        ];
        for state in states {
            let mut cell = [0; 7];
            state.encode(&mut cell);
            assert_eq!(PairState::decode(&cell), Ok(state));
        }

        let mut cell = [0; 7];
        PairState::Recovering {
            partner: MinusX,
            remaining: 20,
        }
        .encode(&mut cell);
        assert_eq!(&cell[4..], &[-20, 2, 0]);

        assert!(PairState::decode(&[0, 0, 0, 0, 5, 0, 0]).is_err());
        assert!(PairState::decode(&[0, 0, 0, 0, 1, 6, 0]).is_err());
        assert!(PairState::decode(&[0, 0, 0, 0, 2, 1, -3]).is_err());
        assert!(PairState::decode(&[0, 0, 0, 0, 3, 1051, -1]).is_err());
        assert!(PairState::decode(&[0, 0, 0, 0, 4, 9, 0]).is_err());
    }

    #[test]
    fn test_side_across_axis() {
        assert_eq!(Side::Positive.across(Axis::X), PlusY);
        assert_eq!(Side::Negative.across(Axis::X), MinusY);
        assert_eq!(Side::Positive.across(Axis::Y), PlusX);
        assert_eq!(Side::Negative.across(Axis::Y), MinusX);
        assert_eq!(Side::of(MinusX), Side::Negative);
    }

    #[test]
    fn test_empty_prefers_travelling_seed() {
        let child = seed(PlusX, 4, PlusY);
        let (next, out) = run(PairState::Empty, [Seed(PlusX), Travelling(child), Reservation, Silent]);
        assert_eq!(next, travelling(child, 64));
        assert_eq!(out, [Silent; 4]);

        let (next, _) = run(PairState::Empty, [Silent, Reservation, Seed(MinusX), Silent]);
        assert_eq!(next, PairState::Free { heading: MinusX });
    }

    #[test]
    fn test_empty_grants_reservation_with_move() {
        let (next, out) = run(PairState::Empty, [Silent, Reservation, Silent, Silent]);
        assert_eq!(next, PairState::Claimed { channel: PlusY });
        assert_eq!(out, [Silent, Silent, Silent, Move]);
    }

    #[test]
    fn test_claimed_cell_serves_only_its_requester() {
        let claimed = PairState::Claimed { channel: PlusY };

        // The claim holder keeps winning, even against a pair reservation.
        let (next, out) = run(claimed, [PairReservation, Reservation, Silent, Silent]);
        assert_eq!(next, claimed);
        assert_eq!(out, [Silent, Silent, Silent, Move]);

        // The holder's lattice arrives.
        let (next, out) = run(claimed, [Reservation, Silent, Silent, Seed(PlusY)]);
        assert_eq!(next, PairState::Free { heading: PlusY });
        assert_eq!(out, [Silent; 4]);

        // The holder gave up; the cell is open again.
        let (next, out) = run(claimed, [Reservation, Silent, Silent, Silent]);
        assert_eq!(next, PairState::Claimed { channel: PlusX });
        assert_eq!(out, [Silent, Silent, Move, Silent]);

        let (next, out) = run(claimed, [Silent; 4]);
        assert_eq!(next, PairState::Empty);
        assert_eq!(out, [Silent; 4]);
    }

    #[test]
    fn test_pair_reservation_takes_precedence() {
        let (_, out) = run(PairState::Empty, [Reservation, Silent, PairReservation, Silent]);
        assert_eq!(out, [Move, Silent, Silent, Silent]);
    }

    #[test]
    fn test_pair_race_policies() {
        let ports = [PairReservation, Silent, PairReservation, Silent];
        let (_, out) = run(PairState::Empty, ports);
        assert_eq!(out, [Silent; 4]);

        let grant_one = ReproducingPairs {
            pair_race: RacePolicy::GrantOne,
            ..rule()
        };
        let (_, out, _) = run_at(&grant_one, 0, PairState::Empty, ports);
        assert_eq!(out.iter().filter(|&&s| s == Move).count(), 1);
    }

    #[test]
    fn test_free_moves_on_grant() {
        let (next, out) = run(PairState::Free { heading: PlusX }, [Silent, Silent, Move, Silent]);
        assert_eq!(next, PairState::Empty);
        assert_eq!(out, [Seed(PlusX), Silent, Silent, Silent]);
    }

    #[test]
    fn test_free_answers_grabber() {
        // Grabbing arrives in +y, so the grabber sits at -y.
        let (next, out) = run(
            PairState::Free { heading: PlusX },
            [PairReservation, Grabbing, Silent, Silent],
        );
        assert_eq!(next, PairState::Free { heading: PlusX });
        assert_eq!(out, [Flip, Flip, PairDisband, Grabbed]);
    }

    #[test]
    fn test_free_becomes_travelling() {
        let child = seed(MinusX, 5, PlusY);
        let (next, out) = run(PairState::Free { heading: PlusY }, [Travelling(child), Silent, Silent, Silent]);
        assert_eq!(next, travelling(child, 64));
        assert_eq!(out, [Silent; 4]);
    }

    #[test]
    fn test_free_pairs_on_head_on_reservation() {
        let (next, out) = run(PairState::Free { heading: MinusY }, [Silent, Reservation, Silent, Silent]);
        assert_eq!(
            next,
            PairState::Grabber {
                partner: MinusY,
                patience: 64
            }
        );
        assert_eq!(out, [Silent, Silent, Silent, Reservation]);
    }

    #[test]
    fn test_free_bounces_off_flip() {
        for blocker in [Flip, PairReservation] {
            let (next, out) = run(PairState::Free { heading: PlusX }, [Silent, Silent, blocker, Silent]);
            assert_eq!(next, PairState::Free { heading: MinusX });
            assert_eq!(out, [Silent; 4]);
        }
    }

    #[test]
    fn test_free_reserves_ahead() {
        let (next, out) = run(PairState::Free { heading: MinusX }, [Silent; 4]);
        assert_eq!(next, PairState::Free { heading: MinusX });
        assert_eq!(out, [Silent, Silent, Reservation, Silent]);
    }

    fn grabber(partner: Direction) -> PairState {
        PairState::Grabber {
            partner,
            patience: 10,
        }
    }

    fn waiting(partner: Direction) -> PairState {
        PairState::Grabber {
            partner,
            patience: 9,
        }
    }

    #[test]
    fn test_grabber_reaches_both_sides() {
        let (next, out) = run(grabber(PlusX), [Silent; 4]);
        assert_eq!(next, waiting(PlusX));
        assert_eq!(out, [Silent, Grabbing, Flip, Grabbing]);
    }

    #[test]
    fn test_grabber_holds_grabbed_lattice() {
        // Grabbed from the +y neighbour arrives in the -y channel.
        let (next, out) = run(grabber(PlusX), [Silent, Silent, Silent, Grabbed]);
        assert_eq!(next, waiting(PlusX));
        assert_eq!(out, [HasGrabbed(Side::Positive), Grabbing, Flip, Flip]);
    }

    #[test]
    fn test_grabber_follows_partner_side() {
        // The partner at +x reports through the -x channel.
        let (next, out) = run(grabber(PlusX), [Silent, Silent, HasGrabbed(Side::Negative), Silent]);
        assert_eq!(next, waiting(PlusX));
        assert_eq!(out, [Silent, Flip, Flip, Grabbing]);

        let (_, out) = run(grabber(MinusY), [Silent, HasGrabbed(Side::Positive), Silent, Silent]);
        assert_eq!(out, [Grabbing, Flip, Flip, Silent]);
    }

    #[test]
    fn test_grabber_releases_child_on_clock() {
        let ports = [Silent, Silent, HasGrabbed(Side::Positive), Grabbed];
        let (next, out, events) = run_at(&rule(), 4, grabber(PlusX), ports);
        assert_eq!(
            next,
            PairState::Recovering {
                partner: PlusX,
                remaining: 20
            }
        );
        assert_eq!(events, 1);
        assert_eq!(out[PlusX.index()], HasGrabbed(Side::Positive));
        assert_eq!(out[PlusY.index()], Travelling(seed(PlusX, 5, PlusY)));
        assert_eq!(out[MinusX.index()], Flip);

        let (next, out, events) = run_at(&rule(), 5, grabber(PlusX), ports);
        assert_eq!(next, waiting(PlusX));
        assert_eq!(events, 0);
        assert_eq!(out[PlusY.index()], Grabbing);

        // The partner at -x releases too but leaves the count to this side.
        let ports = [HasGrabbed(Side::Positive), Silent, Silent, Grabbed];
        let (next, out, events) = run_at(&rule(), 4, grabber(MinusX), ports);
        assert!(matches!(next, PairState::Recovering { .. }));
        assert_eq!(events, 0);
        assert_eq!(out[PlusY.index()], Travelling(seed(MinusX, 5, PlusY)));
    }

    #[test]
    fn test_grabber_keeps_child_when_partner_holds_other_side() {
        // Our lattice sits at +y, the partner's on the -y side.
        let ports = [Silent, Silent, HasGrabbed(Side::Negative), Grabbed];
        let (next, out, events) = run_at(&rule(), 4, grabber(PlusX), ports);
        assert_eq!(next, waiting(PlusX));
        assert_eq!(events, 0);
        assert_eq!(out, [HasGrabbed(Side::Positive), Grabbing, Flip, Flip]);
    }

    #[test]
    fn test_grabber_disbands_when_patience_runs_out() {
        let tired = PairState::Grabber {
            partner: MinusX,
            patience: 0,
        };
        let (next, out) = run(tired, [Silent; 4]);
        assert_eq!(next, PairState::Free { heading: PlusX });
        assert_eq!(out, [Silent; 4]);
    }

    #[test]
    fn test_recovery_counts_down_to_grabber() {
        let (next, out) = run(
            PairState::Recovering {
                partner: PlusY,
                remaining: 3,
            },
            [Grabbed, Silent, Silent, Silent],
        );
        assert_eq!(
            next,
            PairState::Recovering {
                partner: PlusY,
                remaining: 2
            }
        );
        assert_eq!(out, [Flip, Silent, Flip, Flip]);

        let (next, _) = run(
            PairState::Recovering {
                partner: PlusY,
                remaining: 1,
            },
            [Silent; 4],
        );
        assert_eq!(
            next,
            PairState::Grabber {
                partner: PlusY,
                patience: 64
            }
        );
    }

    #[test]
    fn test_travelling_disbands_when_grabbed() {
        let child = seed(PlusX, 3, PlusY);
        let (next, out) = run(travelling(child, 10), [Silent, Grabbing, Silent, Silent]);
        assert_eq!(next, PairState::Free { heading: MinusX });
        assert_eq!(out, [PairDisband, Silent, Silent, Silent]);
    }

    #[test]
    fn test_travelling_settles_when_out_of_steps() {
        let (next, out) = run(travelling(seed(MinusY, 0, PlusX), 0), [Silent; 4]);
        assert_eq!(
            next,
            PairState::Grabber {
                partner: MinusY,
                patience: 64
            }
        );
        assert_eq!(out, [Silent; 4]);
    }

    #[test]
    fn test_travelling_moves_with_partner() {
        let child = seed(PlusX, 3, PlusY);
        // Move from the cell at +y arrives in -y; Ok from the partner at +x arrives in -x.
        let ports = [Silent, Silent, PairSignal::Ok, Move];

        let (next, out, _) = run_at(&rule(), 2, travelling(child, 10), ports);
        assert_eq!(next, PairState::Empty);
        assert_eq!(out, [Silent, Travelling(seed(PlusX, 2, PlusY)), Silent, Silent]);

        let (next, out, _) = run_at(&rule(), 3, travelling(child, 10), ports);
        assert_eq!(next, travelling(child, 9));
        assert_eq!(out, [PairSignal::Ok, PairReservation, Silent, Silent]);
    }

    #[test]
    fn test_travelling_waits_for_partner() {
        let child = seed(PlusX, 3, PlusY);
        let (next, out) = run(travelling(child, 10), [Silent, Silent, Silent, Move]);
        assert_eq!(next, travelling(child, 9));
        assert_eq!(out, [PairSignal::Ok, PairReservation, Silent, Silent]);

        let (_, out) = run(travelling(child, 10), [Silent; 4]);
        assert_eq!(out, [Silent, PairReservation, Silent, Silent]);
    }

    #[test]
    fn test_travelling_gives_up_without_partner() {
        let child = seed(PlusX, 3, PlusY);
        let (next, out) = run(travelling(child, 0), [Silent, Silent, Silent, Move]);
        assert_eq!(next, PairState::Free { heading: MinusX });
        assert_eq!(out, [PairDisband, Silent, Silent, Silent]);
    }

    #[test]
    fn test_lone_child_returns_to_free_lattice() {
        let mut grid = ChannelGrid::new(12, 12, 7).unwrap();
        travelling(seed(PlusX, 5, PlusY), 3).encode(grid.cell_at_mut(5, 5));
        let mut world = World::with_grid(grid, Box::new(rule()), 9).unwrap();

        world.run(4).unwrap();

        assert_eq!(
            PairState::decode(world.grid().cell_at(5, 5)),
            Ok(PairState::Free { heading: MinusX })
        );
        world.run(200).unwrap();
        assert!(world.grid().cells().all(|c| c[STATE] != 3));
    }

    #[test]
    fn test_head_on_free_lattices_lock_into_pair() {
        let mut grid = ChannelGrid::new(8, 5, 7).unwrap();
        PairState::Free { heading: PlusX }.encode(grid.cell_at_mut(2, 2));
        PairState::Free { heading: MinusX }.encode(grid.cell_at_mut(3, 2));
        let mut world = World::with_grid(grid, Box::new(rule()), 1).unwrap();

        world.run(2).unwrap();

        let grid = world.grid();
        assert_eq!(
            PairState::decode(grid.cell_at(2, 2)),
            Ok(PairState::Grabber {
                partner: PlusX,
                patience: 64
            })
        );
        assert_eq!(
            PairState::decode(grid.cell_at(3, 2)),
            Ok(PairState::Grabber {
                partner: MinusX,
                patience: 64
            })
        );
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        assert!(rule().validate().is_ok());
        for bad in [
            ReproducingPairs {
                patience: 0,
                ..rule()
            },
            ReproducingPairs {
                recovery: 0,
                ..rule()
            },
            ReproducingPairs {
                child_steps: 100,
                ..rule()
            },
            ReproducingPairs {
                jitter: -0.1,
                ..rule()
            },
        ] {
            assert!(bad.validate().is_err());
        }
    }
}
