//! Packed-integer signal codec.
//!
//! Directional channels carry plain `i32` values on the grid. Each rule
//! declares a signal enum with named fields and implements `SignalCodec`
//! for it, so a raw value is decoded once when a cell is read and encoded
//! once when the cell is written. Multi-field signals pack their fields
//! into fixed-base digit slots (see `packed_field`).

use super::{Direction, PORTS};
use thiserror::Error;

/// A channel value outside every recognized decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid encoding {value}: {reason}")]
    InvalidEncoding { value: i32, reason: &'static str },
}

impl CodecError {
    pub fn invalid(value: i32, reason: &'static str) -> Self {
        CodecError::InvalidEncoding { value, reason }
    }
}

/// Lossless mapping between a typed signal and its packed integer.
pub trait SignalCodec: Copy + Eq + Sized {
    /// Pack the signal into a channel value.
    fn encode(self) -> i32;

    /// Unpack a channel value. Must invert `encode` for every signal.
    fn decode(raw: i32) -> Result<Self, CodecError>;
}

/// Digit slot of a packed value: `(value / base) % radix`.
///
/// With `base = 10, radix = 100` this reads the two digits above the units
/// digit, which is how step counters sit inside travelling seeds.
#[inline]
pub fn packed_field(value: i32, base: i32, radix: i32) -> i32 {
    (value / base) % radix
}

/// Decode the four directional channels at the front of `cell`.
pub fn decode_ports<S: SignalCodec>(cell: &[i32]) -> Result<[S; PORTS], CodecError> {
    Ok([
        S::decode(cell[0])?,
        S::decode(cell[1])?,
        S::decode(cell[2])?,
        S::decode(cell[3])?,
    ])
}

/// Encode four signals into the directional channels of `cell`.
pub fn encode_ports<S: SignalCodec>(ports: [S; PORTS], cell: &mut [i32]) {
    for (slot, signal) in cell.iter_mut().zip(ports) {
        *slot = signal.encode();
    }
}

/// First direction, in scan order 0..4, whose port satisfies `predicate`.
pub fn find<S>(ports: &[S; PORTS], predicate: impl Fn(&S) -> bool) -> Option<Direction> {
    ports
        .iter()
        .position(predicate)
        .and_then(Direction::from_index)
}

/// Rotate ports by two slots: `out[i] = ports[(i + 2) % 4]`.
///
/// A value that arrived in channel `i` was sent by the neighbour at
/// `opposite(i)`. Rotating incoming ports turns them into "message from
/// neighbour i"; rotating outgoing replies addresses each one back to the
/// cell that sent the matching request.
#[inline]
pub fn rotate_half<T: Copy>(ports: [T; PORTS]) -> [T; PORTS] {
    [ports[2], ports[3], ports[0], ports[1]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Probe {
        Silent,
        Ping,
        Tagged { tag: i32, dir: Direction },
    }

    impl SignalCodec for Probe {
        fn encode(self) -> i32 {
            match self {
                Probe::Silent => 0,
                Probe::Ping => 1,
                Probe::Tagged { tag, dir } => 100 + tag * 10 + dir.index() as i32,
            }
        }

        fn decode(raw: i32) -> Result<Self, CodecError> {
            match raw {
                0 => Ok(Probe::Silent),
                1 => Ok(Probe::Ping),
                100..=199 => {
                    let dir = Direction::from_raw(raw % 10)
                        .ok_or(CodecError::invalid(raw, "direction digit out of range"))?;
                    Ok(Probe::Tagged {
                        tag: packed_field(raw - 100, 10, 10),
                        dir,
                    })
                }
                _ => Err(CodecError::invalid(raw, "unknown probe")),
            }
        }
    }

    #[test]
    fn test_find_returns_first_in_scan_order() {
        let ports = [Probe::Silent, Probe::Ping, Probe::Silent, Probe::Ping];
        assert_eq!(find(&ports, |p| *p == Probe::Ping), Some(Direction::PlusY));
        assert_eq!(find(&ports, |p| matches!(p, Probe::Tagged { .. })), None);
    }

    #[test]
    fn test_decode_ports_reads_packed_fields() {
        let cell = [0, 1, 133, 0, 99];
        let ports: [Probe; 4] = decode_ports(&cell).unwrap();
        assert_eq!(
            ports[2],
            Probe::Tagged {
                tag: 3,
                dir: Direction::MinusY
            }
        );

        let mut out = [0; 5];
        encode_ports(ports, &mut out);
        assert_eq!(&out[..4], &cell[..4]);
        assert_eq!(out[4], 0, "state channels are left alone");
    }

    #[test]
    fn test_garbage_is_invalid_encoding() {
        assert_eq!(
            decode_ports::<Probe>(&[0, 0, 55, 0]),
            Err(CodecError::invalid(55, "unknown probe"))
        );
        assert!(Probe::decode(108).is_err());
    }

    #[test]
    fn test_rotate_half_pairs_opposites() {
        let rotated = rotate_half([0, 1, 2, 3]);
        assert_eq!(rotated, [2, 3, 0, 1]);
        assert_eq!(rotate_half(rotated), [0, 1, 2, 3]);
    }

    #[test]
    fn test_packed_field_digits() {
        assert_eq!(packed_field(3054, 10, 100), 5);
        assert_eq!(packed_field(3054, 1000, 10), 3);
        assert_eq!(packed_field(3054, 1, 10), 4);
    }
}
