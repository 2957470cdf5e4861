//! Collision arbiter for simultaneous reservation requests.
//!
//! An empty cell may receive reservation requests on several directional
//! channels in the same tick. At most one is granted:
//!
//! - no requester: nothing is granted and no random number is drawn
//! - one requester: granted unconditionally, no random number is drawn
//! - k requesters: one is drawn uniformly with `next_usize_max(k)`, in
//!   channel scan order
//!
//! `replies` then turns the decision into the outgoing ports. Replies are
//! rotated by two slots so each one travels back to the neighbour that
//! sent the request.

use super::codec::rotate_half;
use super::rng::LatticeRng;
use super::{Direction, PORTS};

/// Reply codes a rule sends after arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replies<S> {
    /// Sent to the granted requester.
    pub grant: S,
    /// Sent to every other requester.
    pub deny: S,
    /// Sent on ports that carried no request.
    pub idle: S,
}

/// Pick the single granted requester, if any.
pub fn arbitrate(requests: [bool; PORTS], rng: &mut dyn LatticeRng) -> Option<Direction> {
    let requesters: Vec<Direction> = Direction::ALL
        .into_iter()
        .filter(|dir| requests[dir.index()])
        .collect();

    match requesters.len() {
        0 => None,
        1 => Some(requesters[0]),
        k => Some(requesters[rng.next_usize_max(k)]),
    }
}

/// Build the outgoing ports for an arbitration result.
///
/// `requests[i]` refers to a request that arrived in channel `i`; its reply
/// is written to channel `opposite(i)`.
pub fn replies<S: Copy>(
    requests: [bool; PORTS],
    granted: Option<Direction>,
    codes: Replies<S>,
) -> [S; PORTS] {
    let mut out = [codes.idle; PORTS];
    for dir in Direction::ALL {
        if requests[dir.index()] {
            out[dir.index()] = if granted == Some(dir) {
                codes.grant
            } else {
                codes.deny
            };
        }
    }
    rotate_half(out)
}
