//! # In-Flight Transitions
//!
//! A transition is in flight on a channel from the moment a node derives it
//! until it is committed or abandoned. Two in-flight transitions conflict
//! when committing both in either order would not give both replicas the
//! same result.
//!
//! ```text
//!                 Deposit          Structural(y)    Update(y)
//! Deposit         same originator  -                -
//! Structural(x)   -                always           x == y
//! Update(x)       -                x == y           x == y
//! ```
//!
//! When a counterparty's transition crosses one of ours, the lower
//! originator wins on both replicas. The loser's counterparty refuses the
//! loser's transition, so neither side commits it.

use shared_types::{AppInstanceId, PeerIdentity};

/// What an in-flight transition touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionKind {
    /// Moves the originator's own deposit total.
    Deposit,
    /// Install or uninstall of the app; consumes the next dependency nonce.
    Structural(AppInstanceId),
    /// New state of the app; consumes its next local nonce.
    Update(AppInstanceId),
}

/// A transition some party started on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    /// End party on whose behalf the transition runs. For virtual apps this
    /// is the route end that started it, on every hop.
    pub originator: PeerIdentity,
    pub kind: TransitionKind,
}

impl InFlight {
    pub fn new(originator: PeerIdentity, kind: TransitionKind) -> Self {
        Self { originator, kind }
    }

    pub fn conflicts_with(&self, other: &InFlight) -> bool {
        use TransitionKind::*;
        match (&self.kind, &other.kind) {
            (Deposit, Deposit) => self.originator == other.originator,
            (Deposit, _) | (_, Deposit) => false,
            (Structural(_), Structural(_)) => true,
            (Structural(x), Update(y)) | (Update(x), Structural(y)) | (Update(x), Update(y)) => {
                x == y
            }
        }
    }

    /// True when `incoming` must give way to this transition.
    pub fn prevails_over(&self, incoming: &InFlight) -> bool {
        self.conflicts_with(incoming) && self.originator <= incoming.originator
    }
}
