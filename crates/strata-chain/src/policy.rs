//! Conflict policies for divergent chains.

use crate::Chain;

/// Where a conflicting write came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A client request handled by this node.
    Client,
    /// A replicated update from another node.
    Peer,
}

/// Outcome of a conflict decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Apply the incoming write.
    Accept,
    /// Keep the stored value.
    Reject,
}

/// Decides what happens when an incoming chain neither contains nor is
/// contained by the stored chain.
///
/// Implementations must be deterministic for [`Origin::Peer`]: every replica
/// evaluates the same pair of chains and must reach the same answer, or the
/// replicas will never converge.
pub trait ConflictPolicy: Send + Sync {
    /// Decide whether `incoming` replaces `stored`.
    fn resolve(&self, origin: Origin, stored: &Chain, incoming: &Chain) -> Resolution;
}

fn later_head(stored: &Chain, incoming: &Chain) -> Resolution {
    let stored_key = stored.head().map(|l| l.order_key());
    let incoming_key = incoming.head().map(|l| l.order_key());
    if incoming_key > stored_key {
        Resolution::Accept
    } else {
        Resolution::Reject
    }
}

/// Default policy.
///
/// A client must present the stored head; anything else is `Superseded` and
/// the client re-reads and retries. Peer updates apply iff their head sorts
/// after the stored head by `(tick, node)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadOrder;

impl ConflictPolicy for HeadOrder {
    fn resolve(&self, origin: Origin, stored: &Chain, incoming: &Chain) -> Resolution {
        match origin {
            Origin::Client => Resolution::Reject,
            Origin::Peer => later_head(stored, incoming),
        }
    }
}

/// Like [`HeadOrder`] for peers, but a client write whose chain this replica
/// cannot place (it saw a version not replicated here yet, or a concurrent
/// one) is applied locally. The other writer sees `Superseded` next time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientWins;

impl ConflictPolicy for ClientWins {
    fn resolve(&self, origin: Origin, stored: &Chain, incoming: &Chain) -> Resolution {
        match origin {
            Origin::Client => Resolution::Accept,
            Origin::Peer => later_head(stored, incoming),
        }
    }
}

/// Strict policy: divergent writes never replace the stored value.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectDivergent;

impl ConflictPolicy for RejectDivergent {
    fn resolve(&self, _origin: Origin, _stored: &Chain, _incoming: &Chain) -> Resolution {
        Resolution::Reject
    }
}
