//! Peer protocol messages.
//!
//! Every message is keyed by `(origin, tick)` or is a pure summary, so any of
//! them can be delivered twice or out of order without harm.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strata_chain::Chain;
use strata_sync::{OriginSummary, RangeSet};
use strata_types::{NodeId, Path, Tick, Tock};

/// One accepted mutation, as written by its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Node that performed the write.
    pub origin: NodeId,
    /// The origin's tick for the write. Equals the chain head's tick.
    pub tick: Tick,
    /// Sender's tock when the write was (re)sent.
    pub tock: Tock,
    /// Entry that changed.
    pub path: Path,
    /// New value, `None` for a deletion.
    pub value: Option<Bytes>,
    /// Chain after the write, head first.
    pub chain: Chain,
}

/// Messages exchanged between replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaMessage {
    /// A mutation to apply.
    Update(Update),

    /// Periodic anti-entropy advertisement.
    Summary {
        /// Sender.
        node: NodeId,
        /// Sender's tock.
        tock: Tock,
        /// Highest tick and gaps, per origin the sender knows.
        origins: Vec<OriginSummary>,
    },

    /// Ticks that exist but no longer carry a value anywhere the sender can
    /// see; the receiver may close those gaps without data.
    Superseded {
        /// Sender.
        node: NodeId,
        /// Origin the ticks belong to.
        origin: NodeId,
        /// The superseded ticks.
        ranges: RangeSet,
    },
}

impl ReplicaMessage {
    /// Short name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Update(_) => "update",
            Self::Summary { .. } => "summary",
            Self::Superseded { .. } => "superseded",
        }
    }

    /// Encode with postcard.
    pub fn encode(&self) -> Result<Vec<u8>, crate::NetError> {
        postcard::to_allocvec(self).map_err(|e| crate::NetError::Serialization(e.to_string()))
    }

    /// Decode from postcard.
    pub fn decode(bytes: &[u8]) -> Result<Self, crate::NetError> {
        postcard::from_bytes(bytes).map_err(|e| crate::NetError::Serialization(e.to_string()))
    }
}
