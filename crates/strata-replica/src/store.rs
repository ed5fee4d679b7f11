//! The [`ReplicaStore`] seam.

use strata_net::{ReplicaMessage, Update};
use strata_sync::{OriginSummary, RangeSet};
use strata_types::{NodeId, Tock};

use crate::ReplicaError;

/// What applying a peer update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The entry now carries the update.
    Applied,
    /// `(origin, tick)` was already known; nothing changed.
    Duplicate,
    /// The stored chain already covers the update.
    Stale,
    /// The conflict policy kept the stored value.
    Rejected,
}

/// Abstracts the store so the replicator can be tested without an engine.
#[async_trait::async_trait]
pub trait ReplicaStore: Send + Sync {
    /// Identity of the local node.
    fn node_id(&self) -> NodeId;

    /// Apply an update received from a peer.
    async fn apply_update(&self, update: Update) -> Result<ApplyOutcome, ReplicaError>;

    /// A peer reports that `ranges` of `origin` exist but carry no value
    /// anywhere it can see.
    async fn apply_superseded(&self, origin: NodeId, ranges: &RangeSet)
    -> Result<(), ReplicaError>;

    /// Current tock and per-origin summaries for an anti-entropy round.
    async fn summary(&self) -> (Tock, Vec<OriginSummary>);

    /// Work out what a peer that advertised `origins` is missing.
    ///
    /// Returns the messages to publish, at most `max_resend` of them updates.
    async fn answer_summary(
        &self,
        origins: &[OriginSummary],
        max_resend: usize,
    ) -> Result<Vec<ReplicaMessage>, ReplicaError>;
}
