//! [`ReplicaStore`] implementation so a [`Replicator`](strata_replica::Replicator)
//! can drive a [`StrataNode`].

use strata_net::{ReplicaMessage, Update};
use strata_replica::{ApplyOutcome, ReplicaError, ReplicaStore};
use strata_sync::{OriginSummary, RangeSet};
use strata_types::{NodeId, Tock};

use crate::node::StrataNode;

#[async_trait::async_trait]
impl ReplicaStore for StrataNode {
    fn node_id(&self) -> NodeId {
        StrataNode::node_id(self)
    }

    async fn apply_update(&self, update: Update) -> Result<ApplyOutcome, ReplicaError> {
        Ok(StrataNode::apply_update(self, update).await?)
    }

    async fn apply_superseded(
        &self,
        origin: NodeId,
        ranges: &RangeSet,
    ) -> Result<(), ReplicaError> {
        Ok(StrataNode::apply_superseded(self, origin, ranges).await?)
    }

    async fn summary(&self) -> (Tock, Vec<OriginSummary>) {
        StrataNode::summary(self).await
    }

    async fn answer_summary(
        &self,
        origins: &[OriginSummary],
        max_resend: usize,
    ) -> Result<Vec<ReplicaMessage>, ReplicaError> {
        Ok(StrataNode::answer_summary(self, origins, max_resend).await)
    }
}
