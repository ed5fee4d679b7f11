//! Error types for tick bookkeeping.

use strata_types::NodeId;

/// Errors from [`NodeState`](crate::NodeState) updates.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Tick 0 means "unset" and never names a write.
    #[error("tick 0 from {node}")]
    ZeroTick {
        /// Origin that sent it.
        node: NodeId,
    },
}
