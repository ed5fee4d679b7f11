//! Error types for replication.

/// Errors raised while applying or exchanging replicated state.
#[derive(Debug, thiserror::Error)]
pub enum ReplicaError {
    /// Tick bookkeeping rejected the message.
    #[error("sync error: {0}")]
    Sync(#[from] strata_sync::SyncError),

    /// The transport failed.
    #[error("network error: {0}")]
    Net(#[from] strata_net::NetError),

    /// An update was well formed but could not be applied.
    #[error("apply failed: {0}")]
    Apply(String),

    /// An update violates the protocol (zero tick, head mismatch).
    #[error("malformed update: {0}")]
    Malformed(String),
}
