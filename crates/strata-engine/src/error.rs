//! Error types for the store node.

use serde::{Deserialize, Serialize};
use strata_chain::Chain;
use strata_replica::ReplicaError;
use strata_types::Path;

use crate::codec::CodecError;
use crate::gate::AccessMode;

/// Coarse error category reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Superseded,
    PermissionDenied,
    Malformed,
    Unavailable,
    Internal,
}

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Nothing live at the requested path or version.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller's chain is behind the stored one.
    #[error("superseded: {path} is at {current}")]
    Superseded {
        /// Entry the write targeted.
        path: Path,
        /// Chain currently stored there.
        current: Chain,
    },

    /// The access gate refused the request.
    #[error("permission denied: {mode:?} on {path}")]
    PermissionDenied {
        /// Requested path.
        path: Path,
        /// Requested access.
        mode: AccessMode,
    },

    /// The request or update is not well formed.
    #[error("malformed: {0}")]
    Malformed(String),

    /// A dependency is not reachable right now.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),

    /// Entry tree error.
    #[error("tree error: {0}")]
    Tree(#[from] strata_tree::TreeError),

    /// Tick bookkeeping error.
    #[error("sync error: {0}")]
    Sync(#[from] strata_sync::SyncError),

    /// Failed to access the metadata store.
    #[error("metadata error: {0}")]
    Meta(#[from] strata_meta::MetaError),

    /// Network transport error.
    #[error("network error: {0}")]
    Net(#[from] strata_net::NetError),

    /// Replication error.
    #[error("replication error: {0}")]
    Replica(#[from] ReplicaError),

    /// The value codec refused a value.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl StoreError {
    /// Category for the client.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Superseded { .. } => ErrorKind::Superseded,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::Malformed(_) | Self::Sync(_) | Self::Codec(_) => ErrorKind::Malformed,
            Self::Unavailable(_) | Self::Net(_) => ErrorKind::Unavailable,
            Self::Internal(_) | Self::Tree(_) | Self::Meta(_) => ErrorKind::Internal,
            Self::Replica(e) => match e {
                ReplicaError::Malformed(_) | ReplicaError::Sync(_) => ErrorKind::Malformed,
                ReplicaError::Net(_) => ErrorKind::Unavailable,
                ReplicaError::Apply(_) => ErrorKind::Internal,
            },
        }
    }
}

impl From<StoreError> for ReplicaError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Malformed(msg) => ReplicaError::Malformed(msg),
            StoreError::Sync(e) => ReplicaError::Sync(e),
            StoreError::Net(e) => ReplicaError::Net(e),
            StoreError::Replica(e) => e,
            other => ReplicaError::Apply(other.to_string()),
        }
    }
}
