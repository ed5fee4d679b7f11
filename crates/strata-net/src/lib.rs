//! Replication messages and the transports that carry them.
//!
//! - [`ReplicaMessage`]: the peer protocol (postcard-serialized).
//! - [`Transport`]: publish/subscribe seam used by the replicator.
//! - [`LocalBroker`]: in-process bus with partition and duplicate-delivery
//!   injection, for tests and single-process clusters.
//! - [`GossipTransport`]: iroh-gossip topic derived from the cluster secret.
//! - [`write_frame`] / [`read_frame`]: length-prefixed client framing.

mod broker;
mod error;
mod frame;
mod gossip;
mod message;


pub use broker::{LocalBroker, LocalEndpoint};
pub use error::NetError;
pub use frame::{MAX_FRAME_LEN, read_frame, write_frame};
pub use gossip::{GossipTransport, cluster_topic};
pub use message::{ReplicaMessage, Update};

/// Inbound stream of decoded peer messages.
pub type Inbox = tokio::sync::mpsc::Receiver<ReplicaMessage>;

/// Publish/subscribe seam between the replicator and the network.
///
/// Delivery is best effort: messages may be lost, duplicated or reordered.
/// Anti-entropy repairs whatever a transport drops.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Broadcast `msg` to every reachable peer.
    async fn publish(&self, msg: &ReplicaMessage) -> Result<(), NetError>;

    /// Start receiving messages from peers.
    ///
    /// Messages this node published itself are not delivered back.
    async fn subscribe(&self) -> Result<Inbox, NetError>;
}
