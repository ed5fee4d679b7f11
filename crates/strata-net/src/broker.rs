//! In-process message bus.
//!
//! [`LocalBroker`] fans every published message out to every subscribed
//! [`LocalEndpoint`] over a tokio broadcast channel. Messages still go through
//! postcard, so receivers see exactly what a network peer would.
//!
//! Fault injection: pairs of nodes can be partitioned (messages between them
//! are dropped in both directions) and duplicate delivery can be switched on.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use strata_types::NodeId;
use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, trace, warn};

use crate::{Inbox, NetError, ReplicaMessage, Transport};

/// Default channel depth for the bus and each endpoint inbox.
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
struct Packet {
    from: NodeId,
    /// Receivers cut off from `from` when the packet was published.
    blocked: Arc<HashSet<NodeId>>,
    payload: Bytes,
}

struct BrokerInner {
    tx: broadcast::Sender<Packet>,
    /// Unordered node pairs that cannot reach each other.
    cuts: RwLock<HashSet<(NodeId, NodeId)>>,
    duplicate: AtomicBool,
    published: AtomicU64,
    capacity: usize,
}

/// In-process publish/subscribe bus shared by a set of nodes.
#[derive(Clone)]
pub struct LocalBroker {
    inner: Arc<BrokerInner>,
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn pair(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl LocalBroker {
    /// Create a bus whose channels hold up to `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(BrokerInner {
                tx,
                cuts: RwLock::new(HashSet::new()),
                duplicate: AtomicBool::new(false),
                published: AtomicU64::new(0),
                capacity,
            }),
        }
    }

    /// A transport handle for `node`.
    pub fn endpoint(&self, node: NodeId) -> LocalEndpoint {
        LocalEndpoint {
            node,
            inner: self.inner.clone(),
        }
    }

    /// Drop all traffic between `a` and `b`.
    pub async fn partition(&self, a: NodeId, b: NodeId) {
        self.inner.cuts.write().await.insert(pair(a, b));
        debug!(a = %a.short(), b = %b.short(), "partition added");
    }

    /// Cut `node` off from every node in `others`.
    pub async fn isolate(&self, node: NodeId, others: &[NodeId]) {
        let mut cuts = self.inner.cuts.write().await;
        for other in others {
            if *other != node {
                cuts.insert(pair(node, *other));
            }
        }
        debug!(node = %node.short(), peers = others.len(), "node isolated");
    }

    /// Remove every partition.
    pub async fn heal(&self) {
        self.inner.cuts.write().await.clear();
        debug!("partitions healed");
    }

    /// Deliver every message twice while enabled.
    pub fn set_duplicate(&self, enabled: bool) {
        self.inner.duplicate.store(enabled, Ordering::Relaxed);
    }

    /// Number of messages published so far (duplicates not counted).
    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }
}

/// One node's view of a [`LocalBroker`].
pub struct LocalEndpoint {
    node: NodeId,
    inner: Arc<BrokerInner>,
}

impl LocalEndpoint {
    /// The node this endpoint publishes as.
    pub fn node(&self) -> NodeId {
        self.node
    }
}

#[async_trait::async_trait]
impl Transport for LocalEndpoint {
    async fn publish(&self, msg: &ReplicaMessage) -> Result<(), NetError> {
        let payload = Bytes::from(msg.encode()?);

        let blocked: HashSet<NodeId> = self
            .inner
            .cuts
            .read()
            .await
            .iter()
            .filter_map(|&(a, b)| {
                if a == self.node {
                    Some(b)
                } else if b == self.node {
                    Some(a)
                } else {
                    None
                }
            })
            .collect();

        let packet = Packet {
            from: self.node,
            blocked: Arc::new(blocked),
            payload,
        };

        self.inner.published.fetch_add(1, Ordering::Relaxed);
        let copies = if self.inner.duplicate.load(Ordering::Relaxed) {
            2
        } else {
            1
        };
        for _ in 0..copies {
            // No receivers is not an error: the node may be alone.
            let _ = self.inner.tx.send(packet.clone());
        }
        trace!(node = %self.node.short(), kind = msg.kind(), "published");
        Ok(())
    }

    async fn subscribe(&self) -> Result<Inbox, NetError> {
        let mut rx = self.inner.tx.subscribe();
        let (tx, inbox) = mpsc::channel(self.inner.capacity);
        let node = self.node;

        tokio::spawn(async move {
            loop {
                let packet = match rx.recv().await {
                    Ok(packet) => packet,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(node = %node.short(), skipped = n, "inbox lagged, messages dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if packet.from == node || packet.blocked.contains(&node) {
                    continue;
                }

                match ReplicaMessage::decode(&packet.payload) {
                    Ok(msg) => {
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(node = %node.short(), "dropping undecodable message: {e}");
                    }
                }
            }
            trace!(node = %node.short(), "local inbox closed");
        });

        Ok(inbox)
    }
}
