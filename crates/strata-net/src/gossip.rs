//! Replication over an iroh-gossip topic.
//!
//! All nodes sharing a cluster secret join the same topic. Each broadcast is
//! prefixed with a random nonce so that an anti-entropy resend of an
//! identical message is not suppressed by gossip's duplicate filter.
//!
//! **Note**: this transport needs a running iroh [`Endpoint`]. Tests use
//! [`LocalBroker`](crate::LocalBroker) instead.

use bytes::Bytes;
use futures_lite::StreamExt;
use iroh::protocol::Router;
use iroh::{Endpoint, EndpointId};
use iroh_gossip::Gossip;
use iroh_gossip::api::{Event, GossipReceiver, GossipSender};
use iroh_gossip::net::GOSSIP_ALPN;
use iroh_gossip::proto::TopicId;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use crate::{Inbox, NetError, ReplicaMessage, Transport};

/// Inbox depth for decoded gossip messages.
const INBOX_CAPACITY: usize = 1024;

/// Derive the gossip topic for a cluster secret.
pub fn cluster_topic(cluster_secret: &[u8]) -> TopicId {
    TopicId::from_bytes(*blake3::hash(cluster_secret).as_bytes())
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    nonce: u64,
    msg: ReplicaMessage,
}

/// [`Transport`] backed by one iroh-gossip topic.
pub struct GossipTransport {
    gossip: Gossip,
    topic_id: TopicId,
    sender: GossipSender,
    receiver: Mutex<Option<GossipReceiver>>,
    router: Router,
}

impl GossipTransport {
    /// Start gossip on `endpoint` and join the cluster topic.
    ///
    /// With no bootstrap peers the node subscribes without waiting for a
    /// neighbour; peers that know it will join later.
    pub async fn start(
        endpoint: Endpoint,
        cluster_secret: &[u8],
        bootstrap: Vec<EndpointId>,
        max_message_size: usize,
    ) -> Result<Self, NetError> {
        let topic_id = cluster_topic(cluster_secret);

        let gossip = Gossip::builder()
            .max_message_size(max_message_size)
            .spawn(endpoint.clone());

        let router = Router::builder(endpoint)
            .accept(GOSSIP_ALPN, gossip.clone())
            .spawn();

        let topic = if bootstrap.is_empty() {
            gossip.subscribe(topic_id, bootstrap).await
        } else {
            gossip.subscribe_and_join(topic_id, bootstrap).await
        }
        .map_err(|e| NetError::Gossip(e.to_string()))?;

        let (sender, receiver) = topic.split();

        info!(?topic_id, "gossip transport started");

        Ok(Self {
            gossip,
            topic_id,
            sender,
            receiver: Mutex::new(Some(receiver)),
            router,
        })
    }

    /// The topic this transport publishes on.
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    /// Leave the topic and stop the router.
    pub async fn shutdown(self) -> Result<(), NetError> {
        self.gossip
            .shutdown()
            .await
            .map_err(|e| NetError::Gossip(e.to_string()))?;
        self.router
            .shutdown()
            .await
            .map_err(|e| NetError::Gossip(e.to_string()))?;
        info!("gossip transport shut down");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for GossipTransport {
    async fn publish(&self, msg: &ReplicaMessage) -> Result<(), NetError> {
        let envelope = Envelope {
            nonce: rand::random(),
            msg: msg.clone(),
        };
        let data = postcard::to_allocvec(&envelope)
            .map_err(|e| NetError::Serialization(e.to_string()))?;
        self.sender
            .broadcast(Bytes::from(data))
            .await
            .map_err(|e: iroh_gossip::api::ApiError| NetError::Gossip(e.to_string()))?;
        debug!(kind = msg.kind(), "broadcast replica message");
        Ok(())
    }

    async fn subscribe(&self) -> Result<Inbox, NetError> {
        let mut receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or(NetError::AlreadySubscribed)?;
        let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = receiver.next().await {
                match event {
                    Ok(Event::Received(msg)) => {
                        match postcard::from_bytes::<Envelope>(&msg.content) {
                            Ok(envelope) => {
                                if tx.send(envelope.msg).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("failed to decode gossip message: {e}");
                            }
                        }
                    }
                    Ok(Event::NeighborUp(id)) => {
                        debug!(%id, "gossip neighbor up");
                    }
                    Ok(Event::NeighborDown(id)) => {
                        debug!(%id, "gossip neighbor down");
                    }
                    Ok(Event::Lagged) => {
                        warn!("gossip receiver lagged, anti-entropy will catch up");
                    }
                    Err(e) => {
                        error!("gossip receiver error: {e}");
                        break;
                    }
                }
            }

            info!("gossip receiver loop exited");
        });

        Ok(inbox)
    }
}
