//! The receive loop and the anti-entropy timer.

use std::sync::Arc;
use std::time::Duration;

use strata_net::{Inbox, ReplicaMessage, Transport};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::{ApplyOutcome, Broadcaster, ReplicaError, ReplicaStore};

/// Replication tuning.
#[derive(Debug, Clone, Copy)]
pub struct ReplicaConfig {
    /// Time between two summaries.
    pub interval: Duration,
    /// Maximum number of updates resent per answered summary.
    pub max_resend: usize,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_resend: 256,
        }
    }
}

/// Drives replication for one store.
///
/// Two independent tasks: one drains the transport inbox and applies what
/// arrives, the other publishes a summary every `interval`.
pub struct Replicator {
    store: Arc<dyn ReplicaStore>,
    broadcaster: Broadcaster,
    config: ReplicaConfig,
}

/// Handles of the spawned replication tasks.
pub struct ReplicaTasks {
    receiver: JoinHandle<()>,
    anti_entropy: JoinHandle<()>,
}

impl ReplicaTasks {
    /// Stop both tasks.
    pub fn shutdown(self) {
        self.receiver.abort();
        self.anti_entropy.abort();
    }
}

impl Replicator {
    /// Create a replicator for `store` over `transport`.
    pub fn new(
        store: Arc<dyn ReplicaStore>,
        transport: Arc<dyn Transport>,
        config: ReplicaConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            broadcaster: Broadcaster::new(transport),
            config,
        })
    }

    /// Subscribe to the transport and spawn the receive and anti-entropy tasks.
    pub async fn start(self: &Arc<Self>) -> Result<ReplicaTasks, ReplicaError> {
        let inbox = self.broadcaster.transport().subscribe().await?;

        let this = self.clone();
        let receiver = tokio::spawn(async move { this.receive(inbox).await });

        let this = self.clone();
        let anti_entropy = tokio::spawn(async move { this.run_anti_entropy().await });

        info!(
            node = %self.store.node_id().short(),
            interval_ms = self.config.interval.as_millis() as u64,
            max_resend = self.config.max_resend,
            "replicator started"
        );

        Ok(ReplicaTasks {
            receiver,
            anti_entropy,
        })
    }

    async fn receive(&self, mut inbox: Inbox) {
        while let Some(msg) = inbox.recv().await {
            let kind = msg.kind();
            if let Err(e) = self.handle(msg).await {
                match e {
                    ReplicaError::Malformed(_) => {
                        warn!(kind, error = %e, "dropping malformed message")
                    }
                    ReplicaError::Net(_) => debug!(kind, error = %e, "reply not sent"),
                    _ => error!(kind, error = %e, "failed to handle message"),
                }
            }
        }
        info!("replication inbox closed");
    }

    async fn run_anti_entropy(&self) {
        let mut tick = interval(self.config.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            if let Err(e) = self.announce().await {
                debug!(error = %e, "summary not published");
            }
        }
    }

    /// Handle one inbound message.
    pub async fn handle(&self, msg: ReplicaMessage) -> Result<(), ReplicaError> {
        let local = self.store.node_id();

        match msg {
            ReplicaMessage::Update(update) => {
                let origin = update.origin;
                let tick = update.tick;
                let outcome = self.store.apply_update(update).await?;
                match outcome {
                    ApplyOutcome::Applied => {
                        debug!(origin = %origin.short(), tick, "update applied")
                    }
                    ApplyOutcome::Duplicate => {}
                    ApplyOutcome::Stale | ApplyOutcome::Rejected => {
                        debug!(origin = %origin.short(), tick, ?outcome, "update not applied")
                    }
                }
                Ok(())
            }
            ReplicaMessage::Summary { node, tock, origins } => {
                if node == local {
                    return Ok(());
                }
                debug!(peer = %node.short(), tock, origins = origins.len(), "summary received");
                let replies = self
                    .store
                    .answer_summary(&origins, self.config.max_resend)
                    .await?;
                self.broadcaster.publish_all(&replies).await
            }
            ReplicaMessage::Superseded {
                node,
                origin,
                ranges,
            } => {
                if node == local {
                    return Ok(());
                }
                debug!(peer = %node.short(), origin = %origin.short(), ?ranges, "superseded notice");
                self.store.apply_superseded(origin, &ranges).await
            }
        }
    }

    /// Publish one summary now.
    pub async fn announce(&self) -> Result<(), ReplicaError> {
        let (tock, origins) = self.store.summary().await;
        let msg = ReplicaMessage::Summary {
            node: self.store.node_id(),
            tock,
            origins,
        };
        self.broadcaster.publish(&msg).await
    }
}
