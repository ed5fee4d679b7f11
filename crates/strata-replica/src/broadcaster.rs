//! Publishing side of replication.

use std::sync::Arc;

use strata_net::{ReplicaMessage, Transport};
use tracing::{debug, warn};

use crate::ReplicaError;

/// Publishes messages on a [`Transport`].
///
/// Failures are logged and returned; callers on the write path ignore them
/// because anti-entropy resends whatever was lost.
#[derive(Clone)]
pub struct Broadcaster {
    transport: Arc<dyn Transport>,
}

impl Broadcaster {
    /// Wrap a transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Publish one message.
    pub async fn publish(&self, msg: &ReplicaMessage) -> Result<(), ReplicaError> {
        match self.transport.publish(msg).await {
            Ok(()) => {
                debug!(kind = msg.kind(), "published");
                Ok(())
            }
            Err(e) => {
                warn!(kind = msg.kind(), error = %e, "publish failed, anti-entropy will retry");
                Err(e.into())
            }
        }
    }

    /// Publish several messages, stopping at the first failure.
    pub async fn publish_all(&self, msgs: &[ReplicaMessage]) -> Result<(), ReplicaError> {
        for msg in msgs {
            self.publish(msg).await?;
        }
        Ok(())
    }
}
