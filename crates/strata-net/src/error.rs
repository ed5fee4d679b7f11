//! Error types for transports and framing.

/// Errors that can occur while moving messages.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The transport has shut down.
    #[error("transport closed")]
    Closed,

    /// The inbound stream was already handed out.
    #[error("transport already subscribed")]
    AlreadySubscribed,

    /// An iroh-gossip operation failed.
    #[error("gossip error: {0}")]
    Gossip(String),

    /// A frame announced a length over [`MAX_FRAME_LEN`](crate::MAX_FRAME_LEN).
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    /// Stream I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
