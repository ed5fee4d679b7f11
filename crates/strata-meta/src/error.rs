//! Error types for the persistence layer.

/// Errors returned by [`MetaStore`](crate::MetaStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    /// Fjall database error.
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    /// I/O error, including guard reads during iteration.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record failed to encode or decode.
    #[error("record codec error: {0}")]
    Codec(#[from] postcard::Error),

    /// A `nodes` key was not a 32-byte node id.
    #[error("node key has {0} bytes, expected 32")]
    BadNodeKey(usize),
}
