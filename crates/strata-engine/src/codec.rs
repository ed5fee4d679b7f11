//! Value transformation at the client boundary.
//!
//! Stored and replicated bytes are always the encoded form; only the
//! dispatcher calls the codec.

use bytes::Bytes;

/// Errors raised by a [`ValueCodec`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("cannot encode value: {0}")]
    Encode(String),

    #[error("cannot decode value: {0}")]
    Decode(String),
}

/// Converts between client values and stored bytes.
pub trait ValueCodec: Send + Sync {
    /// Client value → stored bytes.
    fn encode(&self, value: Bytes) -> Result<Bytes, CodecError>;

    /// Stored bytes → client value.
    fn decode(&self, stored: Bytes) -> Result<Bytes, CodecError>;
}

/// Stores values unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl ValueCodec for Identity {
    fn encode(&self, value: Bytes) -> Result<Bytes, CodecError> {
        Ok(value)
    }

    fn decode(&self, stored: Bytes) -> Result<Bytes, CodecError> {
        Ok(stored)
    }
}
