//! Length-prefixed postcard framing for client connections.
//!
//! Each frame is a 4-byte big-endian length followed by that many bytes of
//! postcard payload.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::NetError;

/// Largest payload a peer may announce.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Encode `msg` and write it as one frame.
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<(), NetError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = postcard::to_allocvec(msg).map_err(|e| NetError::Serialization(e.to_string()))?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(NetError::FrameTooLarge(payload.len()));
    }

    writer
        .write_all(&(payload.len() as u32).to_be_bytes())
        .await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. Returns `None` on a clean end of stream before the
/// length prefix.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, NetError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(NetError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    let msg = postcard::from_bytes(&payload).map_err(|e| NetError::Serialization(e.to_string()))?;
    Ok(Some(msg))
}
