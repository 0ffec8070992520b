//! Length-prefixed frame encoding/decoding
//!
//! Wire format: [4-byte big-endian length][JSON payload]
//! Maximum frame size: 1MB, which also bounds inline image payloads.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Maximum allowed frame size (1MB)
pub(crate) const MAX_FRAME_SIZE: u32 = 1024 * 1024;

/// Read a length-prefixed frame from a stream
///
/// A clean EOF maps to [`Error::ConnectionClosed`]; an undecodable payload
/// maps to [`Error::Json`] so callers can refuse the event without dropping
/// the connection.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    // Read 4-byte length prefix
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::ConnectionClosed
        } else {
            Error::Io(e)
        }
    })?;

    let len = u32::from_be_bytes(len_buf);

    // Sanity check
    if len == 0 {
        return Err(Error::Protocol("Empty frame".into()));
    }
    if len > MAX_FRAME_SIZE {
        return Err(Error::Protocol(format!(
            "Frame too large: {} bytes (max {})",
            len, MAX_FRAME_SIZE
        )));
    }

    // Read payload
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::ConnectionClosed
        } else {
            Error::Io(e)
        }
    })?;

    Ok(serde_json::from_slice(&payload)?)
}

/// Write a length-prefixed frame to a stream
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(msg)?;

    let len = payload.len() as u32;
    if len > MAX_FRAME_SIZE {
        return Err(Error::Protocol(format!(
            "Message too large: {} bytes (max {})",
            len, MAX_FRAME_SIZE
        )));
    }

    // Write length prefix
    writer.write_all(&len.to_be_bytes()).await?;

    // Write payload
    writer.write_all(&payload).await?;

    // Flush to ensure delivery
    writer.flush().await?;

    Ok(())
}
