//! Length-prefixed `bincode` frames.
//!
//! Wire layout: `len: u32 BE || bincode(Frame)`.

use shared_types::Frame;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame body.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Framing errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Socket failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame length outside `1..=MAX_FRAME_LEN`.
    #[error("invalid frame length {0}")]
    InvalidLength(usize),

    /// Body could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Body could not be deserialized.
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Serialize `frame` with its length prefix, checking the size cap.
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, FrameError> {
    let body = bincode::serialize(frame).map_err(|e| FrameError::Encode(e.to_string()))?;
    let n = body.len();
    if n == 0 || n > MAX_FRAME_LEN {
        return Err(FrameError::InvalidLength(n));
    }
    let len = u32::try_from(n).map_err(|_| FrameError::InvalidLength(n))?;

    let mut out = Vec::with_capacity(4 + n);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Write bytes produced by [`encode_frame`] and flush.
pub async fn write_encoded<W>(writer: &mut W, encoded: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let encoded = encode_frame(frame)?;
    write_encoded(writer, &encoded).await
}

/// Read one frame. `Ok(None)` on a clean end of stream between frames.
///
/// A stream that ends inside the length prefix is an `Io` error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    if reader.read(&mut prefix[..1]).await? == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut prefix[1..]).await?;

    let len = u32::from_be_bytes(prefix) as usize;
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(FrameError::InvalidLength(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    bincode::deserialize(&body)
        .map(Some)
        .map_err(|e| FrameError::Decode(e.to_string()))
}
