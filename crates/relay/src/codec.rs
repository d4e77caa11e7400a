//! Control frame codec
//!
//! Frames are `[4-byte big-endian length N][N bytes of JSON]`. They are only
//! exchanged during the handshake; forwarded bytes are never framed.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use relaycraft_core::{ControlMessage, RelayCraftError, Result, FRAME_HEADER_LEN};

/// Encode `msg` and write header and payload with a single write.
pub async fn write_message<W>(writer: &mut W, msg: &ControlMessage) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let payload = msg.to_bytes()?;
    let len = u32::try_from(payload.len()).map_err(|_| RelayCraftError::FrameTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&payload);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame.
///
/// Returns `Ok(None)` when the peer closes before a full frame arrived. A
/// declared length above `max_len` fails before any payload byte is read.
pub async fn read_message<R>(reader: &mut R, max_len: usize) -> Result<Option<ControlMessage>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    if !read_full(reader, &mut header).await? {
        return Ok(None);
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max_len {
        return Err(RelayCraftError::FrameTooLarge { len, max: max_len });
    }

    let mut payload = vec![0u8; len];
    if !read_full(reader, &mut payload).await? {
        return Ok(None);
    }

    ControlMessage::from_bytes(&payload).map(Some)
}

/// Fill `buf` completely; `false` if the stream ended first
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<bool>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}
