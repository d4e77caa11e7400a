//! Shared write side of a relayed connection
//!
//! The connection task owns the read half of its socket. The write half is
//! shared: the matcher sends control messages through it and the paired
//! peer's forwarding loop writes relayed bytes into it.

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use relaycraft_core::{ConnectionId, ControlMessage, RelayCraftError, Result};

use crate::codec;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Cloneable handle to one connection's write half.
///
/// Writes are serialized by an async mutex so a control frame is never
/// interleaved with forwarded bytes. Once [`PeerHandle::shutdown`] has run,
/// every further write fails.
#[derive(Clone)]
pub struct PeerHandle {
    id: ConnectionId,
    writer: Arc<Mutex<Option<BoxedWriter>>>,
}

impl PeerHandle {
    pub fn new<W>(id: ConnectionId, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id,
            writer: Arc::new(Mutex::new(Some(Box::new(writer)))),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Send one framed control message
    pub async fn send(&self, msg: &ControlMessage) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| RelayCraftError::Io(closed_error()))?;
        codec::write_message(writer, msg).await
    }

    /// Write raw relayed bytes
    pub async fn write_chunk(&self, chunk: &[u8]) -> std::io::Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(closed_error)?;
        writer.write_all(chunk).await?;
        writer.flush().await
    }

    /// Close the write half. Idempotent.
    pub async fn shutdown(&self) {
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            let _ = writer.shutdown().await;
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.writer.lock().await.is_none()
    }
}

impl fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerHandle").field("id", &self.id).finish()
    }
}

fn closed_error() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "connection closed")
}
