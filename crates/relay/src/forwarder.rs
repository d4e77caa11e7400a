//! One direction of a pairing's byte copy
//!
//! Reads from the owning connection and writes each chunk verbatim to the
//! paired peer. Stops on EOF or on the first read or write failure; nothing
//! is retried.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};

use relaycraft_core::{RelayCraftError, Result};

use crate::peer::PeerHandle;
use crate::stats::RelayStats;

/// Per-connection forwarding state
pub struct Forwarder {
    stats: Arc<RelayStats>,
    chunk_size: usize,
    transferred: u64,
}

impl Forwarder {
    pub fn new(stats: Arc<RelayStats>, chunk_size: usize) -> Self {
        Self {
            stats,
            chunk_size: chunk_size.max(1),
            transferred: 0,
        }
    }

    /// Bytes this connection has forwarded so far
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Write one chunk to `peer` and account for it
    pub async fn forward(&mut self, peer: &PeerHandle, chunk: &[u8]) -> Result<()> {
        peer.write_chunk(chunk)
            .await
            .map_err(RelayCraftError::PeerUnreachable)?;

        let n = chunk.len() as u64;
        self.transferred += n;
        self.stats.record_bytes(n);
        Ok(())
    }

    /// Copy from `reader` to `peer` until EOF (`Ok`) or the first failure
    pub async fn run<R>(&mut self, reader: &mut R, peer: &PeerHandle) -> Result<()>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            self.forward(peer, &buf[..n]).await?;
        }
    }
}
