//! TCP accept loop
//!
//! One task per accepted connection. Accept failures are logged and the loop
//! keeps listening; connection failures never reach it.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, error, info};

use relaycraft_core::{ConnectionId, RelayConfig, Result};

use crate::connection::{Connection, RelayContext};
use crate::stats::RelayMonitor;

/// Rendezvous relay listening for hosts and clients
pub struct RelayServer {
    listener: TcpListener,
    ctx: RelayContext,
}

impl RelayServer {
    /// Bind the relay listener
    pub async fn bind<A: ToSocketAddrs>(addr: A, config: RelayConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            ctx: RelayContext::new(config),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Read-only view for the status surface
    pub fn monitor(&self) -> RelayMonitor {
        self.ctx.monitor()
    }

    /// Accept connections forever
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Connections already accepted keep running; they are not drained.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        if let Ok(addr) = self.listener.local_addr() {
            info!("Relay listening on {}", addr);
        }

        let mut next_id: ConnectionId = 0;
        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            next_id += 1;
                            self.ctx.stats.connection_opened();
                            info!("Connection {} from {}", next_id, peer_addr);

                            if let Err(e) = stream.set_nodelay(true) {
                                debug!("set_nodelay failed for {}: {}", peer_addr, e);
                            }

                            let conn = Connection::new(next_id, peer_addr.to_string(), self.ctx.clone());
                            tokio::spawn(conn.run(stream));
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("Relay shutting down");
                    break;
                }
            }
        }
    }
}
