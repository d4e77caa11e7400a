//! Per-connection lifecycle
//!
//! ```text
//! Connecting → Handshaking → HostActive   → Closing → Closed
//!                          ↘ ClientActive ↗
//! ```
//!
//! Every exit path, clean or not, ends in [`Connection::close`], which gets
//! the termination cause as a typed result and performs the teardown once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, info, trace, warn};

use relaycraft_core::{
    non_empty, ConnectionId, ControlMessage, RelayConfig, RelayCraftError, Result,
};

use crate::codec;
use crate::forwarder::Forwarder;
use crate::matcher;
use crate::peer::PeerHandle;
use crate::registry::Registry;
use crate::stats::{RelayMonitor, RelayStats};

/// Lifecycle state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Handshaking,
    HostActive,
    ClientActive,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Handshaking)
                | (Handshaking, HostActive)
                | (Handshaking, ClientActive)
                | (Connecting | Handshaking | HostActive | ClientActive, Closing)
                | (Closing, Closed)
        )
    }
}

/// What the peer turned out to be after the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Host { id: String },
    Client { target_id: String },
}

/// State shared by every connection task
#[derive(Clone)]
pub struct RelayContext {
    pub registry: Arc<Registry>,
    pub stats: Arc<RelayStats>,
    pub config: Arc<RelayConfig>,
}

impl RelayContext {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            stats: Arc::new(RelayStats::new()),
            config: Arc::new(config),
        }
    }

    pub fn monitor(&self) -> RelayMonitor {
        RelayMonitor::new(self.registry.clone(), self.stats.clone())
    }
}

/// Outcome of a finished connection
#[derive(Debug)]
pub struct ConnectionSummary {
    pub id: ConnectionId,
    pub role: Option<Role>,
    pub duration: Duration,
    pub bytes_transferred: u64,
    /// Why the connection ended; `None` for a clean EOF
    pub error: Option<RelayCraftError>,
}

/// One accepted connection, driven from handshake to teardown
pub struct Connection {
    id: ConnectionId,
    peer: String,
    ctx: RelayContext,
    state: ConnectionState,
    role: Option<Role>,
    opened_at: Instant,
    forwarder: Forwarder,
}

impl Connection {
    /// The caller has already counted the connection as accepted.
    pub fn new(id: ConnectionId, peer: impl Into<String>, ctx: RelayContext) -> Self {
        let forwarder = Forwarder::new(ctx.stats.clone(), ctx.config.chunk_size);
        Self {
            id,
            peer: peer.into(),
            ctx,
            state: ConnectionState::Connecting,
            role: None,
            opened_at: Instant::now(),
            forwarder,
        }
    }

    /// Drive the connection to completion
    pub async fn run<S>(mut self, stream: S) -> ConnectionSummary
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, writer) = tokio::io::split(stream);
        let handle = PeerHandle::new(self.id, writer);

        let result = self.drive(&mut reader, &handle).await;
        self.close(&handle, result).await
    }

    fn transition(&mut self, next: ConnectionState) {
        if !self.state.can_transition_to(next) {
            warn!(
                "Connection {}: invalid transition {:?} → {:?}",
                self.id, self.state, next
            );
            return;
        }
        trace!("Connection {}: {:?} → {:?}", self.id, self.state, next);
        self.state = next;
    }

    async fn drive<R>(&mut self, reader: &mut R, handle: &PeerHandle) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        self.transition(ConnectionState::Handshaking);

        let config = self.ctx.config.clone();
        let msg = tokio::time::timeout(
            config.handshake_timeout(),
            codec::read_message(reader, config.max_frame_len),
        )
        .await
        .map_err(|_| RelayCraftError::HandshakeTimeout)??
        .ok_or(RelayCraftError::HandshakeClosed)?;

        match msg {
            ControlMessage::Register { id } => self.run_host(non_empty(id), reader, handle).await,
            ControlMessage::Connect { target_id } => {
                self.run_client(target_id, reader, handle).await
            }
            other => Err(RelayCraftError::UnexpectedAction(other.action().to_string())),
        }
    }

    async fn run_host<R>(
        &mut self,
        id: Option<String>,
        reader: &mut R,
        handle: &PeerHandle,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let id = id.ok_or(RelayCraftError::MissingHostId)?;
        let mut pairing = self.ctx.registry.register_host(&id, handle.clone());
        info!("Host registered: {}", id);
        self.role = Some(Role::Host { id });
        self.transition(ConnectionState::HostActive);

        // Until a client is paired, keep at most one early chunk and still
        // notice the host hanging up.
        let mut buf = vec![0u8; self.ctx.config.chunk_size.max(1)];
        let mut pending: Option<Vec<u8>> = None;
        let client = loop {
            let event = tokio::select! {
                paired = pairing.paired() => HostEvent::Paired(paired),
                read = reader.read(&mut buf), if pending.is_none() => HostEvent::Read(read),
            };

            match event {
                HostEvent::Paired(Some(client)) => break client,
                HostEvent::Paired(None) => {
                    debug!("Connection {} replaced as host, draining", self.id);
                    return drain(reader, &mut buf).await;
                }
                HostEvent::Read(read) => match read? {
                    0 => return Ok(()),
                    n => pending = Some(buf[..n].to_vec()),
                },
            }
        };

        debug!("Host connection {} paired with client {}", self.id, client.id());
        if let Some(chunk) = pending.take() {
            self.forwarder.forward(&client, &chunk).await?;
        }
        self.forwarder.run(reader, &client).await
    }

    async fn run_client<R>(
        &mut self,
        target_id: Option<String>,
        reader: &mut R,
        handle: &PeerHandle,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let pairing = matcher::connect(&self.ctx.registry, target_id, handle).await?;
        info!("Connection {} paired with host {}", self.id, pairing.target_id);
        self.role = Some(Role::Client {
            target_id: pairing.target_id,
        });
        self.transition(ConnectionState::ClientActive);

        self.forwarder.run(reader, &pairing.host).await
    }

    async fn close(mut self, handle: &PeerHandle, result: Result<()>) -> ConnectionSummary {
        self.transition(ConnectionState::Closing);

        let removed = match &self.role {
            Some(Role::Host { id }) => self.ctx.registry.remove_host(id, self.id).map(|host| {
                debug!(
                    "Host {} registration held for {:.1}s",
                    host.id,
                    host.registered_at.elapsed().as_secs_f64()
                );
            }),
            _ => self.ctx.registry.remove_session(self.id).map(|session| {
                debug!(
                    "Session {} → {} ({}) lasted {:.1}s",
                    self.id,
                    session.target_host_id,
                    if session.active { "active" } else { "pending" },
                    session.connected_at.elapsed().as_secs_f64()
                );
            }),
        }
        .is_some();
        self.ctx.stats.connection_closed();
        handle.shutdown().await;

        let duration = self.opened_at.elapsed();
        let kb = self.forwarder.transferred() as f64 / 1024.0;
        match &self.role {
            Some(Role::Host { id }) => info!(
                "Host {} disconnected after {:.1}s ({:.1} KB relayed)",
                id,
                duration.as_secs_f64(),
                kb
            ),
            Some(Role::Client { target_id }) => info!(
                "Client of {} disconnected after {:.1}s ({:.1} KB relayed)",
                target_id,
                duration.as_secs_f64(),
                kb
            ),
            None => debug!("Connection {} from {} closed", self.id, self.peer),
        }
        if !removed && self.role.is_some() {
            debug!("Connection {} had no registry entry left", self.id);
        }

        let error = result.err();
        match &error {
            None => {}
            Some(RelayCraftError::HandshakeTimeout) => {
                warn!("Handshake timed out for {}", self.peer)
            }
            Some(RelayCraftError::HandshakeClosed) => {
                warn!("{} closed before sending a handshake", self.peer)
            }
            Some(e) if e.is_protocol() => debug!("Protocol error from {}: {}", self.peer, e),
            Some(e) => debug!("Connection {} ended: {}", self.id, e),
        }

        self.transition(ConnectionState::Closed);
        ConnectionSummary {
            id: self.id,
            role: self.role,
            duration,
            bytes_transferred: self.forwarder.transferred(),
            error,
        }
    }
}

enum HostEvent {
    Paired(Option<PeerHandle>),
    Read(std::io::Result<usize>),
}

/// Consume a replaced host's input until it hangs up
async fn drain<R>(reader: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        if reader.read(buf).await? == 0 {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycraft_core::MAX_FRAME_LEN;
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio::task::JoinHandle;

    fn context() -> RelayContext {
        RelayContext::new(RelayConfig::default())
    }

    fn spawn(ctx: &RelayContext, id: ConnectionId) -> (DuplexStream, JoinHandle<ConnectionSummary>) {
        let (local, remote) = tokio::io::duplex(64 * 1024);
        ctx.stats.connection_opened();
        let conn = Connection::new(id, format!("test-{}", id), ctx.clone());
        (remote, tokio::spawn(conn.run(local)))
    }

    async fn send(stream: &mut DuplexStream, msg: &ControlMessage) {
        codec::write_message(stream, msg).await.unwrap();
    }

    async fn recv(stream: &mut DuplexStream) -> Option<ControlMessage> {
        codec::read_message(stream, MAX_FRAME_LEN).await.unwrap()
    }

    async fn wait_for_host(ctx: &RelayContext, id: &str) {
        for _ in 0..200 {
            if ctx.registry.host_connection(id).is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("host {} never registered", id);
    }

    #[test]
    fn test_state_transitions() {
        use ConnectionState::*;
        assert!(Connecting.can_transition_to(Handshaking));
        assert!(Handshaking.can_transition_to(HostActive));
        assert!(Handshaking.can_transition_to(ClientActive));
        assert!(HostActive.can_transition_to(Closing));
        assert!(Handshaking.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Closed));

        assert!(!HostActive.can_transition_to(ClientActive));
        assert!(!Closing.can_transition_to(Closing));
        assert!(!Closed.can_transition_to(Closing));
        assert!(!Closed.can_transition_to(Handshaking));
    }

    #[tokio::test]
    async fn test_host_client_pairing_and_forwarding() {
        let ctx = context();
        let (mut host, host_task) = spawn(&ctx, 1);
        send(&mut host, &ControlMessage::register("abc")).await;
        wait_for_host(&ctx, "abc").await;

        let (mut client, client_task) = spawn(&ctx, 2);
        send(&mut client, &ControlMessage::connect("abc")).await;

        assert_eq!(recv(&mut host).await, Some(ControlMessage::ClientConnected));
        assert_eq!(recv(&mut client).await, Some(ControlMessage::Connected));

        client.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        host.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        host.write_all(b"world").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"world");

        // Client hangs up: its loop ends, the host's loop ends on its next write
        drop(client);
        let client_summary = client_task.await.unwrap();
        assert!(client_summary.error.is_none());
        assert_eq!(
            client_summary.role,
            Some(Role::Client {
                target_id: "abc".to_string()
            })
        );
        assert_eq!(client_summary.bytes_transferred, 5);

        host.write_all(b"late").await.unwrap();
        let host_summary = host_task.await.unwrap();
        assert!(matches!(
            host_summary.error,
            Some(RelayCraftError::PeerUnreachable(_))
        ));
        assert_eq!(host_summary.bytes_transferred, 5);

        assert_eq!(ctx.registry.host_count(), 0);
        assert_eq!(ctx.registry.session_count(), 0);
        assert_eq!(ctx.stats.active_connections(), 0);
        assert_eq!(ctx.stats.total_connections(), 2);
        assert_eq!(ctx.stats.bytes_transferred(), 10);
    }

    #[tokio::test]
    async fn test_host_hangup_ends_client_on_next_write() {
        let ctx = context();
        let (mut host, host_task) = spawn(&ctx, 1);
        send(&mut host, &ControlMessage::register("abc")).await;
        wait_for_host(&ctx, "abc").await;

        let (mut client, client_task) = spawn(&ctx, 2);
        send(&mut client, &ControlMessage::connect("abc")).await;
        assert_eq!(recv(&mut host).await, Some(ControlMessage::ClientConnected));
        assert_eq!(recv(&mut client).await, Some(ControlMessage::Connected));

        drop(host);
        let host_summary = host_task.await.unwrap();
        assert!(host_summary.error.is_none());
        assert_eq!(ctx.registry.host_count(), 0);
        assert_eq!(ctx.registry.session_count(), 1);
        assert_eq!(ctx.stats.active_connections(), 1);

        client.write_all(b"anyone?").await.unwrap();
        let client_summary = client_task.await.unwrap();
        assert!(matches!(
            client_summary.error,
            Some(RelayCraftError::PeerUnreachable(_))
        ));
        assert_eq!(client_summary.bytes_transferred, 0);

        assert_eq!(ctx.registry.session_count(), 0);
        assert_eq!(ctx.stats.active_connections(), 0);
        assert_eq!(ctx.stats.bytes_transferred(), 0);
    }

    #[tokio::test]
    async fn test_host_bytes_before_pairing_are_kept() {
        let ctx = context();
        let (mut host, _host_task) = spawn(&ctx, 1);
        send(&mut host, &ControlMessage::register("early")).await;
        wait_for_host(&ctx, "early").await;
        host.write_all(b"banner").await.unwrap();

        let (mut client, _client_task) = spawn(&ctx, 2);
        send(&mut client, &ControlMessage::connect("early")).await;
        assert_eq!(recv(&mut client).await, Some(ControlMessage::Connected));

        let mut buf = [0u8; 6];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"banner");
    }

    #[tokio::test]
    async fn test_unpaired_host_hangup_cleans_up() {
        let ctx = context();
        let (mut host, host_task) = spawn(&ctx, 1);
        send(&mut host, &ControlMessage::register("solo")).await;
        wait_for_host(&ctx, "solo").await;

        drop(host);
        let summary = host_task.await.unwrap();

        assert!(summary.error.is_none());
        assert_eq!(ctx.registry.host_count(), 0);
        assert_eq!(ctx.stats.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_unknown_host_reply() {
        let ctx = context();
        let (mut client, client_task) = spawn(&ctx, 1);
        send(&mut client, &ControlMessage::connect("ghost")).await;

        assert_eq!(
            recv(&mut client).await,
            Some(ControlMessage::error("Host ghost not found"))
        );
        assert_eq!(recv(&mut client).await, None);

        let summary = client_task.await.unwrap();
        assert!(matches!(summary.error, Some(RelayCraftError::HostNotFound(_))));
        assert_eq!(summary.role, None);
        assert_eq!(ctx.stats.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_host_failed_reply() {
        let ctx = context();
        let dead_host = PeerHandle::new(99, tokio::io::sink());
        dead_host.shutdown().await;
        let _watch = ctx.registry.register_host("abc", dead_host);

        let (mut client, client_task) = spawn(&ctx, 1);
        send(&mut client, &ControlMessage::connect("abc")).await;

        assert_eq!(
            recv(&mut client).await,
            Some(ControlMessage::error("Host failed"))
        );
        let summary = client_task.await.unwrap();
        assert!(matches!(summary.error, Some(RelayCraftError::HostFailed)));
        assert_eq!(ctx.registry.session_count(), 0);
    }

    #[tokio::test]
    async fn test_register_without_id_closes_silently() {
        let ctx = context();
        let (mut host, host_task) = spawn(&ctx, 1);
        send(&mut host, &ControlMessage::Register { id: None }).await;

        assert_eq!(recv(&mut host).await, None);
        let summary = host_task.await.unwrap();
        assert!(matches!(summary.error, Some(RelayCraftError::MissingHostId)));
        assert_eq!(ctx.registry.host_count(), 0);
    }

    #[tokio::test]
    async fn test_unexpected_action_closes_silently() {
        let ctx = context();
        let (mut peer, task) = spawn(&ctx, 1);
        send(&mut peer, &ControlMessage::Connected).await;

        assert_eq!(recv(&mut peer).await, None);
        let summary = task.await.unwrap();
        assert!(matches!(
            summary.error,
            Some(RelayCraftError::UnexpectedAction(ref a)) if a == "connected"
        ));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let config = RelayConfig {
            handshake_timeout_secs: 0,
            ..RelayConfig::default()
        };
        let ctx = RelayContext::new(config);
        let (_peer, task) = spawn(&ctx, 1);

        let summary = task.await.unwrap();
        assert!(matches!(summary.error, Some(RelayCraftError::HandshakeTimeout)));
        assert_eq!(ctx.stats.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_oversized_handshake_closes() {
        let ctx = context();
        let (mut peer, task) = spawn(&ctx, 1);
        peer.write_all(&((MAX_FRAME_LEN + 1) as u32).to_be_bytes())
            .await
            .unwrap();

        let summary = task.await.unwrap();
        assert!(matches!(
            summary.error,
            Some(RelayCraftError::FrameTooLarge { .. })
        ));
        assert_eq!(recv(&mut peer).await, None);
    }

    #[tokio::test]
    async fn test_replaced_host_keeps_running_until_hangup() {
        let ctx = context();
        let (mut first, first_task) = spawn(&ctx, 1);
        send(&mut first, &ControlMessage::register("abc")).await;
        wait_for_host(&ctx, "abc").await;

        let (mut second, _second_task) = spawn(&ctx, 2);
        send(&mut second, &ControlMessage::register("abc")).await;
        for _ in 0..200 {
            if ctx.registry.host_connection("abc") == Some(2) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(ctx.registry.host_connection("abc"), Some(2));

        drop(first);
        let summary = first_task.await.unwrap();
        assert!(summary.error.is_none());

        // The orphaned host's teardown left the replacement in place
        assert_eq!(ctx.registry.host_connection("abc"), Some(2));
        assert_eq!(ctx.stats.active_connections(), 1);
    }
}
