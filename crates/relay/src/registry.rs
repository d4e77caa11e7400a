//! Host and session registry
//!
//! Maps host id → registered host connection and client connection → the
//! host it asked for. All reads and writes go through one lock; the maps
//! themselves are never handed out.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use relaycraft_core::{ConnectionId, RelayCraftError, Result};

use crate::peer::PeerHandle;

/// A host offering a service under `id`
pub struct HostRegistration {
    pub id: String,
    pub handle: PeerHandle,
    pub registered_at: Instant,
    /// Client currently paired with this registration
    paired_client: Option<ConnectionId>,
    /// Wakes the host task when a client is paired
    pairing_tx: watch::Sender<Option<PeerHandle>>,
}

/// A client's request to reach `target_host_id`
pub struct ClientSession {
    pub handle: PeerHandle,
    pub target_host_id: String,
    /// Host connection the session was matched against
    pub host_conn: ConnectionId,
    pub connected_at: Instant,
    /// Set once both handshake replies went out
    pub active: bool,
}

/// Host side of a pairing notification
pub struct PairingWatch {
    rx: watch::Receiver<Option<PeerHandle>>,
}

impl PairingWatch {
    /// Wait for a client to be paired with this host.
    ///
    /// Returns `None` once the registration is gone (replaced by a later
    /// registrant or removed) without a client having been paired.
    pub async fn paired(&mut self) -> Option<PeerHandle> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(paired) => paired.clone(),
            Err(_) => None,
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    hosts: HashMap<String, HostRegistration>,
    sessions: HashMap<ConnectionId, ClientSession>,
}

/// Concurrency-safe host/session store
#[derive(Default)]
pub struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` as the host for `id`, replacing any earlier one.
    ///
    /// The replaced connection is not notified and is never matched again.
    pub fn register_host(&self, id: &str, handle: PeerHandle) -> PairingWatch {
        let (pairing_tx, rx) = watch::channel(None);
        let conn = handle.id();
        let registration = HostRegistration {
            id: id.to_string(),
            handle,
            registered_at: Instant::now(),
            paired_client: None,
            pairing_tx,
        };

        let replaced = self.inner.lock().hosts.insert(id.to_string(), registration);
        if let Some(old) = replaced {
            warn!(
                "Host {} re-registered by connection {}, orphaning connection {}",
                id,
                conn,
                old.handle.id()
            );
        }

        PairingWatch { rx }
    }

    /// Remove the registration for `id` if connection `conn` still owns it
    pub fn remove_host(&self, id: &str, conn: ConnectionId) -> Option<HostRegistration> {
        let mut inner = self.inner.lock();
        let owned = inner
            .hosts
            .get(id)
            .is_some_and(|registration| registration.handle.id() == conn);
        if owned {
            inner.hosts.remove(id)
        } else {
            None
        }
    }

    /// Create a pending session for `client` targeting `target_id`.
    ///
    /// Returns the host's handle. The host is not woken until
    /// [`Registry::activate_session`] runs.
    pub fn begin_session(&self, target_id: &str, client: PeerHandle) -> Result<PeerHandle> {
        let mut inner = self.inner.lock();
        let host = inner
            .hosts
            .get(target_id)
            .map(|registration| registration.handle.clone())
            .ok_or_else(|| RelayCraftError::HostNotFound(target_id.to_string()))?;

        let session = ClientSession {
            handle: client,
            target_host_id: target_id.to_string(),
            host_conn: host.id(),
            connected_at: Instant::now(),
            active: false,
        };
        inner.sessions.insert(session.handle.id(), session);

        Ok(host)
    }

    /// Mark the session active and wake its host if the host is not yet
    /// paired. Returns whether the host was woken.
    pub fn activate_session(&self, client_conn: ConnectionId) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let Some(session) = inner.sessions.get_mut(&client_conn) else {
            return false;
        };
        session.active = true;

        let Some(host) = inner.hosts.get_mut(&session.target_host_id) else {
            return false;
        };
        if host.handle.id() != session.host_conn || host.paired_client.is_some() {
            return false;
        }

        host.paired_client = Some(client_conn);
        host.pairing_tx.send_replace(Some(session.handle.clone()));
        debug!(
            "Paired client {} with host {} ({})",
            client_conn,
            host.id,
            host.handle.id()
        );
        true
    }

    /// Remove the session owned by `client_conn`.
    ///
    /// If it was the host's paired client, the oldest remaining active
    /// session matched against the same host connection takes its place.
    pub fn remove_session(&self, client_conn: ConnectionId) -> Option<ClientSession> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let session = inner.sessions.remove(&client_conn)?;

        let Some(host) = inner.hosts.get_mut(&session.target_host_id) else {
            return Some(session);
        };
        if host.paired_client != Some(client_conn) {
            return Some(session);
        }

        let host_conn = host.handle.id();
        let successor = inner
            .sessions
            .iter()
            .filter(|(_, s)| s.active && s.host_conn == host_conn && s.target_host_id == host.id)
            .min_by_key(|(conn, s)| (s.connected_at, **conn))
            .map(|(conn, s)| (*conn, s.handle.clone()));

        match successor {
            Some((next, handle)) => {
                host.paired_client = Some(next);
                host.pairing_tx.send_replace(Some(handle));
                debug!(
                    "Client {} left, host {} now paired with client {}",
                    client_conn, host.id, next
                );
            }
            None => {
                host.paired_client = None;
                host.pairing_tx.send_replace(None);
            }
        }

        Some(session)
    }

    /// Client currently paired with the host registered as `host_id`
    pub fn paired_client(&self, host_id: &str) -> Option<ConnectionId> {
        self.inner
            .lock()
            .hosts
            .get(host_id)
            .and_then(|registration| registration.paired_client)
    }

    /// Connection currently registered as `host_id`
    pub fn host_connection(&self, host_id: &str) -> Option<ConnectionId> {
        self.inner
            .lock()
            .hosts
            .get(host_id)
            .map(|registration| registration.handle.id())
    }

    #[cfg(test)]
    fn session_target(&self, client_conn: ConnectionId) -> Option<String> {
        self.inner
            .lock()
            .sessions
            .get(&client_conn)
            .map(|session| session.target_host_id.clone())
    }

    pub fn host_count(&self) -> usize {
        self.inner.lock().hosts.len()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }
}
