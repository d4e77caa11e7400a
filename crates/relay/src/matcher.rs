//! Client → host matching
//!
//! Handles a `connect` request end to end: look up the host, create the
//! session, notify the host, answer the client. Only after both messages went
//! out is the session activated and the host task woken, so neither peer can
//! see forwarded bytes before its control reply.

use tracing::{debug, warn};

use relaycraft_core::{non_empty, ControlMessage, RelayCraftError, Result};

use crate::peer::PeerHandle;
use crate::registry::Registry;

/// An active client → host pairing
#[derive(Debug)]
pub struct Pairing {
    pub target_id: String,
    pub host: PeerHandle,
}

/// Pair `client` with the host registered under `target_id`.
///
/// Failures with a defined wire reply (`No target ID`, `Host <id> not
/// found`, `Host failed`) are sent to the client before returning. On any
/// error the registry holds no session for the client.
pub async fn connect(
    registry: &Registry,
    target_id: Option<String>,
    client: &PeerHandle,
) -> Result<Pairing> {
    let Some(target_id) = non_empty(target_id) else {
        return Err(reject(client, RelayCraftError::NoTargetId).await);
    };

    debug!("Client {} → {}", client.id(), target_id);

    let host = match registry.begin_session(&target_id, client.clone()) {
        Ok(host) => host,
        Err(e) => {
            warn!("Host not found: {}", target_id);
            return Err(reject(client, e).await);
        }
    };

    if let Err(e) = host.send(&ControlMessage::ClientConnected).await {
        debug!("Notifying host {} failed: {}", target_id, e);
        registry.remove_session(client.id());
        return Err(reject(client, RelayCraftError::HostFailed).await);
    }

    if let Err(e) = client.send(&ControlMessage::Connected).await {
        registry.remove_session(client.id());
        return Err(e);
    }

    registry.activate_session(client.id());
    Ok(Pairing { target_id, host })
}

/// Send the error's wire reply, if it has one, and hand the error back
async fn reject(client: &PeerHandle, err: RelayCraftError) -> RelayCraftError {
    if let Some(reply) = err.reply() {
        if let Err(e) = client.send(&reply).await {
            debug!("Error reply to connection {} failed: {}", client.id(), e);
        }
    }
    err
}
