use serde::{Deserialize, Serialize};

use crate::{RelayCraftError, Result};

/// Relay-local identifier of one accepted connection
pub type ConnectionId = u64;

/// Control message exchanged during the handshake.
///
/// Encoded as a JSON object whose `action` field selects the variant. After
/// the handshake completes the socket carries raw bytes only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Host → relay: offer a service under `id`
    Register {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Client → relay: pair with the host registered as `target_id`
    Connect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
    },
    /// Relay → host: a client has been paired
    ClientConnected,
    /// Relay → client: pairing succeeded
    Connected,
    /// Relay → either peer: the request failed
    Error { error: String },
}

impl ControlMessage {
    pub fn register(id: impl Into<String>) -> Self {
        Self::Register { id: Some(id.into()) }
    }

    pub fn connect(target_id: impl Into<String>) -> Self {
        Self::Connect {
            target_id: Some(target_id.into()),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    /// Wire name of the `action` field
    pub fn action(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Connect { .. } => "connect",
            Self::ClientConnected => "client_connected",
            Self::Connected => "connected",
            Self::Error { .. } => "error",
        }
    }

    /// Serialize to the JSON payload carried inside a frame
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| RelayCraftError::SerializationError(e.to_string()))
    }

    /// Parse a frame payload
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| RelayCraftError::MalformedMessage(e.to_string()))
    }
}

/// Host id carried by a register or connect request, if present and non-empty
pub fn non_empty(id: Option<String>) -> Option<String> {
    id.filter(|id| !id.is_empty())
}
