//! Relay engine configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest control payload the relay will accept (10 MiB)
pub const MAX_FRAME_LEN: usize = 10 * 1024 * 1024;

/// Length prefix size of a control frame
pub const FRAME_HEADER_LEN: usize = 4;

/// Relay engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Deadline for the single handshake message, in seconds
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    /// Read buffer size for the forwarding loops
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Largest accepted control payload
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
}

fn default_handshake_timeout() -> u64 {
    30
}

fn default_chunk_size() -> usize {
    8192
}

fn default_max_frame_len() -> usize {
    MAX_FRAME_LEN
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: default_handshake_timeout(),
            chunk_size: default_chunk_size(),
            max_frame_len: default_max_frame_len(),
        }
    }
}

impl RelayConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}
