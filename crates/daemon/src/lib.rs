//! RelayCraft Daemon
//!
//! Process wrapper around the relay engine.
//!
//! ## Components
//!
//! - **health**: HTTP `GET /` and `GET /health` returning a status snapshot
//! - **StatsReporter**: periodic log line with the relay counters
//!
//! The relay listener itself lives in `relaycraft-relay`; the binary wires
//! settings, logging and the two surfaces above around it.

mod health;
mod reporter;

pub use health::{router, serve_health, HealthResponse};
pub use reporter::{render_status, StatsReporter};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Settings error: {0}")]
    Settings(#[from] relaycraft_settings::SettingsError),

    #[error("Relay error: {0}")]
    Relay(#[from] relaycraft_core::RelayCraftError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
