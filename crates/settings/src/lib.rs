//! RelayCraft Settings
//!
//! Process configuration for the relay daemon, read once at startup.
//!
//! ## Sources
//!
//! 1. Built-in defaults
//! 2. Optional JSON settings file
//! 3. Environment: `HOST`, `PORT`, `RELAY_PORT`, `RELAY_STATS_INTERVAL_SECS`
//!
//! ## Usage
//!
//! ```no_run
//! use relaycraft_settings::Settings;
//!
//! let settings = Settings::load(None)?;
//! println!("relay on {}", settings.relay_addr());
//! # Ok::<(), relaycraft_settings::SettingsError>(())
//! ```

mod config;

pub use config::Settings;
pub use relaycraft_core::RelayConfig;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;
