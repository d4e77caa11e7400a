//! Configuration types

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use relaycraft_core::RelayConfig;

use crate::{Result, SettingsError};

/// Main settings structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Interface both listeners bind to
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// HTTP health endpoint port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Relay TCP port; `port + 1` when unset
    #[serde(default)]
    pub relay_port: Option<u16>,

    /// Serve the HTTP health endpoint
    #[serde(default = "default_true")]
    pub health_enabled: bool,

    /// Interval between statistics reports in seconds; 0 disables them
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Relay engine settings
    #[serde(default)]
    pub relay: RelayConfig,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8888
}

fn default_true() -> bool {
    true
}

fn default_stats_interval() -> u64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            port: default_port(),
            relay_port: None,
            health_enabled: true,
            stats_interval_secs: default_stats_interval(),
            relay: RelayConfig::default(),
        }
    }
}

impl Settings {
    /// Defaults, then the optional settings file, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        settings.with_env(|var| std::env::var(var).ok())
    }

    /// Load settings from a JSON file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
        let settings: Settings = serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
        info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Apply environment overrides looked up through `lookup`
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST").filter(|h| !h.is_empty()) {
            self.bind_host = host;
        }
        if let Some(port) = parse_env(&lookup, "PORT")? {
            self.port = port;
        }
        if let Some(port) = parse_env(&lookup, "RELAY_PORT")? {
            self.relay_port = Some(port);
        }
        if let Some(secs) = parse_env(&lookup, "RELAY_STATS_INTERVAL_SECS")? {
            self.stats_interval_secs = secs;
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.relay_port.is_none() && self.port == u16::MAX {
            return Err(SettingsError::Invalid(format!(
                "port {} leaves no room for the default relay port",
                self.port
            )));
        }
        if self.relay.chunk_size == 0 {
            return Err(SettingsError::Invalid("relay.chunk_size must be > 0".to_string()));
        }
        Ok(())
    }

    /// Relay TCP port
    pub fn relay_port(&self) -> u16 {
        self.relay_port.unwrap_or(self.port.saturating_add(1))
    }

    /// `host:port` of the relay listener
    pub fn relay_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.relay_port())
    }

    /// `host:port` of the health endpoint
    pub fn health_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    /// Statistics report interval, `None` when disabled
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}

fn parse_env<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SettingsError::InvalidEnv { var, value }),
    }
}
