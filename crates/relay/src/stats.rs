//! Relay counters
//!
//! Updated only at accept, at teardown and once per forwarded chunk. The
//! status surface reads them through [`RelayMonitor`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::registry::Registry;

/// Monotonic relay counters
pub struct RelayStats {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    bytes_transferred: AtomicU64,
    start_time: SystemTime,
    started_at: Instant,
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            bytes_transferred: AtomicU64::new(0),
            start_time: SystemTime::now(),
            started_at: Instant::now(),
        }
    }

    /// A connection was accepted
    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// A connection finished teardown
    pub fn connection_closed(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// A chunk of `n` bytes was forwarded
    pub fn record_bytes(&self, n: u64) {
        self.bytes_transferred.fetch_add(n, Ordering::Relaxed);
    }

    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred.load(Ordering::Relaxed)
    }

    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the relay, as served by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatus {
    pub total_connections: u64,
    pub active_connections: u64,
    /// Bytes forwarded in either direction
    pub data_transferred: u64,
    /// Unix timestamp (seconds)
    pub start_time: u64,
    pub uptime_secs: u64,
    pub host_count: usize,
    pub session_count: usize,
}

/// Read-only access to the relay's counters and registry sizes
#[derive(Clone)]
pub struct RelayMonitor {
    registry: Arc<Registry>,
    stats: Arc<RelayStats>,
}

impl RelayMonitor {
    pub fn new(registry: Arc<Registry>, stats: Arc<RelayStats>) -> Self {
        Self { registry, stats }
    }

    pub fn status(&self) -> RelayStatus {
        RelayStatus {
            total_connections: self.stats.total_connections(),
            active_connections: self.stats.active_connections(),
            data_transferred: self.stats.bytes_transferred(),
            start_time: self
                .stats
                .start_time()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            uptime_secs: self.stats.uptime().as_secs(),
            host_count: self.registry.host_count(),
            session_count: self.registry.session_count(),
        }
    }
}
