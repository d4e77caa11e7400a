//! Periodic statistics log line

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::info;

use relaycraft_relay::{RelayMonitor, RelayStatus};

/// One-line summary of a status snapshot
pub fn render_status(status: &RelayStatus) -> String {
    format!(
        "uptime {}s, {} total / {} active connections, {} hosts, {} sessions, {:.2} MB relayed",
        status.uptime_secs,
        status.total_connections,
        status.active_connections,
        status.host_count,
        status.session_count,
        status.data_transferred as f64 / (1024.0 * 1024.0),
    )
}

/// Logs the relay counters on a fixed interval
pub struct StatsReporter {
    monitor: RelayMonitor,
    interval: Duration,
}

impl StatsReporter {
    pub fn new(monitor: RelayMonitor, interval: Duration) -> Self {
        Self { monitor, interval }
    }

    /// Report forever. The first report comes one interval after start.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            info!("Relay stats: {}", render_status(&self.monitor.status()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_status() {
        let status = RelayStatus {
            total_connections: 12,
            active_connections: 4,
            data_transferred: 3 * 1024 * 1024 / 2,
            start_time: 1_700_000_000,
            uptime_secs: 90,
            host_count: 2,
            session_count: 1,
        };

        assert_eq!(
            render_status(&status),
            "uptime 90s, 12 total / 4 active connections, 2 hosts, 1 sessions, 1.50 MB relayed"
        );
    }
}
