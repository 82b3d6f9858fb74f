use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for [`crate::WpaEventMonitor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interface that owns unprefixed and group-interface events.
    pub p2p_interface: String,
    /// Name prefix of dynamically created P2P group interfaces.
    pub dynamic_p2p_prefix: String,
    pub connect_attempts: u32,
    pub connect_retry_interval_ms: u64,
    /// Receive errors tolerated in a row before the connection is dropped.
    pub max_recv_errors: u32,
    pub icon_chunk_size: usize,
    pub event_log_capacity: usize,
    pub verbose: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            p2p_interface: "p2p0".to_string(),
            dynamic_p2p_prefix: "p2p-".to_string(),
            connect_attempts: 5,
            connect_retry_interval_ms: 1000,
            max_recv_errors: 10,
            icon_chunk_size: crate::icon::ICON_CHUNK_SIZE,
            event_log_capacity: 256,
            verbose: false,
        }
    }
}

impl MonitorConfig {
    pub fn connect_retry_interval(&self) -> Duration {
        Duration::from_millis(self.connect_retry_interval_ms)
    }
}
