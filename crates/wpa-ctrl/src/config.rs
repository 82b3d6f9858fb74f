use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtrlConfig {
    /// The supplicant's control socket
    pub ctrl_path: PathBuf,
    /// Where our own reply sockets are bound
    pub local_dir: PathBuf,
    /// Milliseconds to wait for a command reply
    pub command_timeout_ms: u64,
}

impl Default for CtrlConfig {
    fn default() -> Self {
        Self {
            ctrl_path: PathBuf::from("/var/run/wpa_supplicant-global"),
            local_dir: PathBuf::from("/tmp"),
            command_timeout_ms: 10_000,
        }
    }
}

impl CtrlConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}
