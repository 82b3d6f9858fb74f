use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::debug;
use wpa_ctrl::CtrlConfig;
use wpa_events::MonitorConfig;

const ENV_PREFIX: &str = "WPA_MONITOR";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub monitor: MonitorConfig,
    pub ctrl: CtrlConfig,
    /// Used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            ctrl: CtrlConfig::default(),
            log_filter: "wpa_monitor=info,wpa_events=info,wpa_ctrl=info".to_string(),
        }
    }
}

impl Settings {
    /// `<config_dir>/wpa-monitor/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wpa-monitor").join("config.toml"))
    }

    /// Layer `WPA_MONITOR__*` variables over the optional file at `path`
    /// (or the default location).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = Config::builder();
        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                if let Some(path) = Self::default_path() {
                    debug!("Looking for settings at {}", path.display());
                    builder = builder.add_source(File::from(path).required(false));
                }
            }
        }

        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")
    }
}
