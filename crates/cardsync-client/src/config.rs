//! TOML-backed client config; same `Config::load` shape as the server's,
//! plus the `loopback` flag that actually matters here (the advertiser is
//! the thing that broadcasts).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_discovery_port() -> u16 {
    cardsync_proto::DEFAULT_DISCOVERY_PORT
}

fn default_control_port() -> u16 {
    cardsync_proto::DEFAULT_CONTROL_PORT + 10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    /// This client's own control port, conventionally server-control + 10
    /// so both roles can run on one host.
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    /// Advertise to 127.0.0.1 instead of 255.255.255.255, for local testing.
    #[serde(default)]
    pub loopback: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            discovery_port: default_discovery_port(),
            control_port: default_control_port(),
            loopback: false,
        }
    }
}

impl ClientConfig {
    const TEMPLATE: &'static str = "# cardsync-client configuration\n\
        # discovery_port = 54670\n\
        # control_port = 54681\n\
        # loopback = false\n";

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create config dir {parent:?}"))?;
            }
            std::fs::write(path, Self::TEMPLATE)
                .with_context(|| format!("failed to write default config to {path:?}"))?;
            log::info!("wrote default config to {path:?}; edit it and rerun if needed");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {path:?}"))?;
        Ok(config)
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cardsync")
            .join("client.toml")
    }
}
