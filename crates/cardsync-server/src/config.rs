//! TOML-backed server config, mirroring the CLI package's `Config::load`:
//! read `config.toml` from a platform config directory, writing a commented
//! template and refusing to start if none exists yet.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_discovery_port() -> u16 {
    cardsync_proto::DEFAULT_DISCOVERY_PORT
}

fn default_control_port() -> u16 {
    cardsync_proto::DEFAULT_CONTROL_PORT
}

fn default_device_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "cardsync-server".to_string())
}

fn default_firmware_version() -> String {
    "0.1.0".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_firmware_version")]
    pub firmware_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            discovery_port: default_discovery_port(),
            control_port: default_control_port(),
            device_name: default_device_name(),
            firmware_version: default_firmware_version(),
        }
    }
}

impl ServerConfig {
    const TEMPLATE: &'static str = "# cardsync-server configuration\n\
        # discovery_port = 54670\n\
        # control_port = 54671\n\
        # device_name = \"cardsync-server\"\n\
        # firmware_version = \"0.1.0\"\n";

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
            .join("server.toml")
    }
}
