//! Wires the protocol core's connection callbacks into this binary: logs
//! connects/disconnects, and sends the post-handshake `ServerConnectBanner`
//! + `DeviceMetadata` pair a newly connected client expects.

use std::sync::Arc;

use cardsync_proto::config_store::ConfigStore;
use cardsync_proto::message::{
    CommandMessage, ConfigValue, ConfigValueList, DeviceMetadata, Message, ServerConnectBanner,
};
use cardsync_proto::peer::{ConnectionObserver, PeerAddress, PeerTable};

pub struct ServerObserver {
    peers: Arc<PeerTable>,
    device_name: String,
    firmware_version: String,
    config: ConfigStore,
}

impl ServerObserver {
    pub fn new(peers: Arc<PeerTable>, device_name: String, firmware_version: String) -> Self {
        Self { peers, device_name, firmware_version, config: default_config() }
    }
}

/// Seed values a freshly started server hands out to the first client that
/// asks for a snapshot. A real device would load these from its own local
/// settings; this stands in for that.
fn default_config() -> ConfigStore {
    use cardsync_proto::message::{ConfigEntry, ConfigValueKind};

    let store = ConfigStore::new();
    store.apply_snapshot(vec![
        ConfigEntry {
            category: "capture".into(),
            name: "ViewportType".into(),
            description: "0=off, 1=low-res preview, 2=full frames".into(),
            value: ConfigValueKind::Integer(1),
        },
        ConfigEntry {
            category: "capture".into(),
            name: "Brightness".into(),
            description: "camera brightness, -100..100".into(),
            value: ConfigValueKind::Integer(0),
        },
        ConfigEntry {
            category: "search".into(),
            name: "CodeDefinition".into(),
            description: "active deck recognition profile".into(),
            value: ConfigValueKind::String("Standard".into()),
        },
    ]);
    store
}

impl ConnectionObserver for ServerObserver {
    fn on_server_connect(&self, addr: PeerAddress) {
        let Some(peer) = self.peers.find_peer_by_address(addr) else { return };
        log::info!("peer connected: {addr} (session {})", peer.session_id());

        let mut protocol_versions = std::collections::HashMap::new();
        protocol_versions.insert("core".to_string(), 1u16);
        protocol_versions.insert("config-sync".to_string(), 1u16);

        let banner =
            ServerConnectBanner { server_version: self.firmware_version.clone(), protocol_versions };
        let metadata = DeviceMetadata {
            device_name: self.device_name.clone(),
            firmware_version: self.firmware_version.clone(),
            capabilities: vec!["scan".to_string(), "viewport".to_string()],
        };

        tokio::spawn(async move {
            if let Err(e) = peer.send_message(&banner).await {
                log::warn!("failed to send connect banner to {addr}: {e}");
            }
            if let Err(e) = peer.send_message(&metadata).await {
                log::warn!("failed to send device metadata to {addr}: {e}");
            }
        });
    }

    fn on_disconnect(&self, addr: Option<PeerAddress>, reason: &str) {
        match addr {
            Some(addr) => log::info!("peer {addr} disconnected: {reason}"),
            None => log::info!("disconnected: {reason}"),
        }
    }

    fn on_application_message(&self, addr: PeerAddress, message: &Message) {
        match message {
            Message::Command(CommandMessage { command, params }) => {
                log::info!("peer {addr} sent command {command:?} {params:?} (server ignores inbound commands; the admin console is local-only)");
            }
            Message::ConfigValueList(ConfigValueList { entries }) if entries.is_empty() => {
                log::info!("peer {addr} requested a config snapshot");
                let Some(peer) = self.peers.find_peer_by_address(addr) else { return };
                let snapshot = ConfigValueList { entries: self.config.snapshot() };
                tokio::spawn(async move {
                    if let Err(e) = peer.send_message(&snapshot).await {
                        log::warn!("failed to send config snapshot to {addr}: {e}");
                    }
                });
            }
            Message::ConfigValueList(ConfigValueList { entries }) => {
                self.config.apply_snapshot(entries.clone());
                log::info!("peer {addr} pushed a config snapshot: {} entries", entries.len());
            }
            Message::ConfigValue(ConfigValue { entry }) => {
                let changed = self.config.apply_update(entry.clone());
                log::info!(
                    "peer {addr} updated {} = {} (changed={changed})",
                    entry.full_name(),
                    entry.value.as_text()
                );
            }
            other => log::debug!("unhandled application message from {addr}: {other:?}"),
        }
    }
}
