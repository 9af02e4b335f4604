//! Wires the protocol core's callbacks into this binary: applies config
//! snapshots/updates to a local `ConfigStore` and logs everything else in
//! place of rendering a UI.

use cardsync_proto::config_store::ConfigStore;
use cardsync_proto::message::{
    CommandMessage, ConfigValue, ConfigValueList, DeviceMetadata, Message, PerfStats, ScanReport,
    ServerConnectBanner, ViewportFrame,
};
use cardsync_proto::peer::{ConnectionObserver, PeerAddress};

pub struct ClientObserver {
    config: ConfigStore,
}

impl ClientObserver {
    pub fn new() -> Self {
        Self { config: ConfigStore::new() }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }
}

impl Default for ClientObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionObserver for ClientObserver {
    fn on_client_connect(&self, addr: PeerAddress) {
        log::info!("connected to server {addr}");
    }

    fn on_disconnect(&self, addr: Option<PeerAddress>, reason: &str) {
        match addr {
            Some(addr) => log::info!("disconnected from {addr}: {reason}"),
            None => log::info!("disconnected: {reason}"),
        }
    }

    fn on_application_message(&self, addr: PeerAddress, message: &Message) {
        match message {
            Message::ConfigValueList(ConfigValueList { entries }) => {
                self.config.apply_snapshot(entries.clone());
                log::info!("applied config snapshot from {addr}: {} entries", entries.len());
            }
            Message::ConfigValue(ConfigValue { entry }) => {
                let changed = self.config.apply_update(entry.clone());
                log::info!(
                    "applied config update {} = {} from {addr} (changed={changed})",
                    entry.full_name(),
                    entry.value.as_text()
                );
            }
            Message::ServerConnectBanner(ServerConnectBanner { server_version, protocol_versions }) => {
                log::info!(
                    "server {addr} is running {server_version}, protocol versions {protocol_versions:?}"
                );
            }
            Message::DeviceMetadata(DeviceMetadata { device_name, firmware_version, capabilities }) => {
                log::info!(
                    "device metadata from {addr}: {device_name} firmware {firmware_version}, capabilities {capabilities:?}"
                );
            }
            Message::ScanReport(ScanReport { deck_id, card_count, confidence_pct }) => {
                log::info!(
                    "scan report from {addr}: deck={deck_id} cards={card_count} confidence={confidence_pct}%"
                );
            }
            Message::PerfStats(PerfStats { fps_x100, cpu_pct, queue_depth }) => {
                log::debug!(
                    "perf stats from {addr}: fps={:.2} cpu={cpu_pct}% queue={queue_depth}",
                    f64::from(*fps_x100) / 100.0
                );
            }
            Message::ViewportFrame(ViewportFrame { sequence, width, height, jpeg_bytes }) => {
                log::debug!(
                    "viewport frame {sequence} from {addr}: {width}x{height}, {} bytes",
                    jpeg_bytes.len()
                );
            }
            Message::Command(CommandMessage { command, params }) => {
                log::info!("command from {addr}: {command} {params:?}");
            }
            other => log::debug!("unhandled application message from {addr}: {other:?}"),
        }
    }
}
