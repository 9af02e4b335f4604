//! Application-layer messages: the payloads specific to the card-scan
//! workload, carried over the same framed wire as the core handshake
//! messages. The core dispatcher only ever moves these opaquely; it has no
//! opinion on their contents.

use std::collections::HashMap;

use super::{decode_body_of, encode_body_of, WireMessage};
use crate::codec::{Decodable, Encodable, WireError};

/// server → client. Summary of a single completed deck scan from the
/// vision pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub deck_id: String,
    pub card_count: u16,
    pub confidence_pct: u8,
}

impl Encodable for ScanReport {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.deck_id.encode(out)?;
        self.card_count.encode(out)?;
        self.confidence_pct.encode(out)
    }
}

impl Decodable for ScanReport {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        Ok(Self {
            deck_id: String::decode(buf, cursor)?,
            card_count: u16::decode(buf, cursor)?,
            confidence_pct: u8::decode(buf, cursor)?,
        })
    }
}

impl WireMessage for ScanReport {
    const ID: &'static str = "D274875D-5DF0-45F7-B218-CFC1E69BD7AA";
    fn encode_body(&self) -> Vec<u8> {
        encode_body_of(self)
    }
    fn decode_body(data: &[u8]) -> Option<Self> {
        decode_body_of(data)
    }
}

/// server → client, sent once right after the handshake completes.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMetadata {
    pub device_name: String,
    pub firmware_version: String,
    pub capabilities: Vec<String>,
}

impl Encodable for DeviceMetadata {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.device_name.encode(out)?;
        self.firmware_version.encode(out)?;
        self.capabilities.encode(out)
    }
}

impl Decodable for DeviceMetadata {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        Ok(Self {
            device_name: String::decode(buf, cursor)?,
            firmware_version: String::decode(buf, cursor)?,
            capabilities: Decodable::decode(buf, cursor)?,
        })
    }
}

impl WireMessage for DeviceMetadata {
    const ID: &'static str = "F218C1A5-F1B7-4883-9AA1-50860A4213B4";
    fn encode_body(&self) -> Vec<u8> {
        encode_body_of(self)
    }
    fn decode_body(data: &[u8]) -> Option<Self> {
        decode_body_of(data)
    }
}

/// server → client. One frame of the live scan preview, JPEG-encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportFrame {
    pub sequence: u64,
    pub width: u16,
    pub height: u16,
    pub jpeg_bytes: Vec<u8>,
}

impl Encodable for ViewportFrame {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.sequence.encode(out)?;
        self.width.encode(out)?;
        self.height.encode(out)?;
        self.jpeg_bytes.encode(out)
    }
}

impl Decodable for ViewportFrame {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        Ok(Self {
            sequence: u64::decode(buf, cursor)?,
            width: u16::decode(buf, cursor)?,
            height: u16::decode(buf, cursor)?,
            jpeg_bytes: Vec::<u8>::decode(buf, cursor)?,
        })
    }
}

impl WireMessage for ViewportFrame {
    const ID: &'static str = "CD75507A-49DB-46B8-8833-08458AC0BEC6";
    fn encode_body(&self) -> Vec<u8> {
        encode_body_of(self)
    }
    fn decode_body(data: &[u8]) -> Option<Self> {
        decode_body_of(data)
    }
}

/// server → client, periodic. `fps_x100` avoids floats on a metric the
/// server only ever displays, not computes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfStats {
    pub fps_x100: u16,
    pub cpu_pct: u8,
    pub queue_depth: u16,
}

impl Encodable for PerfStats {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.fps_x100.encode(out)?;
        self.cpu_pct.encode(out)?;
        self.queue_depth.encode(out)
    }
}

impl Decodable for PerfStats {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        Ok(Self {
            fps_x100: u16::decode(buf, cursor)?,
            cpu_pct: u8::decode(buf, cursor)?,
            queue_depth: u16::decode(buf, cursor)?,
        })
    }
}

impl WireMessage for PerfStats {
    const ID: &'static str = "21C30D68-B2E4-459F-B704-ED44ADB4DBD9";
    fn encode_body(&self) -> Vec<u8> {
        encode_body_of(self)
    }
    fn decode_body(data: &[u8]) -> Option<Self> {
        decode_body_of(data)
    }
}

/// server → client, sent right after `AdvertiseAck`. Lets a client refuse to
/// proceed if its own protocol version isn't among those the server lists.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConnectBanner {
    pub server_version: String,
    pub protocol_versions: HashMap<String, u16>,
}

impl Encodable for ServerConnectBanner {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.server_version.encode(out)?;
        self.protocol_versions.encode(out)
    }
}

impl Decodable for ServerConnectBanner {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        Ok(Self {
            server_version: String::decode(buf, cursor)?,
            protocol_versions: Decodable::decode(buf, cursor)?,
        })
    }
}

impl WireMessage for ServerConnectBanner {
    const ID: &'static str = "A8BE1F7F-F942-47BA-84EC-B3BE0058DCDE";
    fn encode_body(&self) -> Vec<u8> {
        encode_body_of(self)
    }
    fn decode_body(data: &[u8]) -> Option<Self> {
        decode_body_of(data)
    }
}

/// server → client. Administrative command with freeform string params, e.g.
/// `("shutdown", [])` or `("set_capture_fps", ["30"])`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandMessage {
    pub command: String,
    pub params: Vec<String>,
}

impl Encodable for CommandMessage {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.command.encode(out)?;
        self.params.encode(out)
    }
}

impl Decodable for CommandMessage {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        Ok(Self {
            command: String::decode(buf, cursor)?,
            params: Decodable::decode(buf, cursor)?,
        })
    }
}

impl WireMessage for CommandMessage {
    const ID: &'static str = "2694BEA9-0370-4885-BA14-F06DADA20270";
    fn encode_body(&self) -> Vec<u8> {
        encode_body_of(self)
    }
    fn decode_body(data: &[u8]) -> Option<Self> {
        decode_body_of(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_report_roundtrip() {
        let msg = ScanReport { deck_id: "deck-42".into(), card_count: 52, confidence_pct: 97 };
        assert_eq!(ScanReport::decode_body(&msg.encode_body()), Some(msg));
    }

    #[test]
    fn device_metadata_roundtrip() {
        let msg = DeviceMetadata {
            device_name: "scanner-1".into(),
            firmware_version: "1.4.2".into(),
            capabilities: vec!["ir".into(), "autofocus".into()],
        };
        assert_eq!(DeviceMetadata::decode_body(&msg.encode_body()), Some(msg));
    }

    #[test]
    fn viewport_frame_roundtrip() {
        let msg = ViewportFrame {
            sequence: 9001,
            width: 640,
            height: 480,
            jpeg_bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
        };
        assert_eq!(ViewportFrame::decode_body(&msg.encode_body()), Some(msg));
    }

    #[test]
    fn perf_stats_roundtrip() {
        let msg = PerfStats { fps_x100: 2997, cpu_pct: 62, queue_depth: 3 };
        assert_eq!(PerfStats::decode_body(&msg.encode_body()), Some(msg));
    }

    #[test]
    fn server_connect_banner_roundtrip() {
        let mut protocol_versions = HashMap::new();
        protocol_versions.insert("core".to_string(), 1u16);
        protocol_versions.insert("config_sync".to_string(), 1u16);
        let msg = ServerConnectBanner { server_version: "0.1.0".into(), protocol_versions };
        assert_eq!(ServerConnectBanner::decode_body(&msg.encode_body()), Some(msg));
    }

    #[test]
    fn command_message_roundtrip() {
        let msg = CommandMessage { command: "set_capture_fps".into(), params: vec!["30".into()] };
        assert_eq!(CommandMessage::decode_body(&msg.encode_body()), Some(msg));
    }

    #[test]
    fn empty_params_roundtrip() {
        let msg = CommandMessage { command: "shutdown".into(), params: vec![] };
        assert_eq!(CommandMessage::decode_body(&msg.encode_body()), Some(msg));
    }
}
