//! Typed message layer: a closed set of wire types plus a single dispatch
//! point keyed on the stable textual id carried in every [`crate::packet::PayloadInfo`].
//!
//! A tagged enum rather than a dynamic trait-object registry — the core
//! message set is small and known at compile time, and [`Message::Unknown`]
//! is the escape hatch for application payloads the core doesn't interpret.

pub mod app;
pub mod config_sync;
pub mod core;

use crate::codec::{decode_complete, Encodable};
use crate::packet::{Payload, PayloadInfo};

pub use app::{
    CommandMessage, DeviceMetadata, PerfStats, ScanReport, ServerConnectBanner, ViewportFrame,
};
pub use config_sync::{ConfigEntry, ConfigValue, ConfigValueKind, ConfigValueList};
pub use core::{Advertise, AdvertiseAck, Disconnect, Ping, PingAck};

/// Implemented by every message type. `ID` is a stable textual UUID;
/// `VERSION` is this message type's own payload version (default 0).
pub trait WireMessage: Sized {
    const ID: &'static str;
    const VERSION: u16 = 0;

    fn encode_body(&self) -> Vec<u8>;
    fn decode_body(data: &[u8]) -> Option<Self>;
}

/// Wrap a concrete message into a framed [`Payload`] ready for
/// [`crate::packet::construct`].
pub fn to_payload<M: WireMessage>(message: &M) -> Payload {
    Payload {
        info: PayloadInfo { version: M::VERSION, id: M::ID.to_string() },
        data: message.encode_body(),
    }
}

/// Every message the core knows how to interpret, plus an `Unknown` case for
/// anything else. Unknown ids are passed through untouched so upper layers
/// may route them; a known id whose body fails to decode is logged and
/// dropped rather than surfaced as `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Advertise(Advertise),
    AdvertiseAck(AdvertiseAck),
    Ping(Ping),
    PingAck(PingAck),
    Disconnect(Disconnect),
    ConfigValueList(ConfigValueList),
    ConfigValue(ConfigValue),
    ScanReport(ScanReport),
    DeviceMetadata(DeviceMetadata),
    ViewportFrame(ViewportFrame),
    PerfStats(PerfStats),
    ServerConnectBanner(ServerConnectBanner),
    Command(CommandMessage),
    Unknown(Payload),
}

macro_rules! dispatch_arm {
    ($payload:expr, $variant:ident, $ty:ty) => {
        if $payload.info.id == <$ty>::ID {
            return match <$ty>::decode_body(&$payload.data) {
                Some(m) => Some(Message::$variant(m)),
                None => {
                    log::warn!(
                        "dropping {} payload: body failed to decode ({} bytes)",
                        <$ty>::ID,
                        $payload.data.len()
                    );
                    Some(Message::Unknown($payload))
                }
            };
        }
    };
}

/// Decode a [`Payload`] into a [`Message`]. Returns `None` only when the id
/// is recognised but the body is malformed in a way the caller must treat
/// as "handled (drop)" rather than route elsewhere — in practice this
/// function always returns `Some`; the `None` branch is reserved for
/// call sites that want to distinguish "unroutable" from "drop" explicitly.
pub fn decode(payload: Payload) -> Message {
    dispatch_arm!(payload, Advertise, Advertise);
    dispatch_arm!(payload, AdvertiseAck, AdvertiseAck);
    dispatch_arm!(payload, Ping, Ping);
    dispatch_arm!(payload, PingAck, PingAck);
    dispatch_arm!(payload, Disconnect, Disconnect);
    dispatch_arm!(payload, ConfigValueList, ConfigValueList);
    dispatch_arm!(payload, ConfigValue, ConfigValue);
    dispatch_arm!(payload, ScanReport, ScanReport);
    dispatch_arm!(payload, DeviceMetadata, DeviceMetadata);
    dispatch_arm!(payload, ViewportFrame, ViewportFrame);
    dispatch_arm!(payload, PerfStats, PerfStats);
    dispatch_arm!(payload, ServerConnectBanner, ServerConnectBanner);
    dispatch_arm!(payload, Command, CommandMessage);
    Message::Unknown(payload)
}

/// Helper for message bodies that are themselves wire-encodable structs:
/// encode via [`Encodable`] and decode via [`decode_complete`], matching the
/// "leftover bytes are corruption" rule used everywhere else on the wire.
pub(crate) fn encode_body_of<T: Encodable>(value: &T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.encode(&mut buf).expect("message bodies stay well under 64KiB");
    buf
}

pub(crate) fn decode_body_of<T: crate::codec::Decodable>(data: &[u8]) -> Option<T> {
    decode_complete(data).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_id_is_not_handled() {
        let payload = Payload {
            info: PayloadInfo { version: 0, id: "00000000-0000-0000-0000-000000000000".into() },
            data: vec![1, 2, 3],
        };
        assert_eq!(decode(payload.clone()), Message::Unknown(payload));
    }

    #[test]
    fn known_id_bad_body_drops_not_unknown_passthrough() {
        // Ping's body must be empty; feed it garbage.
        let payload = Payload {
            info: PayloadInfo { version: 0, id: Ping::ID.to_string() },
            data: vec![9, 9, 9],
        };
        match decode(payload) {
            Message::Unknown(_) => {}
            other => panic!("expected Unknown(drop), got {other:?}"),
        }
    }
}
