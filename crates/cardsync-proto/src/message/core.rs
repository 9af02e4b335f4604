//! Core protocol messages: discovery handshake, liveness, and ordered
//! hangup.

use super::{decode_body_of, encode_body_of, WireMessage};
use crate::codec::{Decodable, Encodable, WireError};

/// client → broadcast. Carries the port the sender's control listener is
/// bound to, so the server knows where to unicast `AdvertiseAck`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advertise {
    pub control_port: u16,
}

impl Encodable for Advertise {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.control_port.encode(out)
    }
}

impl Decodable for Advertise {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        Ok(Self { control_port: u16::decode(buf, cursor)? })
    }
}

impl WireMessage for Advertise {
    const ID: &'static str = "FD17A936-5C42-4296-AB9C-FBC1430EDB3B";
    fn encode_body(&self) -> Vec<u8> {
        encode_body_of(self)
    }
    fn decode_body(data: &[u8]) -> Option<Self> {
        decode_body_of(data)
    }
}

/// server → client, unicast reply to `Advertise`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertiseAck {
    pub control_port: u16,
}

impl Encodable for AdvertiseAck {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.control_port.encode(out)
    }
}

impl Decodable for AdvertiseAck {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        Ok(Self { control_port: u16::decode(buf, cursor)? })
    }
}

impl WireMessage for AdvertiseAck {
    const ID: &'static str = "BDD7DE37-911C-4183-9166-8F852C599C60";
    fn encode_body(&self) -> Vec<u8> {
        encode_body_of(self)
    }
    fn decode_body(data: &[u8]) -> Option<Self> {
        decode_body_of(data)
    }
}

/// server → client, empty body. Liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ping;

impl WireMessage for Ping {
    const ID: &'static str = "0EE902FD-514F-4DF6-831C-D9ED07460D46";
    fn encode_body(&self) -> Vec<u8> {
        Vec::new()
    }
    fn decode_body(data: &[u8]) -> Option<Self> {
        if data.is_empty() {
            Some(Ping)
        } else {
            None
        }
    }
}

/// client → server, empty body. Reply to `Ping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingAck;

impl WireMessage for PingAck {
    const ID: &'static str = "04B22FF2-93D7-4558-A422-FD61EA067732";
    fn encode_body(&self) -> Vec<u8> {
        Vec::new()
    }
    fn decode_body(data: &[u8]) -> Option<Self> {
        if data.is_empty() {
            Some(PingAck)
        } else {
            None
        }
    }
}

/// either → either. Ordered hangup with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub reason: String,
}

impl Disconnect {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl Encodable for Disconnect {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.reason.encode(out)
    }
}

impl Decodable for Disconnect {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        Ok(Self { reason: String::decode(buf, cursor)? })
    }
}

impl WireMessage for Disconnect {
    const ID: &'static str = "278479C5-064E-4A27-A61F-84321807DF55";
    fn encode_body(&self) -> Vec<u8> {
        encode_body_of(self)
    }
    fn decode_body(data: &[u8]) -> Option<Self> {
        decode_body_of(data)
    }
}
