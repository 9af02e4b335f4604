//! Peer-to-peer wire layer for the card-scan discovery/control protocol:
//! byte codec, packet framing, the typed message registry, UDP networking
//! primitives, the peer state machine, and the server/client roles built on
//! top of them.

pub mod client;
pub mod codec;
pub mod config_store;
pub mod hash;
pub mod message;
pub mod net;
pub mod obfuscate;
pub mod packet;
pub mod peer;
pub mod server;

pub use client::Client;
pub use peer::{ConnectionObserver, Peer, PeerAddress, PeerState, PeerTable};
pub use server::{Server, ServerError, BROADCAST_ADDR, DEFAULT_CONTROL_PORT, DEFAULT_DISCOVERY_PORT};
