//! Per-peer connection lifecycle: address bookkeeping, ping/watchdog
//! liveness, and ordered hangup.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::Mutex as AsyncMutex;

use crate::message::{self, Disconnect, Ping, WireMessage};
use crate::net::endpoint::{EndpointError, UdpEndpoint};
use crate::packet::{self, Payload};

/// How many unanswered pings mark a peer dead.
pub const PING_FAILED_TIMEOUT_COUNT: u32 = 20;

/// `(ipv4, port)` in host byte order. Equality and hashing intentionally
/// ignore `port`: a peer that rebinds to a new ephemeral source port is
/// still the same logical peer, which matters because a client's outgoing
/// socket may not be the one it advertised. Keep this behavior even though
/// it's surprising.
#[derive(Debug, Clone, Copy)]
pub struct PeerAddress {
    pub ipv4: u32,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(ipv4: u32, port: u16) -> Self {
        Self { ipv4, port }
    }

    pub fn from_socket_addr(addr: SocketAddr) -> Option<Self> {
        match addr {
            SocketAddr::V4(v4) => Some(Self { ipv4: u32::from(*v4.ip()), port: v4.port() }),
            SocketAddr::V6(_) => None,
        }
    }

    pub fn to_socket_addr(self) -> SocketAddr {
        SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::from(self.ipv4)), self.port)
    }
}

impl PartialEq for PeerAddress {
    fn eq(&self, other: &Self) -> bool {
        self.ipv4 == other.ipv4
    }
}
impl Eq for PeerAddress {}

impl Hash for PeerAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ipv4.hash(state);
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ip = std::net::Ipv4Addr::from(self.ipv4);
        write!(f, "{ip}:{}", self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Disconnected,
    Connected,
}

/// Dependency-injection hook: callbacks receive an observer rather than a
/// back-pointer to the owning `Server`/`Client`.
pub trait ConnectionObserver: Send + Sync {
    fn on_server_connect(&self, _addr: PeerAddress) {}
    fn on_client_connect(&self, _addr: PeerAddress) {}
    fn on_disconnect(&self, _addr: Option<PeerAddress>, _reason: &str) {}
    /// Anything the core decoded but doesn't interpret itself — application
    /// payloads are carried identically but outside the protocol core.
    /// Callers that care about `ScanReport`, `CommandMessage`, etc. override
    /// this; the default drops them silently.
    fn on_application_message(&self, _addr: PeerAddress, _message: &crate::message::Message) {}
}

/// A no-op observer for call sites that don't need notifications (mostly
/// tests).
pub struct NullObserver;
impl ConnectionObserver for NullObserver {}

/// One remote peer: its address, its own outgoing socket, and its liveness
/// counter. `socket_address` being `Some` is the single source of truth for
/// "connected".
pub struct Peer {
    session_id: uuid::Uuid,
    address: parking_lot::Mutex<Option<PeerAddress>>,
    state: parking_lot::Mutex<PeerState>,
    pings_since_last_response: AtomicU32,
    last_payload_at: parking_lot::Mutex<std::time::Instant>,
    socket: AsyncMutex<UdpEndpoint>,
}

impl Peer {
    /// Create a peer bound to `address`, owning a freshly bound ephemeral
    /// socket it uses to send to that address. Gets a fresh `session_id` so
    /// logs can tell two connections from the same address apart, since
    /// `PeerAddress` equality ignores port.
    pub fn new(address: PeerAddress) -> Result<Self, EndpointError> {
        Ok(Self {
            session_id: uuid::Uuid::new_v4(),
            address: parking_lot::Mutex::new(Some(address)),
            state: parking_lot::Mutex::new(PeerState::Connected),
            pings_since_last_response: AtomicU32::new(0),
            last_payload_at: parking_lot::Mutex::new(std::time::Instant::now()),
            socket: AsyncMutex::new(UdpEndpoint::bind_ephemeral()?),
        })
    }

    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    pub fn address(&self) -> Option<PeerAddress> {
        *self.address.lock()
    }

    pub fn state(&self) -> PeerState {
        *self.state.lock()
    }

    pub fn pings_since_last_response(&self) -> u32 {
        self.pings_since_last_response.load(Ordering::SeqCst)
    }

    /// How long it has been since any payload was received from this peer.
    /// Used by the client-side watchdog, which has no ping sweep of its own
    /// to measure liveness against.
    pub fn idle_duration(&self) -> std::time::Duration {
        self.last_payload_at.lock().elapsed()
    }

    /// Any received payload from this peer resets the liveness counter.
    pub fn note_payload_received(&self) {
        self.pings_since_last_response.store(0, Ordering::SeqCst);
        *self.last_payload_at.lock() = std::time::Instant::now();
    }

    /// Called once per ping-sweep tick. Returns `true` ("dead") if the peer
    /// had already exceeded the timeout; otherwise increments the counter
    /// and sends a fresh `Ping`.
    pub async fn ping(&self) -> bool {
        if self.pings_since_last_response.load(Ordering::SeqCst) > PING_FAILED_TIMEOUT_COUNT {
            return true;
        }
        self.pings_since_last_response.fetch_add(1, Ordering::SeqCst);
        let _ = self.send_message(&Ping).await;
        false
    }

    /// Mark disconnected and return the reason, without sending anything.
    /// Used when the state transition is driven by an incoming `Disconnect`
    /// or a local failure, not a hangup we initiate.
    pub fn mark_disconnected(&self) {
        *self.address.lock() = None;
        *self.state.lock() = PeerState::Disconnected;
    }

    /// Local hangup: best-effort send of `Disconnect`, then local teardown
    /// regardless of whether the send succeeded.
    pub async fn hangup(&self, reason: &str) {
        let _ = self.send_message(&Disconnect::new(reason.to_string())).await;
        self.mark_disconnected();
    }

    pub async fn send_message<M: WireMessage>(&self, message: &M) -> Result<(), EndpointError> {
        let payload = message::to_payload(message);
        self.send_payload(payload).await
    }

    pub async fn send_payload(&self, payload: Payload) -> Result<(), EndpointError> {
        let Some(address) = self.address() else {
            return Err(EndpointError::Send(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "peer has no socket address",
            )));
        };
        let bytes = packet::construct(&payload)
            .map_err(|e| EndpointError::Send(std::io::Error::other(e.to_string())))?;
        self.send_bytes(&bytes, address.to_socket_addr()).await
    }

    /// Send raw framed bytes, recreating the socket once on failure and
    /// retrying exactly once more before giving up.
    async fn send_bytes(&self, bytes: &[u8], dest: SocketAddr) -> Result<(), EndpointError> {
        let mut socket = self.socket.lock().await;
        match socket.send_to(bytes, dest).await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::warn!("peer send failed, recreating socket: {e}");
                *socket = UdpEndpoint::bind_ephemeral()?;
                socket.send_to(bytes, dest).await
            }
        }
    }
}

/// Mutex-guarded collection of peers, at most one per address.
pub struct PeerTable {
    peers: parking_lot::Mutex<Vec<std::sync::Arc<Peer>>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self { peers: parking_lot::Mutex::new(Vec::new()) }
    }

    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }

    /// Insert `peer`, first removing any existing entry for the same
    /// address *without* calling its disconnect hook — the old entry is
    /// presumed stale.
    pub fn add_peer(&self, peer: std::sync::Arc<Peer>) {
        let Some(address) = peer.address() else {
            return;
        };
        let mut peers = self.peers.lock();
        peers.retain(|existing| existing.address() != Some(address));
        peers.push(peer);
    }

    pub fn find_peer_by_address(&self, address: PeerAddress) -> Option<std::sync::Arc<Peer>> {
        self.peers.lock().iter().find(|p| p.address() == Some(address)).cloned()
    }

    /// Remove `peer`, notifying `observer.on_disconnect` with `reason`.
    pub fn remove_peer(
        &self,
        address: PeerAddress,
        reason: &str,
        observer: &dyn ConnectionObserver,
    ) {
        let removed = {
            let mut peers = self.peers.lock();
            let idx = peers.iter().position(|p| p.address() == Some(address));
            idx.map(|i| peers.remove(i))
        };
        if let Some(peer) = removed {
            peer.mark_disconnected();
            observer.on_disconnect(Some(address), reason);
        }
    }

    pub fn snapshot(&self) -> Vec<std::sync::Arc<Peer>> {
        self.peers.lock().clone()
    }

    pub fn clear(&self) {
        self.peers.lock().clear();
    }
}

impl Default for PeerTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(ip: [u8; 4], port: u16) -> PeerAddress {
        PeerAddress::new(u32::from(std::net::Ipv4Addr::from(ip)), port)
    }

    #[test]
    fn peer_address_equality_ignores_port() {
        let a = addr([10, 0, 0, 5], 40000);
        let b = addr([10, 0, 0, 5], 40001);
        assert_eq!(a, b);
    }

    #[test]
    fn peer_address_display_is_dotted_quad_colon_port() {
        let a = addr([127, 0, 0, 1], 9000);
        assert_eq!(a.to_string(), "127.0.0.1:9000");
    }

    #[tokio::test]
    async fn add_peer_replaces_existing_entry_without_disconnect() {
        let table = PeerTable::new();
        struct CountingObserver(std::sync::atomic::AtomicUsize);
        impl ConnectionObserver for CountingObserver {
            fn on_disconnect(&self, _addr: Option<PeerAddress>, _reason: &str) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let observer = CountingObserver(std::sync::atomic::AtomicUsize::new(0));

        let address = addr([10, 0, 0, 5], 40000);
        let first = std::sync::Arc::new(Peer::new(address).unwrap());
        table.add_peer(first);
        assert_eq!(table.len(), 1);

        let second_address = addr([10, 0, 0, 5], 40001); // same logical address
        let second = std::sync::Arc::new(Peer::new(second_address).unwrap());
        table.add_peer(second);

        assert_eq!(table.len(), 1, "peer-table size unchanged after replacement");
        assert_eq!(observer.0.load(Ordering::SeqCst), 0, "no disconnect hook on replace");
        let found = table.find_peer_by_address(addr([10, 0, 0, 5], 0)).unwrap();
        assert_eq!(found.address(), Some(second_address));
    }

    #[tokio::test]
    async fn ping_counter_monotonic_and_reset_by_payload() {
        let address = addr([127, 0, 0, 1], 9999);
        let peer = Peer::new(address).unwrap();
        assert_eq!(peer.pings_since_last_response(), 0);

        // pings won't actually reach anyone bound there, but the counter
        // still increments regardless of send outcome.
        let dead = peer.ping().await;
        assert!(!dead);
        assert_eq!(peer.pings_since_last_response(), 1);

        peer.note_payload_received();
        assert_eq!(peer.pings_since_last_response(), 0);
    }

    #[tokio::test]
    async fn ping_reports_dead_past_threshold() {
        let address = addr([127, 0, 0, 1], 9998);
        let peer = Peer::new(address).unwrap();
        peer.pings_since_last_response.store(PING_FAILED_TIMEOUT_COUNT + 1, Ordering::SeqCst);
        assert!(peer.ping().await);
    }

    #[tokio::test]
    async fn hangup_tears_down_local_state() {
        let address = addr([127, 0, 0, 1], 9997);
        let peer = Peer::new(address).unwrap();
        peer.hangup("local shutdown").await;
        assert_eq!(peer.state(), PeerState::Disconnected);
        assert_eq!(peer.address(), None);
    }
}
