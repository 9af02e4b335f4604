//! Server role: one discovery listener, one control listener, a mutex-guarded
//! peer table, and a 1 Hz ping sweep.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::message::{self, Advertise, Disconnect, Message};
use crate::net::endpoint::{EndpointError, UdpEndpoint};
use crate::net::listener;
use crate::peer::{ConnectionObserver, Peer, PeerAddress, PeerTable};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind discovery listener on port {port}: {source}")]
    DiscoveryBind { port: u16, source: EndpointError },
    #[error("failed to bind control listener on port {port}: {source}")]
    ControlBind { port: u16, source: EndpointError },
}

const PING_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

pub struct Server {
    discovery_port: u16,
    control_port: u16,
    peers: Arc<PeerTable>,
    observer: Arc<dyn ConnectionObserver>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Server {
    pub fn new(discovery_port: u16, control_port: u16, observer: Arc<dyn ConnectionObserver>) -> Self {
        Self::with_peer_table(discovery_port, control_port, Arc::new(PeerTable::new()), observer)
    }

    /// Like [`Server::new`], but with a caller-supplied peer table — lets a
    /// binary build its `ConnectionObserver` with the table already in hand
    /// (e.g. to look up a just-connected peer and push it a welcome
    /// message), instead of awkwardly swapping the observer in afterwards.
    pub fn with_peer_table(
        discovery_port: u16,
        control_port: u16,
        peers: Arc<PeerTable>,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Self {
        Self {
            discovery_port,
            control_port,
            peers,
            observer,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    pub fn peers(&self) -> Arc<PeerTable> {
        self.peers.clone()
    }

    /// Bind both listeners and start the ping sweep. A bind failure here is
    /// fatal and must reach the caller.
    pub async fn start(&mut self) -> Result<(), ServerError> {
        let discovery_endpoint = Arc::new(
            UdpEndpoint::bind_reusable(self.discovery_port)
                .map_err(|source| ServerError::DiscoveryBind { port: self.discovery_port, source })?,
        );
        let control_endpoint = Arc::new(
            UdpEndpoint::bind_reusable(self.control_port)
                .map_err(|source| ServerError::ControlBind { port: self.control_port, source })?,
        );

        let peers = self.peers.clone();
        let observer = self.observer.clone();
        let control_port = self.control_port;
        let discovery_cancel = self.cancel.clone();
        self.tasks.push(listener::spawn(discovery_endpoint, discovery_cancel, move |payload, src| {
            handle_discovery_payload(&peers, &observer, control_port, payload, src);
            true
        }));

        let peers = self.peers.clone();
        let observer = self.observer.clone();
        let control_cancel = self.cancel.clone();
        self.tasks.push(listener::spawn(control_endpoint, control_cancel, move |payload, src| {
            handle_control_payload(&peers, &observer, payload, src);
            true
        }));

        let peers = self.peers.clone();
        let observer = self.observer.clone();
        let sweep_cancel = self.cancel.clone();
        self.tasks.push(tokio::spawn(async move {
            run_ping_sweep(peers, observer, sweep_cancel).await;
        }));

        Ok(())
    }

    /// Cancel the timer, stop the listeners, then disconnect every peer
    /// before clearing the table.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        for peer in self.peers.snapshot() {
            let _ = peer.send_message(&Disconnect::new("Device shutting down")).await;
        }
        self.peers.clear();
    }
}

fn handle_discovery_payload(
    peers: &Arc<PeerTable>,
    observer: &Arc<dyn ConnectionObserver>,
    control_port: u16,
    payload: crate::packet::Payload,
    src: SocketAddr,
) {
    if let Message::Advertise(Advertise { control_port: client_control_port }) =
        message::decode(payload)
    {
        let Some(mut address) = PeerAddress::from_socket_addr(src) else {
            return;
        };
        address.port = client_control_port;

        match Peer::new(address) {
            Ok(peer) => {
                let peer = Arc::new(peer);
                peers.add_peer(peer.clone());
                observer.on_server_connect(address);

                let ack = crate::message::AdvertiseAck { control_port };
                let peer_clone = peer.clone();
                tokio::spawn(async move {
                    let _ = peer_clone.send_message(&ack).await;
                });
            }
            Err(e) => log::error!("failed to create peer socket for {address}: {e}"),
        }
    }
}

fn handle_control_payload(
    peers: &Arc<PeerTable>,
    observer: &Arc<dyn ConnectionObserver>,
    payload: crate::packet::Payload,
    src: SocketAddr,
) {
    let Some(address) = PeerAddress::from_socket_addr(src) else {
        return;
    };
    let Some(peer) = peers.find_peer_by_address(address) else {
        log::debug!("control payload from unknown peer {address}, dropping");
        return;
    };
    peer.note_payload_received();

    match message::decode(payload) {
        Message::PingAck(_) => {}
        Message::Disconnect(Disconnect { reason }) => {
            peers.remove_peer(address, &reason, observer.as_ref());
        }
        other => observer.on_application_message(address, &other),
    }
}

async fn run_ping_sweep(
    peers: Arc<PeerTable>,
    observer: Arc<dyn ConnectionObserver>,
    cancel: CancellationToken,
) {
    let mut tick = tokio::time::interval(PING_SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {
                for peer in peers.snapshot() {
                    let Some(address) = peer.address() else { continue };
                    if peer.ping().await {
                        peers.remove_peer(address, "Connection timed out", observer.as_ref());
                    }
                }
            }
        }
    }
}

/// Default discovery port.
pub const DEFAULT_DISCOVERY_PORT: u16 = 54_670;
/// Default control port.
pub const DEFAULT_CONTROL_PORT: u16 = 54_671;
/// Broadcast address used outside loopback-mode testing.
pub const BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 255);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::NullObserver;

    #[tokio::test]
    async fn start_binds_both_ports_and_stop_clears_peers() {
        let mut server = Server::new(58670, 58671, Arc::new(NullObserver));
        server.start().await.unwrap();
        assert!(server.peers().is_empty());
        server.stop().await;
    }

    #[tokio::test]
    async fn fatal_bind_failure_surfaces_to_caller() {
        // Occupy the port with a plain, non-reusable socket so the
        // server's reusable bind still collides (SO_REUSEADDR/SO_REUSEPORT
        // only help when *both* sides opt in).
        let _blocker = std::net::UdpSocket::bind(("0.0.0.0", 58675)).unwrap();

        let mut server = Server::new(58675, 58676, Arc::new(NullObserver));
        let result = server.start().await;
        assert!(result.is_err());
    }
}
