//! Client role: advertiser lifecycle, control listener, watchdog, and the
//! config-list request — the client-side mirror of [`crate::server::Server`].
//! Not named as a separate component in the original component table, but
//! required to exercise the client-side half of the §4.9 transition table.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::message::{self, AdvertiseAck, ConfigValueList, Disconnect, Message, Ping};
use crate::net::endpoint::{EndpointError, UdpEndpoint};
use crate::net::{listener, Advertiser};
use crate::peer::{ConnectionObserver, Peer, PeerAddress};

/// Watchdog period: roughly 3x the server's 1 Hz ping interval.
const WATCHDOG_PERIOD: Duration = Duration::from_secs(3);
const WATCHDOG_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Client {
    control_port: u16,
    discovery_port: u16,
    broadcast_ip: Ipv4Addr,
    observer: Arc<dyn ConnectionObserver>,
    cancel: CancellationToken,
    peer: parking_lot::Mutex<Option<Arc<Peer>>>,
    connected: Arc<AtomicBool>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Client {
    pub fn new(
        discovery_port: u16,
        control_port: u16,
        broadcast_ip: Ipv4Addr,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Arc<Self> {
        Arc::new(Self {
            control_port,
            discovery_port,
            broadcast_ip,
            observer,
            cancel: CancellationToken::new(),
            peer: parking_lot::Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            tasks: parking_lot::Mutex::new(Vec::new()),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn peer(&self) -> Option<Arc<Peer>> {
        self.peer.lock().clone()
    }

    /// Start the control listener and the advertiser. Call once.
    pub fn start(self: &Arc<Self>) -> Result<(), EndpointError> {
        let control_endpoint = Arc::new(UdpEndpoint::bind_reusable(self.control_port)?);
        let this = self.clone();
        let cancel = self.cancel.clone();
        self.tasks.lock().push(listener::spawn(control_endpoint, cancel, move |payload, src| {
            this.handle_control_payload(payload, src);
            true
        }));

        self.restart_advertiser();
        Ok(())
    }

    fn restart_advertiser(self: &Arc<Self>) {
        let broadcast_ip = self.broadcast_ip;
        let discovery_port = self.discovery_port;
        let control_port = self.control_port;
        let this = self.clone();
        self.tasks.lock().push(tokio::spawn(async move {
            let advertiser = Advertiser::start(broadcast_ip, discovery_port, control_port);
            while !this.is_connected() && !this.cancel.is_cancelled() {
                tokio::time::sleep(WATCHDOG_POLL_INTERVAL).await;
            }
            advertiser.stop().await;
        }));
    }

    fn handle_control_payload(self: &Arc<Self>, payload: crate::packet::Payload, src: SocketAddr) {
        match message::decode(payload) {
            Message::AdvertiseAck(AdvertiseAck { control_port: server_control_port }) => {
                self.on_advertise_ack(src, server_control_port);
            }
            Message::Ping(Ping) => {
                if let Some(peer) = self.peer() {
                    peer.note_payload_received();
                    let peer = peer.clone();
                    tokio::spawn(async move {
                        let _ = peer.send_message(&crate::message::PingAck).await;
                    });
                }
            }
            Message::Disconnect(Disconnect { reason }) => {
                self.teardown(&reason);
            }
            other => {
                if let Some(peer) = self.peer() {
                    peer.note_payload_received();
                }
                if let Some(addr) = PeerAddress::from_socket_addr(src) {
                    self.observer.on_application_message(addr, &other);
                }
            }
        }
    }

    fn on_advertise_ack(self: &Arc<Self>, src: SocketAddr, server_control_port: u16) {
        if self.is_connected() {
            return;
        }
        let Some(mut address) = PeerAddress::from_socket_addr(src) else { return };
        address.port = server_control_port;

        match Peer::new(address) {
            Ok(peer) => {
                let peer = Arc::new(peer);
                *self.peer.lock() = Some(peer.clone());
                self.connected.store(true, Ordering::SeqCst);
                self.observer.on_client_connect(address);
                self.start_watchdog();

                tokio::spawn(async move {
                    let _ = peer.send_message(&ConfigValueList { entries: Vec::new() }).await;
                });
            }
            Err(e) => log::error!("failed to create server peer socket: {e}"),
        }
    }

    fn start_watchdog(self: &Arc<Self>) {
        let this = self.clone();
        self.tasks.lock().push(tokio::spawn(async move {
            loop {
                tokio::time::sleep(WATCHDOG_POLL_INTERVAL).await;
                if this.cancel.is_cancelled() || !this.is_connected() {
                    return;
                }
                let Some(peer) = this.peer() else { return };
                if peer.idle_duration() >= WATCHDOG_PERIOD {
                    this.teardown("No device activity");
                    this.restart_advertiser();
                    return;
                }
            }
        }));
    }

    fn teardown(self: &Arc<Self>, reason: &str) {
        if let Some(peer) = self.peer.lock().take() {
            peer.mark_disconnected();
        }
        self.connected.store(false, Ordering::SeqCst);
        self.observer.on_disconnect(None, reason);
    }

    pub async fn stop(self: Arc<Self>) {
        self.cancel.cancel();
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::NullObserver;
    use std::net::SocketAddrV4;

    fn loopback_src(port: u16) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
    }

    #[tokio::test]
    async fn advertise_ack_connects_and_is_idempotent() {
        let client = Client::new(59700, 59701, Ipv4Addr::LOCALHOST, Arc::new(NullObserver));
        assert!(!client.is_connected());

        client.on_advertise_ack(loopback_src(59702), 59703);
        assert!(client.is_connected());
        let first_peer = client.peer().unwrap().address();

        // A second ack while already connected must not replace the peer.
        client.on_advertise_ack(loopback_src(59704), 59705);
        assert_eq!(client.peer().unwrap().address(), first_peer);
    }

    #[tokio::test]
    async fn disconnect_message_tears_down_and_notifies_observer() {
        struct CountingObserver(std::sync::atomic::AtomicUsize);
        impl ConnectionObserver for CountingObserver {
            fn on_disconnect(&self, _addr: Option<PeerAddress>, _reason: &str) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let observer = Arc::new(CountingObserver(std::sync::atomic::AtomicUsize::new(0)));
        let client = Client::new(59706, 59707, Ipv4Addr::LOCALHOST, observer.clone());

        client.on_advertise_ack(loopback_src(59708), 59709);
        assert!(client.is_connected());

        let payload = message::to_payload(&Disconnect::new("Device shutting down".to_string()));
        client.handle_control_payload(payload, loopback_src(59708));

        assert!(!client.is_connected());
        assert!(client.peer().is_none());
        assert_eq!(observer.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ping_is_answered_without_losing_connection() {
        let client = Client::new(59710, 59711, Ipv4Addr::LOCALHOST, Arc::new(NullObserver));
        client.on_advertise_ack(loopback_src(59712), 59713);

        let before = client.peer().unwrap().pings_since_last_response();
        let payload = message::to_payload(&Ping);
        client.handle_control_payload(payload, loopback_src(59712));

        assert!(client.is_connected());
        assert_eq!(client.peer().unwrap().pings_since_last_response(), before);
    }
}
