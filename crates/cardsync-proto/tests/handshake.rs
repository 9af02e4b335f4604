//! End-to-end scenarios exercising the discovery/connect/disconnect dance
//! between a real `Server` and a real `Client` over loopback.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cardsync_proto::client::Client;
use cardsync_proto::peer::{ConnectionObserver, PeerAddress};
use cardsync_proto::server::Server;

#[derive(Default)]
struct RecordingObserver {
    server_connects: AtomicUsize,
    client_connects: AtomicUsize,
    disconnects: AtomicUsize,
    last_disconnect_reason: parking_lot::Mutex<String>,
}

impl ConnectionObserver for RecordingObserver {
    fn on_server_connect(&self, _addr: PeerAddress) {
        self.server_connects.fetch_add(1, Ordering::SeqCst);
    }
    fn on_client_connect(&self, _addr: PeerAddress) {
        self.client_connects.fetch_add(1, Ordering::SeqCst);
    }
    fn on_disconnect(&self, _addr: Option<PeerAddress>, reason: &str) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        *self.last_disconnect_reason.lock() = reason.to_string();
    }
}

async fn wait_until(mut check: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn handshake_happy_path() {
    let discovery_port = 59670;
    let server_control_port = 59671;
    let client_control_port = 59681;

    let server_observer = Arc::new(RecordingObserver::default());
    let mut server = Server::new(discovery_port, server_control_port, server_observer.clone());
    server.start().await.unwrap();

    let client_observer = Arc::new(RecordingObserver::default());
    let client =
        Client::new(discovery_port, client_control_port, Ipv4Addr::LOCALHOST, client_observer.clone());
    client.start().unwrap();

    let connected = wait_until(
        || {
            server_observer.server_connects.load(Ordering::SeqCst) > 0
                && client_observer.client_connects.load(Ordering::SeqCst) > 0
        },
        Duration::from_secs(2),
    )
    .await;
    assert!(connected, "client and server should both observe a connect within the timeout");
    assert!(client.is_connected());
    assert_eq!(server.peers().len(), 1);

    client.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn disconnect_on_shutdown() {
    let discovery_port = 59672;
    let server_control_port = 59673;
    let client_control_port = 59682;

    let server_observer = Arc::new(RecordingObserver::default());
    let mut server = Server::new(discovery_port, server_control_port, server_observer.clone());
    server.start().await.unwrap();

    let client_observer = Arc::new(RecordingObserver::default());
    let client =
        Client::new(discovery_port, client_control_port, Ipv4Addr::LOCALHOST, client_observer.clone());
    client.start().unwrap();

    wait_until(|| server.peers().len() == 1, Duration::from_secs(2)).await;

    server.stop().await;

    let disconnected = wait_until(
        || client_observer.disconnects.load(Ordering::SeqCst) > 0,
        Duration::from_millis(500),
    )
    .await;
    assert!(disconnected, "client should observe a disconnect after server shutdown");
    assert_eq!(*client_observer.last_disconnect_reason.lock(), "Device shutting down");

    client.stop().await;
}

#[tokio::test]
async fn peer_replacement_keeps_table_size_unchanged() {
    use cardsync_proto::peer::Peer;

    let table = cardsync_proto::peer::PeerTable::new();
    let ip = u32::from(Ipv4Addr::new(10, 0, 0, 5));

    let first = Arc::new(Peer::new(PeerAddress::new(ip, 40000)).unwrap());
    table.add_peer(first);
    assert_eq!(table.len(), 1);

    let second = Arc::new(Peer::new(PeerAddress::new(ip, 40001)).unwrap());
    table.add_peer(second);

    assert_eq!(table.len(), 1);
    let found = table.find_peer_by_address(PeerAddress::new(ip, 0)).unwrap();
    assert_eq!(found.address().unwrap().port, 40001);
}
