//! One endpoint, one background task: receive, deconstruct, dispatch.
//!
//! The receiver callback returns `false` to ask the listener to stop, on top
//! of the `CancellationToken` that can break the loop externally — a
//! malformed or intentionally-terminal message can stop the listener
//! directly too.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::net::endpoint::UdpEndpoint;
use crate::packet::{self, Payload};

/// How long each `recv` call waits before giving the stop flag another look.
const RECV_TIMEOUT: Duration = Duration::from_millis(15);

/// Bound on how many idle poll iterations `stop()` waits through before
/// giving up on a graceful join.
const STOP_WAIT_ITERATIONS: u32 = 4;

/// Spawn the listener loop: receive a datagram, decode its packet framing,
/// and hand the payload plus sender address to `on_payload`. Returning
/// `false` from `on_payload` stops the listener.
pub fn spawn<F>(
    endpoint: Arc<UdpEndpoint>,
    cancel: CancellationToken,
    mut on_payload: F,
) -> JoinHandle<()>
where
    F: FnMut(Payload, SocketAddr) -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; 65_535];
        let mut iterations_since_cancel = 0u32;

        loop {
            if cancel.is_cancelled() {
                iterations_since_cancel += 1;
                if iterations_since_cancel >= STOP_WAIT_ITERATIONS {
                    break;
                }
            }

            match endpoint.recv(&mut buf, RECV_TIMEOUT).await {
                Ok(None) => continue,
                Ok(Some((len, src))) => {
                    let Some(payload) = packet::deconstruct(&buf[..len]) else {
                        continue;
                    };
                    if !on_payload(payload, src) {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("listener recv error, will retry: {e}");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::message::{self, Ping};
    use crate::packet::{construct, Payload};

    #[tokio::test]
    async fn dispatches_received_payload_and_stops_on_false() {
        let listener_endpoint = Arc::new(UdpEndpoint::bind_ephemeral().unwrap());
        let listener_port = listener_endpoint.local_port();
        let sender_endpoint = UdpEndpoint::bind_ephemeral().unwrap();
        let cancel = CancellationToken::new();

        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = received.clone();

        let handle = spawn(listener_endpoint, cancel.clone(), move |payload, _src| {
            let msg = message::decode(payload);
            if matches!(msg, message::Message::Ping(Ping)) {
                received_clone.fetch_add(1, Ordering::SeqCst);
            }
            false
        });

        let payload = message::to_payload(&Ping);
        let bytes = construct(&Payload { info: payload.info, data: payload.data }).unwrap();
        let dest = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, listener_port));
        sender_endpoint.send_to(&bytes, dest).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_listener_without_a_payload() {
        let endpoint = Arc::new(UdpEndpoint::bind_ephemeral().unwrap());
        let cancel = CancellationToken::new();
        let handle = spawn(endpoint, cancel.clone(), |_payload, _src| true);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
