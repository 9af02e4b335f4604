//! Periodic broadcast of `Advertise{control_port}` so servers on the LAN can
//! find us. An explicit four-state machine rather than a plain
//! `CancellationToken` + task pair: a caller that needs to know "has it
//! actually stopped yet" awaits [`Advertiser::stopped`] rather than just
//! joining a handle.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::message::{self, Advertise};
use crate::net::endpoint::UdpEndpoint;
use crate::packet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertiserState {
    Starting,
    Active,
    Stopping,
    Stopped,
}

const ADVERTISE_INTERVAL: Duration = Duration::from_secs(1);
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct Advertiser {
    state_rx: watch::Receiver<AdvertiserState>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Advertiser {
    /// Start broadcasting `Advertise{control_port}` to `broadcast_addr` once
    /// every [`ADVERTISE_INTERVAL`]. `discovery_port` is the port the
    /// datagram is sent to; `broadcast_ip` lets tests point at 127.0.0.1
    /// instead of 255.255.255.255.
    pub fn start(broadcast_ip: Ipv4Addr, discovery_port: u16, control_port: u16) -> Self {
        let (state_tx, state_rx) = watch::channel(AdvertiserState::Starting);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let dest = SocketAddr::V4(SocketAddrV4::new(broadcast_ip, discovery_port));
            let message = Advertise { control_port };

            let mut endpoint = match UdpEndpoint::bind_ephemeral() {
                Ok(e) => e,
                Err(e) => {
                    log::error!("advertiser failed to bind socket: {e}");
                    let _ = state_tx.send(AdvertiserState::Stopped);
                    return;
                }
            };
            let _ = state_tx.send(AdvertiserState::Active);

            loop {
                let payload = message::to_payload(&message);
                match packet::construct(&packet::Payload { info: payload.info, data: payload.data })
                {
                    Ok(bytes) => {
                        if let Err(e) = endpoint.send_to(&bytes, dest).await {
                            log::warn!("advertiser send failed, recreating socket: {e}");
                            match UdpEndpoint::bind_ephemeral() {
                                Ok(new_endpoint) => endpoint = new_endpoint,
                                Err(e) => log::error!("advertiser could not recreate socket: {e}"),
                            }
                        }
                    }
                    Err(e) => log::error!("advertiser failed to construct packet: {e}"),
                }

                if wait_unless_cancelled(&task_cancel, ADVERTISE_INTERVAL).await {
                    break;
                }
            }

            let _ = state_tx.send(AdvertiserState::Stopping);
            let _ = state_tx.send(AdvertiserState::Stopped);
        });

        Self { state_rx, cancel, handle }
    }

    pub fn state(&self) -> AdvertiserState {
        *self.state_rx.borrow()
    }

    /// Signal the advertiser to stop and wait until it reaches `Stopped`.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        while *self.state_rx.borrow() != AdvertiserState::Stopped {
            if self.state_rx.changed().await.is_err() {
                break;
            }
        }
        let _ = self.handle.await;
    }
}

/// Sleep for `duration`, polling the cancellation token every
/// [`CANCEL_POLL_INTERVAL`] so a stop request is noticed promptly instead of
/// only between full-length sleeps. Returns `true` if cancelled.
async fn wait_unless_cancelled(cancel: &CancellationToken, duration: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return true;
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(CANCEL_POLL_INTERVAL.min(deadline - now)).await;
    }
}
