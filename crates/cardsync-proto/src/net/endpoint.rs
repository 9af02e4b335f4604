//! A UDP socket configured the way this protocol needs it: broadcast-capable,
//! reusable across processes during local testing, bound to an ephemeral
//! port when the caller doesn't care which one.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use rand::Rng;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// How many candidate ports [`UdpEndpoint::bind_ephemeral`] tries before
/// giving up.
const EPHEMERAL_BIND_ATTEMPTS: usize = 100;
const EPHEMERAL_PORT_RANGE: std::ops::RangeInclusive<u16> = 1024..=65535;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("failed to create socket: {0}")]
    Create(std::io::Error),
    #[error("failed to set socket option {option}: {source}")]
    SetOption { option: &'static str, source: std::io::Error },
    #[error("failed to bind to {addr}: {source}")]
    Bind { addr: SocketAddr, source: std::io::Error },
    #[error("could not find a free ephemeral port after {0} attempts")]
    NoEphemeralPort(usize),
    #[error("failed to hand the socket to tokio: {0}")]
    TokioConversion(std::io::Error),
    #[error("send failed: {0}")]
    Send(std::io::Error),
}

/// A `tokio::net::UdpSocket` built through `socket2` so socket options like
/// `SO_REUSEADDR`/`SO_REUSEPORT` can be set before bind.
pub struct UdpEndpoint {
    socket: UdpSocket,
    local_port: u16,
}

impl UdpEndpoint {
    /// Bind to a specific port on the wildcard address, with broadcast
    /// enabled and the address reusable across processes (useful when
    /// running server and client on the same machine for local testing).
    pub fn bind_reusable(port: u16) -> Result<Self, EndpointError> {
        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        let socket = new_dgram_socket()?;

        if let Err(source) = socket.set_reuse_address(true) {
            return Err(EndpointError::SetOption { option: "SO_REUSEADDR", source });
        }
        #[cfg(not(target_os = "windows"))]
        if let Err(source) = socket.set_reuse_port(true) {
            return Err(EndpointError::SetOption { option: "SO_REUSEPORT", source });
        }
        if let Err(source) = socket.set_broadcast(true) {
            return Err(EndpointError::SetOption { option: "SO_BROADCAST", source });
        }

        socket
            .bind(&socket2::SockAddr::from(SocketAddr::V4(addr)))
            .map_err(|source| EndpointError::Bind { addr: SocketAddr::V4(addr), source })?;

        Self::from_socket2(socket, port)
    }

    /// Bind to one of up to [`EPHEMERAL_BIND_ATTEMPTS`] random ports in
    /// `[1024, 65535]`. Used by the advertiser, which sends but never needs a
    /// stable port to be discovered on.
    pub fn bind_ephemeral() -> Result<Self, EndpointError> {
        let mut rng = rand::thread_rng();
        let mut last_err = None;

        for _ in 0..EPHEMERAL_BIND_ATTEMPTS {
            let port = rng.gen_range(EPHEMERAL_PORT_RANGE);
            let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
            let socket = match new_dgram_socket() {
                Ok(s) => s,
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            };
            if let Err(source) = socket.set_broadcast(true) {
                last_err = Some(EndpointError::SetOption { option: "SO_BROADCAST", source });
                continue;
            }
            match socket.bind(&socket2::SockAddr::from(SocketAddr::V4(addr))) {
                Ok(()) => return Self::from_socket2(socket, port),
                Err(source) => {
                    last_err = Some(EndpointError::Bind { addr: SocketAddr::V4(addr), source });
                }
            }
        }

        Err(last_err.unwrap_or(EndpointError::NoEphemeralPort(EPHEMERAL_BIND_ATTEMPTS)))
    }

    fn from_socket2(socket: Socket, port: u16) -> Result<Self, EndpointError> {
        socket.set_nonblocking(true).map_err(EndpointError::Create)?;
        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket).map_err(EndpointError::TokioConversion)?;
        Ok(Self { socket, local_port: port })
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> Result<(), EndpointError> {
        self.socket.send_to(bytes, dest).await.map(|_| ()).map_err(EndpointError::Send)
    }

    /// Receive one datagram, or `Ok(None)` if nothing arrived within
    /// `recv_timeout`. A hard I/O error is distinguished from a timeout so
    /// callers can tell "try again" from "the socket is broken" apart.
    pub async fn recv(
        &self,
        buf: &mut [u8],
        recv_timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>, EndpointError> {
        match timeout(recv_timeout, self.socket.recv_from(buf)).await {
            Ok(Ok(result)) => Ok(Some(result)),
            Ok(Err(e)) => Err(EndpointError::Send(e)),
            Err(_elapsed) => Ok(None),
        }
    }
}

fn new_dgram_socket() -> Result<Socket, EndpointError> {
    Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(EndpointError::Create)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ephemeral_bind_picks_a_usable_port() {
        let endpoint = UdpEndpoint::bind_ephemeral().unwrap();
        assert!(endpoint.local_port() >= 1024);
    }

    #[tokio::test]
    async fn send_and_recv_roundtrip() {
        let receiver = UdpEndpoint::bind_ephemeral().unwrap();
        let sender = UdpEndpoint::bind_ephemeral().unwrap();
        let dest = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, receiver.local_port()));

        sender.send_to(b"hello", dest).await.unwrap();

        let mut buf = [0u8; 16];
        let (len, _src) = receiver
            .recv(&mut buf, Duration::from_secs(1))
            .await
            .unwrap()
            .expect("datagram should have arrived");
        assert_eq!(&buf[..len], b"hello");
    }

    #[tokio::test]
    async fn recv_times_out_when_idle() {
        let endpoint = UdpEndpoint::bind_ephemeral().unwrap();
        let mut buf = [0u8; 16];
        let result = endpoint.recv(&mut buf, Duration::from_millis(20)).await.unwrap();
        assert!(result.is_none());
    }
}
