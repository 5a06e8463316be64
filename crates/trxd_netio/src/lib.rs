use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

/// One end of a TRXD link: a UDP socket bound to the local DATA port that
/// sends every datagram to a fixed remote DATA port.
#[derive(Debug)]
pub struct DataInterface {
    socket: UdpSocket,
    remote_addr: SocketAddr,
}

impl DataInterface {
    pub fn bind(local_addr: SocketAddr, remote_addr: SocketAddr) -> io::Result<Self> {
        let socket = bind_udp_socket(local_addr)?;
        Ok(Self {
            socket,
            remote_addr,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Sends one datagram. A short write is reported as an error since a
    /// truncated TRXD message is useless to the peer.
    pub async fn send(&self, payload: &[u8]) -> io::Result<usize> {
        let sent = self.socket.send_to(payload, self.remote_addr).await?;
        if sent != payload.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short datagram write: {sent} of {} bytes", payload.len()),
            ));
        }
        Ok(sent)
    }
}

/// Binds a nonblocking UDP socket with `SO_REUSEADDR` and hands it to tokio.
/// Must be called from within a tokio runtime.
pub fn bind_udp_socket(local_addr: SocketAddr) -> io::Result<UdpSocket> {
    let domain = if local_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&local_addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}
