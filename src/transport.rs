use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::error::{Error, Result};

/// A datagram transport for RMCP/RMCP+ traffic.
///
/// Sends are addressed per target. Receives wait a bounded interval so the
/// receiver thread can observe shutdown between datagrams.
pub(crate) trait Wire: Send + Sync {
    fn send_to(&self, packet: &[u8], addr: SocketAddr) -> Result<()>;

    /// Wait up to the configured poll interval for one datagram. `Ok(None)`
    /// means the wait elapsed with nothing to read.
    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>>;
}

/// Blocking UDP transport bound to one local socket.
pub(crate) struct UdpWire {
    socket: UdpSocket,
}

impl UdpWire {
    pub(crate) fn bind(bind_addr: SocketAddr, poll_interval: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_read_timeout(Some(poll_interval))?;
        Ok(Self { socket })
    }

    pub(crate) fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

impl Wire for UdpWire {
    fn send_to(&self, packet: &[u8], addr: SocketAddr) -> Result<()> {
        self.socket.send_to(packet, addr)?;
        Ok(())
    }

    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok((n, src)) => Ok(Some((n, src))),
            Err(e) if is_timeout(&e) => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
