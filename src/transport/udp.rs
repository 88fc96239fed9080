use super::traits::{DatagramTransport, TransportFactory};
use crate::runtime::config::NetworkConfig;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{ErrorKind, Result};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

// set_read_timeout rejects a zero duration.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub fn new(socket: UdpSocket) -> Self {
        UdpTransport { socket }
    }

    /// Bind a listener on `bind:port` and join `group` on the `bind` interface.
    pub fn multicast_listener(group: Ipv4Addr, bind: Ipv4Addr, port: u16) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;

        let bind_addr = SocketAddr::V4(SocketAddrV4::new(bind, port));
        socket.bind(&bind_addr.into())?;

        let socket: UdpSocket = socket.into();
        socket.join_multicast_v4(&group, &bind)?;
        socket.set_multicast_loop_v4(true)?;
        log::debug!("[UDP] join_multicast_v4({}) on {} port {}", group, bind, port);

        Ok(UdpTransport { socket })
    }

    /// Ephemeral socket allowed to broadcast, with multicast TTL 1.
    pub fn broadcaster() -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_broadcast(true)?;
        socket.set_multicast_ttl_v4(1)?;
        socket.set_multicast_loop_v4(true)?;

        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
        socket.bind(&bind_addr.into())?;

        Ok(UdpTransport { socket: socket.into() })
    }
}

impl DatagramTransport for UdpTransport {
    fn send(&self, data: &[u8], destination: SocketAddr) -> Result<usize> {
        self.socket.send_to(data, destination)
    }

    fn receive(&self, buffer: &mut [u8], timeout: Option<Duration>) -> Result<Option<(usize, SocketAddr)>> {
        self.socket.set_read_timeout(timeout.map(|t| t.max(MIN_READ_TIMEOUT)))?;
        match self.socket.recv_from(buffer) {
            Ok(received) => Ok(Some(received)),
            // Unix reports an elapsed read timeout as WouldBlock, Windows as TimedOut.
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr()
    }
}

/// Opens real UDP sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpFactory;

impl TransportFactory for UdpFactory {
    fn listener(&self, config: &NetworkConfig) -> Result<Box<dyn DatagramTransport>> {
        let transport = UdpTransport::multicast_listener(config.broadcast, config.bind, config.port)?;
        Ok(Box::new(transport))
    }

    fn sender(&self, _config: &NetworkConfig) -> Result<Box<dyn DatagramTransport>> {
        Ok(Box::new(UdpTransport::broadcaster()?))
    }
}
