use crate::runtime::config::NetworkConfig;
use std::io::Result;
use std::net::SocketAddr;
use std::time::Duration;

/// A datagram channel used by producers and consumers.
/// Object-safe and pluggable, so tests can run over an in-process network.
///
/// Closing is dropping: the socket is released when the value goes away.
pub trait DatagramTransport: Send + Sync {
    /// Send one datagram to `destination`.
    fn send(&self, data: &[u8], destination: SocketAddr) -> Result<usize>;

    /// Receive one datagram, waiting at most `timeout` (`None` waits forever).
    /// Returns `Ok(None)` when the wait elapsed without traffic.
    fn receive(&self, buffer: &mut [u8], timeout: Option<Duration>) -> Result<Option<(usize, SocketAddr)>>;

    /// Get the local socket address.
    fn local_addr(&self) -> Result<SocketAddr>;
}

/// Opens the two kinds of socket the protocol needs.
pub trait TransportFactory: Send + Sync {
    /// A receive socket joined to the multicast group and bound to the
    /// shared discovery port, with address reuse so several listeners can
    /// coexist on one host.
    fn listener(&self, config: &NetworkConfig) -> Result<Box<dyn DatagramTransport>>;

    /// An ephemeral, broadcast-capable socket for queries, notifications and
    /// unicast replies. Responses to a query arrive on the socket that sent it.
    fn sender(&self, config: &NetworkConfig) -> Result<Box<dyn DatagramTransport>>;
}
