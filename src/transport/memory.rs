//! In-process datagram network.
//!
//! Multicast datagrams reach every listener joined to the destination group;
//! unicast datagrams reach the endpoint owning the destination address and are
//! dropped otherwise, as UDP would. Each endpoint gets a distinct loopback
//! address so producers and consumers in one process can tell each other apart.

use super::traits::{DatagramTransport, TransportFactory};
use crate::runtime::config::NetworkConfig;
use std::io::{Error, ErrorKind, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type Datagram = (Vec<u8>, SocketAddr);

const FIRST_PORT: u16 = 40000;

struct Endpoint {
    id: u64,
    addr: SocketAddr,
    group: Option<SocketAddrV4>,
    inbox: Sender<Datagram>,
}

struct Hub {
    next_id: u64,
    next_port: u16,
    endpoints: Vec<Endpoint>,
}

impl Hub {
    fn register(&mut self, group: Option<SocketAddrV4>) -> (u64, SocketAddr, Receiver<Datagram>) {
        let (tx, rx) = mpsc::channel();
        let id = self.next_id;
        self.next_id += 1;
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.next_port);
        self.next_port = self.next_port.wrapping_add(1).max(FIRST_PORT);
        self.endpoints.push(Endpoint { id, addr, group, inbox: tx });
        (id, addr, rx)
    }

    fn route(&self, data: &[u8], source: SocketAddr, destination: SocketAddr) {
        let multicast = match destination {
            SocketAddr::V4(v4) if v4.ip().is_multicast() => Some(v4),
            _ => None,
        };

        for endpoint in &self.endpoints {
            let matches = match multicast {
                Some(group) => endpoint.group == Some(group),
                None => endpoint.addr == destination,
            };
            if matches {
                // A receiver mid-teardown is equivalent to a closed socket.
                let _ = endpoint.inbox.send((data.to_vec(), source));
            }
        }
    }
}

struct Shared {
    hub: Mutex<Hub>,
    offline: AtomicBool,
    receive_faults: AtomicUsize,
}

impl Shared {
    fn hub(&self) -> MutexGuard<'_, Hub> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::NetworkUnreachable, "memory network is offline"));
        }
        Ok(())
    }

    fn take_receive_fault(&self) -> bool {
        self.receive_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Shared handle to one simulated network segment. Clones refer to the same segment.
#[derive(Clone)]
pub struct MemoryNetwork {
    shared: Arc<Shared>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        MemoryNetwork {
            shared: Arc::new(Shared {
                hub: Mutex::new(Hub { next_id: 0, next_port: FIRST_PORT, endpoints: Vec::new() }),
                offline: AtomicBool::new(false),
                receive_faults: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of open sockets on the segment.
    pub fn open_endpoints(&self) -> usize {
        self.shared.hub().endpoints.len()
    }

    /// Number of open sockets joined to a multicast group.
    pub fn open_listeners(&self) -> usize {
        self.shared.hub().endpoints.iter().filter(|e| e.group.is_some()).count()
    }

    /// While offline, opening sockets and sending fail with `NetworkUnreachable`.
    pub fn set_offline(&self, offline: bool) {
        self.shared.offline.store(offline, Ordering::SeqCst);
    }

    /// The next `count` receive calls on the segment fail with
    /// `ConnectionReset`, whichever endpoints make them.
    pub fn fail_receives(&self, count: usize) {
        self.shared.receive_faults.fetch_add(count, Ordering::SeqCst);
    }

    fn open(&self, group: Option<SocketAddrV4>) -> Result<MemoryTransport> {
        self.shared.check_online()?;
        let (id, addr, rx) = self.shared.hub().register(group);
        Ok(MemoryTransport {
            id,
            addr,
            inbox: Mutex::new(rx),
            shared: self.shared.clone(),
        })
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFactory for MemoryNetwork {
    fn listener(&self, config: &NetworkConfig) -> Result<Box<dyn DatagramTransport>> {
        let group = SocketAddrV4::new(config.broadcast, config.port);
        Ok(Box::new(self.open(Some(group))?))
    }

    fn sender(&self, _config: &NetworkConfig) -> Result<Box<dyn DatagramTransport>> {
        Ok(Box::new(self.open(None)?))
    }
}

pub struct MemoryTransport {
    id: u64,
    addr: SocketAddr,
    inbox: Mutex<Receiver<Datagram>>,
    shared: Arc<Shared>,
}

impl DatagramTransport for MemoryTransport {
    fn send(&self, data: &[u8], destination: SocketAddr) -> Result<usize> {
        self.shared.check_online()?;
        self.shared.hub().route(data, self.addr, destination);
        Ok(data.len())
    }

    fn receive(&self, buffer: &mut [u8], timeout: Option<Duration>) -> Result<Option<(usize, SocketAddr)>> {
        if self.shared.take_receive_fault() {
            return Err(Error::new(ErrorKind::ConnectionReset, "injected receive failure"));
        }
        let inbox = self.inbox.lock().unwrap_or_else(PoisonError::into_inner);
        let received = match timeout {
            Some(t) => match inbox.recv_timeout(t) {
                Ok(datagram) => datagram,
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::new(ErrorKind::NotConnected, "endpoint closed"));
                }
            },
            None => inbox
                .recv()
                .map_err(|_| Error::new(ErrorKind::NotConnected, "endpoint closed"))?,
        };

        let (data, source) = received;
        // Oversized datagrams are truncated like recv_from does.
        let len = data.len().min(buffer.len());
        buffer[..len].copy_from_slice(&data[..len]);
        Ok(Some((len, source)))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.addr)
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.shared.hub().endpoints.retain(|e| e.id != self.id);
    }
}
