use super::registry::ServiceRegistry;
use crate::codec::{Message, WILDCARD_TARGET, compose_response};
use crate::logging::Diagnostics;
use crate::runtime::config::NetworkConfig;
use crate::runtime::task::StopSignal;
use crate::transport::{DatagramTransport, TransportFactory};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Replies owed to one inbound datagram, in registry order.
///
/// Only `M-SEARCH` requests carrying an `ST` header are answered. The
/// wildcard target gets one reply per service when `respond_to_all` is set;
/// any other target gets a reply only when it is registered exactly.
pub(crate) fn replies_for(
    query: &Message,
    registry: &ServiceRegistry,
    uuid: &str,
    respond_to_all: bool,
) -> Vec<Vec<u8>> {
    if !query.is_search_request() {
        return Vec::new();
    }
    let Some(target) = query.search_target() else {
        return Vec::new();
    };

    if respond_to_all && target.eq_ignore_ascii_case(WILDCARD_TARGET) {
        return registry
            .iter()
            .map(|record| compose_response(&record.service_type, uuid, &record.params))
            .collect();
    }

    registry
        .get(target)
        .map(|record| vec![compose_response(&record.service_type, uuid, &record.params)])
        .unwrap_or_default()
}

/// State the responder thread reads on every query.
pub(crate) struct ResponderState {
    pub(crate) services: Arc<Mutex<ServiceRegistry>>,
    pub(crate) uuid: Arc<RwLock<String>>,
    pub(crate) respond_to_all: bool,
}

impl ResponderState {
    fn replies(&self, query: &Message) -> Vec<Vec<u8>> {
        let services = self.services.lock().unwrap_or_else(PoisonError::into_inner);
        if services.is_empty() {
            return Vec::new();
        }
        let uuid = self.uuid.read().unwrap_or_else(PoisonError::into_inner);
        replies_for(query, &services, &uuid, self.respond_to_all)
    }
}

/// Answer queries arriving on `socket` until `signal` is raised.
pub(crate) fn listen(
    socket: Box<dyn DatagramTransport>,
    state: ResponderState,
    network: NetworkConfig,
    factory: Arc<dyn TransportFactory>,
    signal: &StopSignal,
    diagnostics: &Diagnostics,
) {
    let poll = network.poll_interval();
    let mut buf = vec![0u8; network.max_packet_size];

    while !signal.is_stopped() {
        match socket.receive(&mut buf, Some(poll)) {
            Ok(Some((len, source))) => {
                let replies = state.replies(&Message::parse(&buf[..len]));
                if !replies.is_empty() {
                    reply(&replies, source, &network, factory.as_ref(), diagnostics);
                }
            }
            Ok(None) => {}
            Err(e) => {
                diagnostics.failure("responder receive failed", e.into());
                if signal.wait_timeout(poll) {
                    break;
                }
            }
        }
    }
}

/// Unicast `replies` to the querying endpoint from a transient socket.
fn reply(
    replies: &[Vec<u8>],
    destination: SocketAddr,
    network: &NetworkConfig,
    factory: &dyn TransportFactory,
    diagnostics: &Diagnostics,
) {
    let socket = match factory.sender(network) {
        Ok(socket) => socket,
        Err(e) => {
            diagnostics.failure("could not open reply socket", e.into());
            return;
        }
    };
    for response in replies {
        if let Err(e) = socket.send(response, destination) {
            diagnostics.failure(&format!("reply to {} failed", destination), e.into());
            return;
        }
    }
    diagnostics.debug(&format!("sent {} response(s) to {}", replies.len(), destination));
}
