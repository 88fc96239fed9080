use super::registry::{ServiceRecord, ServiceRegistry};
use crate::codec::{NotificationKind, compose_notify};
use crate::logging::Diagnostics;
use crate::runtime::config::NetworkConfig;
use crate::runtime::task::StopSignal;
use crate::transport::TransportFactory;
use std::io;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Multicast one `kind` notification per record from a single transient socket.
pub(crate) fn announce(
    kind: NotificationKind,
    records: &[ServiceRecord],
    uuid: &str,
    network: &NetworkConfig,
    factory: &dyn TransportFactory,
) -> io::Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    let socket = factory.sender(network)?;
    let host = network.broadcast.to_string();
    for record in records {
        let payload = compose_notify(kind, &record.service_type, uuid, &host, network.port, &record.params);
        socket.send(&payload, network.group())?;
    }
    Ok(())
}

/// Every `interval`, announce all registered services as alive.
/// The first round goes out one interval after start.
pub(crate) fn run(
    services: Arc<Mutex<ServiceRegistry>>,
    uuid: Arc<RwLock<String>>,
    interval: Duration,
    network: NetworkConfig,
    factory: Arc<dyn TransportFactory>,
    signal: &StopSignal,
    diagnostics: &Diagnostics,
) {
    while !signal.wait_timeout(interval) {
        let records = services.lock().unwrap_or_else(PoisonError::into_inner).snapshot();
        let uuid = uuid.read().unwrap_or_else(PoisonError::into_inner).clone();

        match announce(NotificationKind::Alive, &records, &uuid, &network, factory.as_ref()) {
            Ok(()) => diagnostics.debug(&format!("announced {} service(s)", records.len())),
            Err(e) => diagnostics.failure("alive broadcast failed", e.into()),
        }
    }
}
