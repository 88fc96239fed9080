use super::search::SearchResult;
use crate::codec::Message;
use crate::error::Result;
use crate::logging::Diagnostics;
use crate::runtime::config::NetworkConfig;
use crate::runtime::task::{BackgroundTask, StopSignal};
use crate::transport::{DatagramTransport, TransportFactory};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type WatchHandler = Arc<dyn Fn(&SearchResult) + Send + Sync>;

type Registry = Arc<Mutex<HashMap<String, WatchHandler>>>;

/// Service-type → handler registry plus the listener that feeds it.
///
/// Idle while the registry is empty; listening (one background thread owning
/// one multicast socket) while at least one type is watched.
#[derive(Default)]
pub(crate) struct WatchEngine {
    handlers: Registry,
    listener: Option<BackgroundTask>,
}

impl WatchEngine {
    fn handlers(&self) -> MutexGuard<'_, HashMap<String, WatchHandler>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    pub(crate) fn watched_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers().keys().cloned().collect();
        types.sort();
        types
    }

    /// Register `handler` for `service_type`, replacing any previous one, and
    /// start listening if idle. Nothing is registered when the socket cannot
    /// be opened.
    pub(crate) fn start_watching_type(
        &mut self,
        service_type: String,
        handler: WatchHandler,
        network: &NetworkConfig,
        factory: &Arc<dyn TransportFactory>,
        diagnostics: &Diagnostics,
    ) -> Result<()> {
        if self.listener.is_none() {
            let socket = factory.listener(network)?;
            let handlers = self.handlers.clone();
            let poll = network.poll_interval();
            let max_packet_size = network.max_packet_size;
            let task_diagnostics = diagnostics.clone();

            let task = BackgroundTask::spawn("ssdp-watch", move |signal| {
                listen(socket, handlers, &signal, poll, max_packet_size, &task_diagnostics);
            })?;
            self.listener = Some(task);
            diagnostics.info(&format!("watch listener started on {}", network.group()));
        }

        diagnostics.debug(&format!("watching {}", service_type));
        self.handlers().insert(service_type, handler);
        Ok(())
    }

    pub(crate) fn stop_watching_type(&mut self, service_type: &str) {
        let now_empty = {
            let mut handlers = self.handlers();
            handlers.remove(service_type);
            handlers.is_empty()
        };
        if now_empty {
            self.stop_listener();
        }
    }

    pub(crate) fn stop_watching_all(&mut self) {
        self.handlers().clear();
        self.stop_listener();
    }

    fn stop_listener(&mut self) {
        if let Some(task) = self.listener.take() {
            task.shutdown();
        }
    }
}

fn listen(
    socket: Box<dyn DatagramTransport>,
    handlers: Registry,
    signal: &StopSignal,
    poll: std::time::Duration,
    max_packet_size: usize,
    diagnostics: &Diagnostics,
) {
    let mut buf = vec![0u8; max_packet_size];

    while !signal.is_stopped() {
        match socket.receive(&mut buf, Some(poll)) {
            Ok(Some((len, source))) => {
                let notification = SearchResult::new(source, Message::parse(&buf[..len]));
                let Some(nt) = notification.message.notification_type() else {
                    continue;
                };
                // Clone out of the lock so a handler never runs while it is held.
                let handler = handlers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(nt)
                    .cloned();
                if let Some(handler) = handler {
                    handler(&notification);
                }
            }
            Ok(None) => {}
            Err(e) => {
                diagnostics.failure("watch receive failed", e.into());
                if signal.wait_timeout(poll) {
                    break;
                }
            }
        }
    }
    // Socket closes on drop.
}
