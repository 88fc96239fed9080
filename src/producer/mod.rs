//! # Discovery Producer
//!
//! Advertises service types and answers queries for them.
//!
//! A running producer owns two background tasks: the responder, listening on
//! the multicast group for `M-SEARCH` queries, and (unless disabled) the
//! notifier, multicasting `ssdp:alive` for every service on an interval.
//!
//! ## Example
//!
//! ```ignore
//! let mut producer = Producer::new(ProducerConfig::default());
//! producer.add_service("roku:ecp", "http://192.168.1.20:8060/")?;
//! producer.start()?;
//! // ...
//! producer.stop(true)?;
//! ```

mod notifier;
pub mod registry;
mod responder;

pub use registry::{ServiceParams, ServiceRecord};

use crate::codec::NotificationKind;
use crate::error::{ErrorHandler, Result};
use crate::logging::{Diagnostics, DiscoveryLogger, LogFacade};
use crate::runtime::config::ProducerConfig;
use crate::runtime::task::BackgroundTask;
use crate::transport::{TransportFactory, UdpFactory};
use registry::ServiceRegistry;
use responder::ResponderState;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

pub struct Producer {
    config: ProducerConfig,
    services: Arc<Mutex<ServiceRegistry>>,
    uuid: Arc<RwLock<String>>,
    factory: Arc<dyn TransportFactory>,
    diagnostics: Diagnostics,
    listener: Option<BackgroundTask>,
    notifier: Option<BackgroundTask>,
}

impl Producer {
    /// Producer on real UDP sockets with a random v4 UUID.
    pub fn new(config: ProducerConfig) -> Self {
        Self::with_transport(config, Arc::new(UdpFactory))
    }

    pub fn with_transport(config: ProducerConfig, factory: Arc<dyn TransportFactory>) -> Self {
        Producer {
            config,
            services: Arc::new(Mutex::new(ServiceRegistry::default())),
            uuid: Arc::new(RwLock::new(uuid::Uuid::new_v4().to_string())),
            factory,
            diagnostics: Diagnostics::new(LogFacade::new(), None, "producer"),
            listener: None,
            notifier: None,
        }
    }

    /// Takes effect for tasks started afterwards.
    pub fn with_logger(mut self, logger: Arc<dyn DiscoveryLogger>) -> Self {
        self.diagnostics = Diagnostics::new(logger, self.diagnostics.on_error(), "producer");
        self
    }

    /// Receive failures of the responder and notifier tasks, in addition to
    /// them being logged. Takes effect for tasks started afterwards.
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.diagnostics = self.diagnostics.with_error_handler(handler);
        self
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    pub fn uuid(&self) -> String {
        self.uuid.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the identity used in every `USN` sent from now on.
    pub fn set_uuid(&self, uuid: impl Into<String>) {
        *self.uuid.write().unwrap_or_else(PoisonError::into_inner) = uuid.into();
    }

    fn services(&self) -> MutexGuard<'_, ServiceRegistry> {
        self.services.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register or replace a service.
    ///
    /// A plain location string is stored as both the `AL` and `LOCATION`
    /// headers. While running with the notifier enabled, one alive
    /// notification for the service goes out immediately.
    pub fn add_service(&self, service_type: impl Into<String>, params: impl Into<ServiceParams>) -> Result<()> {
        let record = ServiceRecord {
            service_type: service_type.into(),
            params: params.into().into_headers(),
        };
        self.services().insert(record.clone());
        self.diagnostics.debug(&format!("added service {}", record.service_type));

        if self.config.notifier && self.is_running() {
            notifier::announce(
                NotificationKind::Alive,
                std::slice::from_ref(&record),
                &self.uuid(),
                &self.config.network,
                self.factory.as_ref(),
            )?;
        }
        Ok(())
    }

    /// Forget a service. No bye-bye is sent for it.
    pub fn remove_service(&self, service_type: &str) -> Option<ServiceRecord> {
        self.services().remove(service_type)
    }

    /// Registered services in the order they were first added.
    pub fn service_records(&self) -> Vec<ServiceRecord> {
        self.services().snapshot()
    }

    /// Reflects whether the responder is running.
    pub fn is_running(&self) -> bool {
        self.listener.is_some()
    }

    /// Launch the notifier (if enabled and not running), then the responder
    /// (if not running). A notifier started here is stopped again when the
    /// responder cannot be started.
    pub fn start(&mut self) -> Result<()> {
        let started_notifier = self.config.notifier && self.notifier.is_none();
        if started_notifier {
            self.notifier = Some(self.spawn_notifier()?);
        }

        if self.listener.is_none() {
            match self.spawn_listener() {
                Ok(task) => self.listener = Some(task),
                Err(e) => {
                    if started_notifier {
                        self.stop_notifier();
                    }
                    return Err(e);
                }
            }
            self.diagnostics.info(&format!(
                "producer {} listening on {}",
                self.uuid(),
                self.config.network.group()
            ));
        }
        Ok(())
    }

    /// Stop both tasks, waiting for them to exit, then broadcast bye-bye for
    /// every service when `bye_bye` is set, the notifier is enabled and the
    /// producer was running.
    pub fn stop(&mut self, bye_bye: bool) -> Result<()> {
        let was_running = self.is_running();
        if let Some(task) = self.listener.take() {
            task.shutdown();
        }
        self.stop_notifier();

        if bye_bye && self.config.notifier && was_running {
            let records = self.service_records();
            notifier::announce(
                NotificationKind::ByeBye,
                &records,
                &self.uuid(),
                &self.config.network,
                self.factory.as_ref(),
            )?;
            self.diagnostics.info(&format!("sent bye-bye for {} service(s)", records.len()));
        }
        Ok(())
    }

    fn stop_notifier(&mut self) {
        if let Some(task) = self.notifier.take() {
            task.shutdown();
        }
    }

    fn spawn_listener(&self) -> Result<BackgroundTask> {
        let socket = self.factory.listener(&self.config.network)?;
        let state = ResponderState {
            services: self.services.clone(),
            uuid: self.uuid.clone(),
            respond_to_all: self.config.respond_to_all,
        };
        let network = self.config.network.clone();
        let factory = self.factory.clone();
        let diagnostics = self.diagnostics.component("responder");

        let task = BackgroundTask::spawn("ssdp-responder", move |signal| {
            responder::listen(socket, state, network, factory, &signal, &diagnostics);
        })?;
        Ok(task)
    }

    fn spawn_notifier(&self) -> Result<BackgroundTask> {
        let services = self.services.clone();
        let uuid = self.uuid.clone();
        let interval = self.config.interval();
        let network = self.config.network.clone();
        let factory = self.factory.clone();
        let diagnostics = self.diagnostics.component("notifier");

        let task = BackgroundTask::spawn("ssdp-notifier", move |signal| {
            notifier::run(services, uuid, interval, network, factory, &signal, &diagnostics);
        })?;
        Ok(task)
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        if let Some(task) = self.listener.take() {
            task.shutdown();
        }
        self.stop_notifier();
    }
}
