//! # Discovery Consumer
//!
//! Queries the network for service types and subscribes to advertisements.
//!
//! ## Key Types
//!
//! - [`Consumer`] - search and watch entry point
//! - [`SearchRequest`] - per-call search options
//! - [`SearchOutcome`] / [`SearchDispatch`] - what a search returns
//!
//! ## Example
//!
//! ```ignore
//! let consumer = Consumer::new(ConsumerConfig::default());
//! let roku = consumer.find_first("roku:ecp", Duration::from_secs(3))?;
//! ```

pub mod search;
pub mod watch;

pub use search::{SearchCallback, SearchDispatch, SearchFilter, SearchHandle, SearchOutcome, SearchRequest, SearchResult};
pub use watch::WatchHandler;

use crate::error::{ErrorHandler, Result};
use crate::logging::{Diagnostics, DiscoveryLogger, LogFacade};
use crate::runtime::config::ConsumerConfig;
use crate::transport::{TransportFactory, UdpFactory};
use search::SearchContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use watch::WatchEngine;

pub struct Consumer {
    config: ConsumerConfig,
    factory: Arc<dyn TransportFactory>,
    diagnostics: Diagnostics,
    watch: WatchEngine,
}

impl Consumer {
    /// Consumer on real UDP sockets, logging through the `log` facade.
    pub fn new(config: ConsumerConfig) -> Self {
        Self::with_transport(config, Arc::new(UdpFactory))
    }

    pub fn with_transport(config: ConsumerConfig, factory: Arc<dyn TransportFactory>) -> Self {
        Consumer {
            config,
            factory,
            diagnostics: Diagnostics::new(LogFacade::new(), None, "consumer"),
            watch: WatchEngine::default(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn DiscoveryLogger>) -> Self {
        self.diagnostics = Diagnostics::new(logger, self.diagnostics.on_error(), "consumer");
        self
    }

    /// Receive failures of the watch listener and of asynchronous searches,
    /// in addition to them being logged. A failed asynchronous search still
    /// delivers the error to its callback or channel.
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.diagnostics = self.diagnostics.with_error_handler(handler);
        self
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// A request pre-filled with this consumer's defaults.
    pub fn request(&self) -> SearchRequest {
        SearchRequest::from_config(&self.config)
    }

    /// Send one query and gather responses as `request` describes.
    ///
    /// Synchronous requests block and return [`SearchDispatch::Completed`];
    /// asynchronous ones return [`SearchDispatch::Running`] and hand the
    /// outcome to their callback. Invalid requests fail before anything is sent.
    pub fn search(&self, request: SearchRequest) -> Result<SearchDispatch> {
        self.search_context().search(request)
    }

    /// Like an asynchronous [`Consumer::search`], but the outcome arrives on
    /// a oneshot channel instead of a callback. `synchronous` and `callback`
    /// on the request are ignored.
    pub fn search_future(&self, request: SearchRequest) -> Result<oneshot::Receiver<Result<SearchOutcome>>> {
        self.search_context().search_channel(request)
    }

    /// First response for `service` within `timeout`, if any.
    pub fn find_first(&self, service: &str, timeout: Duration) -> Result<Option<SearchResult>> {
        let request = self
            .request()
            .service(service)
            .timeout(Some(timeout))
            .first_only(true)
            .synchronous(true);
        Ok(self.search(request)?.completed().and_then(SearchOutcome::first))
    }

    /// Every response for `service` arriving within `timeout`.
    pub fn find_all(&self, service: &str, timeout: Duration) -> Result<Vec<SearchResult>> {
        let request = self
            .request()
            .service(service)
            .timeout(Some(timeout))
            .first_only(false)
            .synchronous(true);
        Ok(self.search(request)?.completed().map(SearchOutcome::into_vec).unwrap_or_default())
    }

    /// Call `handler` for every notification whose `NT` is `service_type`.
    /// Replaces an existing handler for the same type.
    pub fn start_watching_type<F>(&mut self, service_type: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&SearchResult) + Send + Sync + 'static,
    {
        let diagnostics = self.diagnostics.component("watch");
        self.watch.start_watching_type(
            service_type.into(),
            Arc::new(handler),
            &self.config.network,
            &self.factory,
            &diagnostics,
        )
    }

    /// Stops listening once the last watched type is removed.
    pub fn stop_watching_type(&mut self, service_type: &str) {
        self.watch.stop_watching_type(service_type);
    }

    pub fn stop_watching_all(&mut self) {
        self.watch.stop_watching_all();
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_listening()
    }

    pub fn watched_types(&self) -> Vec<String> {
        self.watch.watched_types()
    }

    fn search_context(&self) -> SearchContext<'_> {
        SearchContext {
            network: &self.config.network,
            factory: &self.factory,
            diagnostics: &self.diagnostics,
            no_warnings: self.config.no_warnings,
        }
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.watch.stop_watching_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiscoveryError;
    use crate::logging::LogLevel;
    use crate::logging::tests::CapturingLogger;
    use crate::transport::{DatagramTransport, MemoryNetwork};
    use std::sync::Mutex;

    fn consumer(net: &MemoryNetwork) -> Consumer {
        let config = ConsumerConfig {
            network: crate::runtime::config::NetworkConfig { poll_interval_ms: 10, ..Default::default() },
            timeout_ms: Some(100),
            ..Default::default()
        };
        Consumer::with_transport(config, Arc::new(net.clone()))
    }

    #[test]
    fn test_validation_happens_before_sending() {
        let net = MemoryNetwork::new();
        let listener = net.listener(&Default::default()).unwrap();
        let consumer = consumer(&net);

        let err = consumer.search(consumer.request().first_only(false).timeout(None)).err().unwrap();
        assert!(matches!(err, DiscoveryError::MissingTimeout));
        let err = consumer.search(consumer.request().synchronous(false)).err().unwrap();
        assert!(matches!(err, DiscoveryError::MissingCallback));

        let mut buf = [0u8; 512];
        assert!(listener.receive(&mut buf, Some(Duration::from_millis(20))).unwrap().is_none());
    }

    #[test]
    fn test_query_reaches_group() {
        let net = MemoryNetwork::new();
        let listener = net.listener(&Default::default()).unwrap();
        let consumer = consumer(&net);

        let request = consumer.request().service("test:svc").param("MX", "1");
        let outcome = consumer.search(request).unwrap().completed().unwrap();
        assert_eq!(outcome, SearchOutcome::All(vec![]));

        let mut buf = [0u8; 512];
        let (len, _) = listener.receive(&mut buf, Some(Duration::from_millis(100))).unwrap().unwrap();
        let query = crate::codec::Message::parse(&buf[..len]);
        assert!(query.is_search_request());
        assert_eq!(query.search_target(), Some("test:svc"));
        assert_eq!(query.header("MX"), Some("1"));
    }

    #[test]
    fn test_warnings_respect_no_warnings() {
        let net = MemoryNetwork::new();
        let logger = Arc::new(CapturingLogger::default());
        let loud = consumer(&net).with_logger(logger.clone());
        loud.search(loud.request().first_only(true).timeout(Some(Duration::from_millis(10)))).unwrap();
        assert_eq!(logger.count(LogLevel::Warn), 1);

        let quiet_logger = Arc::new(CapturingLogger::default());
        let config = ConsumerConfig { no_warnings: true, timeout_ms: None, first_only: true, ..Default::default() };
        let quiet = Consumer::with_transport(config, Arc::new(net.clone())).with_logger(quiet_logger.clone());
        let handle = quiet.search(quiet.request().synchronous(false).callback(|_| {})).unwrap();
        assert_eq!(quiet_logger.count(LogLevel::Warn), 0);
        if let SearchDispatch::Running(handle) = handle {
            handle.cancel();
        }
    }

    #[test]
    fn test_async_callback_fires_once() {
        let net = MemoryNetwork::new();
        let consumer = consumer(&net);
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = delivered.clone();

        let request = consumer.request().service("nobody").synchronous(false).callback(move |outcome| {
            sink.lock().unwrap().push(outcome.unwrap());
        });
        match consumer.search(request).unwrap() {
            SearchDispatch::Running(handle) => handle.join(),
            SearchDispatch::Completed(_) => panic!("expected a running search"),
        }

        assert_eq!(*delivered.lock().unwrap(), vec![SearchOutcome::All(vec![])]);
    }

    #[test]
    fn test_send_failure_is_typed() {
        let net = MemoryNetwork::new();
        net.set_offline(true);
        let consumer = consumer(&net);
        let err = consumer.find_first("x", Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, DiscoveryError::Network(_)));
    }

    fn counting_handler(hits: &Arc<Mutex<Vec<bool>>>) -> ErrorHandler {
        let sink = hits.clone();
        Arc::new(move |e: &DiscoveryError| {
            sink.lock().unwrap().push(matches!(e, DiscoveryError::Network(_)));
        })
    }

    #[test]
    fn test_watch_receive_failure_reaches_handler_and_listener_recovers() {
        let net = MemoryNetwork::new();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let mut consumer = consumer(&net).with_error_handler(counting_handler(&failures));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        net.fail_receives(2);
        consumer
            .start_watching_type("t:1", move |n: &SearchResult| {
                sink.lock().unwrap().push(n.header("USN").map(str::to_string));
            })
            .unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(*failures.lock().unwrap(), vec![true, true]);

        let sender = net.sender(&consumer.config().network).unwrap();
        let notify = crate::codec::compose_notify(
            crate::codec::NotificationKind::Alive,
            "t:1",
            "after",
            "239.255.255.250",
            1900,
            &crate::codec::Headers::new(),
        );
        sender.send(&notify, consumer.config().network.group()).unwrap();
        std::thread::sleep(Duration::from_millis(150));
        consumer.stop_watching_all();

        assert!(!consumer.is_watching());
        assert_eq!(*seen.lock().unwrap(), vec![Some("uuid:after".to_string())]);
    }

    #[test]
    fn test_async_search_failure_reaches_handler_and_callback() {
        let net = MemoryNetwork::new();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let consumer = consumer(&net).with_error_handler(counting_handler(&failures));
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = delivered.clone();

        net.fail_receives(1);
        let request = consumer.request().service("x").synchronous(false).callback(move |outcome| {
            sink.lock().unwrap().push(matches!(outcome, Err(DiscoveryError::Network(_))));
        });
        match consumer.search(request).unwrap() {
            SearchDispatch::Running(handle) => handle.join(),
            SearchDispatch::Completed(_) => panic!("expected a running search"),
        }

        assert_eq!(*delivered.lock().unwrap(), vec![true]);
        assert_eq!(*failures.lock().unwrap(), vec![true]);
    }

    #[test]
    fn test_drop_stops_watch_listener() {
        let net = MemoryNetwork::new();
        {
            let mut consumer = consumer(&net);
            consumer.start_watching_type("a", |_: &SearchResult| {}).unwrap();
            assert!(consumer.is_watching());
            assert_eq!(net.open_listeners(), 1);
        }
        assert_eq!(net.open_listeners(), 0);
    }
}
