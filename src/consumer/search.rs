use crate::codec::{Headers, Message, compose_search};
use crate::error::{DiscoveryError, Result};
use crate::logging::Diagnostics;
use crate::runtime::config::{ConsumerConfig, NetworkConfig};
use crate::runtime::task::StopSignal;
use crate::transport::{DatagramTransport, TransportFactory};
use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

pub type SearchFilter = Arc<dyn Fn(&SearchResult) -> bool + Send + Sync>;
pub type SearchCallback = Box<dyn FnOnce(Result<SearchOutcome>) + Send>;

/// A datagram received by a consumer, tagged with where it came from.
///
/// Used both for search responses and for watched notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub source: SocketAddr,
    #[serde(flatten)]
    pub message: Message,
}

impl SearchResult {
    pub fn new(source: SocketAddr, message: Message) -> Self {
        SearchResult { source, message }
    }

    pub fn address(&self) -> IpAddr {
        self.source.ip()
    }

    pub fn port(&self) -> u16 {
        self.source.port()
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.message.header(key)
    }
}

/// What a search produced: at most one result for first-only searches,
/// every collected result otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    First(Option<SearchResult>),
    All(Vec<SearchResult>),
}

impl SearchOutcome {
    pub fn first(self) -> Option<SearchResult> {
        match self {
            SearchOutcome::First(result) => result,
            SearchOutcome::All(results) => results.into_iter().next(),
        }
    }

    pub fn into_vec(self) -> Vec<SearchResult> {
        match self {
            SearchOutcome::First(result) => result.into_iter().collect(),
            SearchOutcome::All(results) => results,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            SearchOutcome::First(result) => result.is_none(),
            SearchOutcome::All(results) => results.is_empty(),
        }
    }
}

/// Parameters for one search call. Start from [`crate::Consumer::request`]
/// to inherit the consumer's configured defaults.
pub struct SearchRequest {
    pub(crate) service: Option<String>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) first_only: bool,
    pub(crate) synchronous: bool,
    pub(crate) filter: Option<SearchFilter>,
    pub(crate) params: Headers,
    pub(crate) callback: Option<SearchCallback>,
}

impl SearchRequest {
    pub fn from_config(config: &ConsumerConfig) -> Self {
        SearchRequest {
            service: None,
            timeout: config.timeout(),
            first_only: config.first_only,
            synchronous: config.synchronous,
            filter: None,
            params: Headers::new(),
            callback: None,
        }
    }

    /// Service type to query for (`ST` header). `ssdp:all` asks for everything.
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// `None` waits forever; only valid for first-only searches.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn first_only(mut self, first_only: bool) -> Self {
        self.first_only = first_only;
        self
    }

    pub fn synchronous(mut self, synchronous: bool) -> Self {
        self.synchronous = synchronous;
        self
    }

    /// Only responses for which `filter` returns true are kept.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&SearchResult) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Extra header sent with the query.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Receives the outcome of an asynchronous search, exactly once.
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Result<SearchOutcome>) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    fn validate_window(&self) -> Result<()> {
        if !self.first_only && self.timeout.is_none_or(|t| t < Duration::from_millis(1)) {
            return Err(DiscoveryError::MissingTimeout);
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.synchronous && self.callback.is_none() {
            return Err(DiscoveryError::MissingCallback);
        }
        self.validate_window()
    }
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self::from_config(&ConsumerConfig::default())
    }
}

impl fmt::Debug for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchRequest")
            .field("service", &self.service)
            .field("timeout", &self.timeout)
            .field("first_only", &self.first_only)
            .field("synchronous", &self.synchronous)
            .field("filter", &self.filter.is_some())
            .field("params", &self.params)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Handle to an asynchronous search running on its own thread.
///
/// Dropping the handle detaches the search; its callback still runs.
pub struct SearchHandle {
    signal: Arc<StopSignal>,
    thread: thread::JoinHandle<()>,
}

impl SearchHandle {
    /// Wait for the search to finish and its result to be delivered.
    pub fn join(self) {
        if self.thread.join().is_err() {
            log::error!(target: "ssdp::consumer", "search callback panicked");
        }
    }

    /// End the search early. Whatever was collected so far is delivered.
    pub fn cancel(self) {
        self.signal.stop();
        self.join();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

pub enum SearchDispatch {
    /// The synchronous search finished.
    Completed(SearchOutcome),
    /// The asynchronous search is running; its callback fires once.
    Running(SearchHandle),
}

impl SearchDispatch {
    pub fn completed(self) -> Option<SearchOutcome> {
        match self {
            SearchDispatch::Completed(outcome) => Some(outcome),
            SearchDispatch::Running(_) => None,
        }
    }
}

/// Where an asynchronous search delivers its outcome.
pub(crate) enum ResultSink {
    Callback(SearchCallback),
    Channel(oneshot::Sender<Result<SearchOutcome>>),
}

impl ResultSink {
    fn deliver(self, outcome: Result<SearchOutcome>) {
        match self {
            ResultSink::Callback(callback) => callback(outcome),
            ResultSink::Channel(tx) => {
                // The receiver may have been dropped; nobody is waiting then.
                let _ = tx.send(outcome);
            }
        }
    }
}

/// The receive side of one search: how long to wait and what to keep.
struct SearchWindow {
    timeout: Option<Duration>,
    first_only: bool,
    filter: Option<SearchFilter>,
    max_packet_size: usize,
    // Upper bound on a single receive, so a stop request is noticed.
    poll: Option<Duration>,
}

impl SearchWindow {
    fn accepts(&self, result: &SearchResult) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(result))
    }

    fn next_wait(&self, deadline: Option<Instant>) -> Option<Option<Duration>> {
        let remaining = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return None;
                }
                Some(remaining)
            }
            None => None,
        };
        Some(match (remaining, self.poll) {
            (Some(r), Some(p)) => Some(r.min(p)),
            (r, p) => r.or(p),
        })
    }

    /// Collect responses arriving on `socket` until the window closes.
    ///
    /// Time is accounted against a monotonic deadline, so a run of short
    /// receives can never overrun or cut short the configured timeout.
    fn collect(&self, socket: &dyn DatagramTransport, signal: &StopSignal) -> Result<SearchOutcome> {
        let mut buf = vec![0u8; self.max_packet_size];
        // A timeout too large to represent as an instant waits without a deadline.
        let deadline = self.timeout.and_then(|t| Instant::now().checked_add(t));
        let mut results = Vec::new();

        while !signal.is_stopped() {
            let Some(wait) = self.next_wait(deadline) else {
                break;
            };
            let Some((len, source)) = socket.receive(&mut buf, wait)? else {
                continue;
            };

            let result = SearchResult::new(source, Message::parse(&buf[..len]));
            if !self.accepts(&result) {
                continue;
            }
            if self.first_only {
                return Ok(SearchOutcome::First(Some(result)));
            }
            results.push(result);
        }

        if self.first_only {
            Ok(SearchOutcome::First(None))
        } else {
            Ok(SearchOutcome::All(results))
        }
    }
}

pub(crate) struct SearchContext<'a> {
    pub network: &'a NetworkConfig,
    pub factory: &'a Arc<dyn TransportFactory>,
    pub diagnostics: &'a Diagnostics,
    pub no_warnings: bool,
}

impl SearchContext<'_> {
    /// Validated synchronous or callback-driven search.
    pub(crate) fn search(&self, mut request: SearchRequest) -> Result<SearchDispatch> {
        request.validate()?;
        if request.synchronous {
            let (socket, window) = self.send_query(request)?;
            let outcome = window.collect(socket.as_ref(), &StopSignal::new())?;
            return Ok(SearchDispatch::Completed(outcome));
        }

        let sink = match request.callback.take() {
            Some(callback) => ResultSink::Callback(callback),
            None => return Err(DiscoveryError::MissingCallback),
        };
        let handle = self.spawn(request, sink)?;
        Ok(SearchDispatch::Running(handle))
    }

    /// Asynchronous search delivering through a oneshot channel.
    pub(crate) fn search_channel(&self, request: SearchRequest) -> Result<oneshot::Receiver<Result<SearchOutcome>>> {
        request.validate_window()?;
        let (tx, rx) = oneshot::channel();
        // Detached: the receiver side observes completion.
        let _handle = self.spawn(request, ResultSink::Channel(tx))?;
        Ok(rx)
    }

    fn spawn(&self, request: SearchRequest, sink: ResultSink) -> Result<SearchHandle> {
        let (socket, mut window) = self.send_query(request)?;
        window.poll = Some(self.network.poll_interval());

        let signal = Arc::new(StopSignal::new());
        let task_signal = signal.clone();
        let diagnostics = self.diagnostics.clone();
        let thread = thread::Builder::new()
            .name("ssdp-search".to_string())
            .spawn(move || {
                let outcome = window.collect(socket.as_ref(), &task_signal);
                if let Err(e) = &outcome {
                    diagnostics.report("search receive failed", e);
                }
                sink.deliver(outcome);
            })?;

        Ok(SearchHandle { signal, thread })
    }

    /// Compose and send the query on a fresh socket; responses come back to it.
    fn send_query(&self, request: SearchRequest) -> Result<(Box<dyn DatagramTransport>, SearchWindow)> {
        if !self.no_warnings {
            if request.service.is_none() {
                self.diagnostics.warn("search called without a service specified");
            }
            if request.timeout.is_none() {
                self.diagnostics.warn("search called without a timeout value");
            }
        }

        let socket = self.factory.sender(self.network)?;
        let query = compose_search(
            request.service.as_deref(),
            &self.network.broadcast.to_string(),
            self.network.port,
            &request.params,
        );
        socket.send(&query, self.network.group())?;
        self.diagnostics.debug(&format!(
            "sent M-SEARCH for {} to {}",
            request.service.as_deref().unwrap_or("<any>"),
            self.network.group()
        ));

        let window = SearchWindow {
            timeout: request.timeout,
            first_only: request.first_only,
            filter: request.filter,
            max_packet_size: self.network.max_packet_size,
            poll: None,
        };
        Ok((socket, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::compose_response;
    use crate::transport::MemoryNetwork;

    fn window(first_only: bool, timeout_ms: u64) -> SearchWindow {
        SearchWindow {
            timeout: Some(Duration::from_millis(timeout_ms)),
            first_only,
            filter: None,
            max_packet_size: 2048,
            poll: None,
        }
    }

    fn reply(net: &MemoryNetwork, to: SocketAddr, st: &str, al: &str) {
        let socket = net.sender(&NetworkConfig::default()).unwrap();
        let params = Headers::from([("AL", al)]);
        socket.send(&compose_response(st, "u", &params), to).unwrap();
    }

    #[test]
    fn test_multi_without_timeout_rejected() {
        let request = SearchRequest::default().first_only(false).timeout(None);
        assert!(matches!(request.validate(), Err(DiscoveryError::MissingTimeout)));

        let request = SearchRequest::default().first_only(false).timeout(Some(Duration::ZERO));
        assert!(matches!(request.validate(), Err(DiscoveryError::MissingTimeout)));
    }

    #[test]
    fn test_first_only_without_timeout_allowed() {
        let request = SearchRequest::default().first_only(true).timeout(None);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_async_without_callback_rejected() {
        let request = SearchRequest::default().synchronous(false);
        assert!(matches!(request.validate(), Err(DiscoveryError::MissingCallback)));

        let request = SearchRequest::default().synchronous(false).callback(|_| {});
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_inherits_config() {
        let config = ConsumerConfig { timeout_ms: Some(1500), first_only: true, ..Default::default() };
        let request = SearchRequest::from_config(&config);
        assert_eq!(request.timeout, Some(Duration::from_millis(1500)));
        assert!(request.first_only);
        assert!(request.synchronous);
    }

    #[test]
    fn test_collect_first_applies_filter() {
        let net = MemoryNetwork::new();
        let socket = net.sender(&NetworkConfig::default()).unwrap();
        let addr = socket.local_addr().unwrap();
        reply(&net, addr, "a", "skip");
        reply(&net, addr, "b", "keep");

        let mut w = window(true, 500);
        w.filter = Some(Arc::new(|r: &SearchResult| r.header("AL") == Some("keep")));
        let outcome = w.collect(socket.as_ref(), &StopSignal::new()).unwrap();

        let result = outcome.first().unwrap();
        assert_eq!(result.header("ST"), Some("b"));
    }

    #[test]
    fn test_collect_all_runs_full_window() {
        let net = MemoryNetwork::new();
        let socket = net.sender(&NetworkConfig::default()).unwrap();
        let addr = socket.local_addr().unwrap();
        reply(&net, addr, "a", "1");
        reply(&net, addr, "a", "2");

        let began = Instant::now();
        let outcome = window(false, 150).collect(socket.as_ref(), &StopSignal::new()).unwrap();
        assert!(began.elapsed() >= Duration::from_millis(150));

        let results = outcome.into_vec();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].header("AL"), Some("1"));
        assert_eq!(results[1].header("AL"), Some("2"));
    }

    #[test]
    fn test_collect_with_unrepresentable_deadline() {
        let net = MemoryNetwork::new();
        let socket = net.sender(&NetworkConfig::default()).unwrap();
        reply(&net, socket.local_addr().unwrap(), "svc", "far");

        let mut w = window(true, 0);
        w.timeout = Some(Duration::MAX);
        let outcome = w.collect(socket.as_ref(), &StopSignal::new()).unwrap();
        assert_eq!(outcome.first().unwrap().header("AL"), Some("far"));

        let signal = StopSignal::new();
        signal.stop();
        let mut w = window(false, 0);
        w.timeout = Some(Duration::MAX);
        assert_eq!(w.collect(socket.as_ref(), &signal).unwrap(), SearchOutcome::All(vec![]));
    }

    #[test]
    fn test_collect_stops_on_signal() {
        let net = MemoryNetwork::new();
        let socket = net.sender(&NetworkConfig::default()).unwrap();
        let signal = StopSignal::new();
        signal.stop();

        let outcome = window(true, 10_000).collect(socket.as_ref(), &signal).unwrap();
        assert_eq!(outcome, SearchOutcome::First(None));
    }

    #[test]
    fn test_next_wait_clamps_to_poll() {
        let mut w = window(true, 10_000);
        w.poll = Some(Duration::from_millis(100));
        let deadline = Some(Instant::now() + Duration::from_secs(10));
        assert_eq!(w.next_wait(deadline), Some(Some(Duration::from_millis(100))));

        let expired = Some(Instant::now() - Duration::from_millis(1));
        assert_eq!(w.next_wait(expired), None);

        w.poll = None;
        assert_eq!(w.next_wait(None), Some(None));
    }

    #[test]
    fn test_result_serializes_flat() {
        let raw = b"HTTP/1.1 200 OK\r\nST: a:b\r\nUSN: uuid:x\r\n\r\n";
        let result = SearchResult::new("10.0.0.7:1900".parse().unwrap(), Message::parse(raw));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["source"], "10.0.0.7:1900");
        assert_eq!(json["status"], "HTTP/1.1 200 OK");
        assert_eq!(json["headers"]["USN"], "uuid:x");
        assert!(json["body"].is_null());
    }

    #[test]
    fn test_outcome_accessors() {
        let result = SearchResult::new("127.0.0.1:1900".parse().unwrap(), Message::parse(b"HTTP/1.1 200 OK\r\n\r\n"));
        assert_eq!(result.port(), 1900);
        assert!(SearchOutcome::All(vec![]).is_empty());
        assert!(!SearchOutcome::First(Some(result.clone())).is_empty());
        assert_eq!(SearchOutcome::All(vec![result.clone()]).first(), Some(result));
    }
}
