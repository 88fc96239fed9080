pub mod codec;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod producer;
pub mod runtime;
pub mod transport;

pub use codec::{Headers, Message, NotificationKind};
pub use consumer::{Consumer, SearchDispatch, SearchHandle, SearchOutcome, SearchRequest, SearchResult};
pub use error::{DiscoveryError, ErrorHandler, Result};
pub use logging::{ConsoleLogger, DiscoveryLogger, LogFacade, LogLevel};
pub use producer::{Producer, ServiceParams, ServiceRecord};
pub use runtime::*;
pub use transport::{DatagramTransport, MemoryNetwork, TransportFactory, UdpFactory};
