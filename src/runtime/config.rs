use crate::error::{DiscoveryError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Settings shared by producers and consumers.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Multicast group all participants send to and listen on (default: 239.255.255.250)
    #[serde(default = "default_broadcast")]
    pub broadcast: Ipv4Addr,
    /// Local interface address listeners bind to and join the group on (default: 0.0.0.0)
    #[serde(default = "default_bind")]
    pub bind: Ipv4Addr,
    /// Discovery port (default: 1900)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Receive buffer size in bytes (default: 65507)
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
    /// Longest time a background listener stays in receive before checking
    /// for a stop request (ms, default: 100)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl NetworkConfig {
    pub fn group(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.broadcast), self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            broadcast: default_broadcast(),
            bind: default_bind(),
            port: default_port(),
            max_packet_size: default_max_packet_size(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Producer Configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProducerConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    /// Delay between periodic alive broadcasts (ms, default: 30000)
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
    /// Whether alive/byebye notifications are sent at all (default: true)
    #[serde(default = "default_true")]
    pub notifier: bool,
    /// Whether `ssdp:all` queries are answered (default: true)
    #[serde(default = "default_true")]
    pub respond_to_all: bool,
}

impl ProducerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        ProducerConfig {
            network: NetworkConfig::default(),
            interval_ms: default_interval(),
            notifier: true,
            respond_to_all: true,
        }
    }
}

/// Consumer Configuration
///
/// These are the defaults a [`crate::SearchRequest`] starts from.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConsumerConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    /// Search timeout (ms, default: 30000, `null` waits forever for first-only searches)
    #[serde(default = "default_timeout")]
    pub timeout_ms: Option<u64>,
    /// Return the first matching response instead of collecting all (default: false)
    #[serde(default)]
    pub first_only: bool,
    /// Block the caller instead of delivering through a callback (default: true)
    #[serde(default = "default_true")]
    pub synchronous: bool,
    /// Silence warnings about searches without a service or timeout (default: false)
    #[serde(default)]
    pub no_warnings: bool,
}

impl ConsumerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        ConsumerConfig {
            network: NetworkConfig::default(),
            timeout_ms: default_timeout(),
            first_only: false,
            synchronous: true,
            no_warnings: false,
        }
    }
}

fn default_broadcast() -> Ipv4Addr { Ipv4Addr::new(239, 255, 255, 250) }
fn default_bind() -> Ipv4Addr { Ipv4Addr::UNSPECIFIED }
fn default_port() -> u16 { 1900 }
fn default_max_packet_size() -> usize { 65_507 }
fn default_poll_interval() -> u64 { 100 }
fn default_interval() -> u64 { 30_000 }
fn default_timeout() -> Option<u64> { Some(30_000) }
fn default_true() -> bool { true }

/// Top-level configuration file.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub producer: ProducerConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
}

impl DiscoveryConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| DiscoveryError::Config(format!("cannot open {}: {}", path.display(), e)))?;
        let config: DiscoveryConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: DiscoveryConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for network in [&self.producer.network, &self.consumer.network] {
            if !network.broadcast.is_multicast() && !network.broadcast.is_broadcast() {
                return Err(DiscoveryError::Config(format!(
                    "{} is neither a multicast nor a broadcast address",
                    network.broadcast
                )));
            }
            if network.max_packet_size == 0 {
                return Err(DiscoveryError::Config("max_packet_size must be positive".into()));
            }
        }
        if self.producer.interval_ms == 0 {
            return Err(DiscoveryError::Config("interval_ms must be positive".into()));
        }
        Ok(())
    }
}
