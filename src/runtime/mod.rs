//! # Discovery Runtime Module
//!
//! Plumbing shared by the producer and consumer.
//!
//! ## Key Types
//!
//! - [`BackgroundTask`] - named thread with cooperative shutdown
//! - [`StopSignal`] - stop flag with a cancellable sleep
//! - [`config::DiscoveryConfig`] - typed configuration loaded from JSON

pub mod config;
pub mod task;

pub use config::{ConsumerConfig, DiscoveryConfig, NetworkConfig, ProducerConfig};
pub use task::{BackgroundTask, StopSignal};
