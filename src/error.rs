use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by producers, consumers and configuration loading.
///
/// Timeouts are not represented here: an unmatched bounded wait yields an
/// empty result, never an error.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// An asynchronous search was requested without a delivery callback.
    #[error("asynchronous search is missing a callback")]
    MissingCallback,

    /// A search accepting multiple responses was requested without a usable timeout.
    #[error("search accepting multiple responses must specify a timeout of at least 1 ms")]
    MissingTimeout,

    #[error("network failure: {0}")]
    Network(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl DiscoveryError {
    /// True for errors raised before any network I/O took place.
    pub fn is_validation(&self) -> bool {
        matches!(self, DiscoveryError::MissingCallback | DiscoveryError::MissingTimeout)
    }
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Receives failures that happen inside background tasks, where there is no
/// caller to return them to.
pub type ErrorHandler = Arc<dyn Fn(&DiscoveryError) + Send + Sync>;
