//! Error handling for the cabin guard telemetry crate.

use crate::telemetry::data::TimeRange;
use std::time::Duration;

/// A specialized `Result` type for cabin guard operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// The main error type for telemetry monitoring operations.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Remote telemetry source unreachable or returned invalid data
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// A fetch did not complete within the configured bound
    #[error("Fetch timed out after {}ms", .0.as_millis())]
    FetchTimeout(Duration),

    /// Local reading cache unreadable or unwritable
    #[error("Storage error: {0}")]
    Storage(String),

    /// Both the remote source and the local cache failed for a history query
    #[error("Aggregation failed for {range}: {reason}")]
    Aggregation { range: TimeRange, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// The poller has been stopped and no longer publishes
    #[error("Telemetry poller is stopped")]
    PollerStopped,

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MonitorError {
    /// Create a new connectivity error
    pub fn connectivity_error(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }

    /// Create a new storage error
    pub fn storage_error(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new aggregation failure for the given range
    pub fn aggregation_error(range: TimeRange, reason: impl Into<String>) -> Self {
        Self::Aggregation {
            range,
            reason: reason.into(),
        }
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Whether this error means the remote source could not be used.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_) | Self::FetchTimeout(_))
    }
}
