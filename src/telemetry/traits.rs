//! Collaborator contracts consumed by the telemetry core.
//!
//! The core never talks to a network, a disk or a notification service
//! directly. Everything outside the process is reached through these traits,
//! so a deployment (or a test) decides what sits behind them.

use crate::error::Result;
use crate::telemetry::alert::AlertMessage;
use crate::telemetry::data::{Reading, TimeRange};
use async_trait::async_trait;

/// Remote source of oxygen readings.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Fetch the most recent reading.
    ///
    /// Fails with a connectivity error on network trouble or a malformed payload.
    async fn fetch_latest(&self) -> Result<Reading>;

    /// Fetch the readings recorded within `range`, oldest first.
    ///
    /// An empty vector is a valid answer and means the source has no history.
    async fn fetch_range(&self, range: TimeRange) -> Result<Vec<Reading>>;
}

/// Locally persisted reading history.
#[async_trait]
pub trait ReadingCache: Send + Sync {
    /// Load the full stored history, oldest first. May be empty.
    async fn load(&self) -> Result<Vec<Reading>>;

    /// Persist one more reading.
    async fn append(&self, reading: &Reading) -> Result<()>;
}

/// Channels through which alerts reach the user.
///
/// Both deliveries are best effort. The core logs and drops their errors.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Show the blocking confirmation dialog offering an emergency call.
    async fn deliver_user_alert(&self, message: &AlertMessage) -> Result<()>;

    /// Send a push notification.
    async fn deliver_push_notification(&self, message: &AlertMessage) -> Result<()>;
}
