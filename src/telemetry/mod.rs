//! Oxygen telemetry ingestion, classification, alerting and history.
//!
//! This module holds the monitoring core: readings flow from a
//! [`TelemetrySource`](traits::TelemetrySource) through the classifier into
//! the rolling window and the alert trigger, and the poller publishes the
//! combined result. The historical aggregator answers range queries on its
//! own, independent of the poller's in-memory state.

pub mod alert;
pub mod buffer;
pub mod classifier;
pub mod data;
pub mod history;
pub mod poller;
pub mod traits;

// Re-export commonly used items
pub use alert::{AlertDispatcher, AlertPolicy, AlertState, AlertTrigger, LogAlertSink};
pub use buffer::RollingWindow;
pub use classifier::classify;
pub use data::{HistoryReport, Reading, Statistics, Status, TelemetryView, TimeRange};
pub use history::HistoricalAggregator;
pub use poller::TelemetryPoller;
pub use traits::{AlertSink, ReadingCache, TelemetrySource};
