//! # Cabin Guard - Cabin Oxygen Telemetry Monitor
//!
//! Watches a single oxygen concentration feed from a vehicle cabin sensor,
//! classifies every reading, raises alerts while the cabin is unsafe and
//! answers historical range queries with summary statistics.
//!
//! ## Features
//!
//! - **Periodic polling**: single-flight fetch cycles with bounded timeouts
//! - **Classification**: `Normal` (≥ 20.0%), `Warning` (≥ 19.5%), `Alert` (below)
//! - **Alerting**: user alert plus push notification, best effort, optional cooldown
//! - **History**: last hour / 24 hours / 7 days, remote first, local cache fallback
//! - **Web surface**: REST endpoints and a WebSocket view stream
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cabin_guard::{
//!     AlertDispatcher, LogAlertSink, MonitorConfig, SimulatedSensor, TelemetryPoller,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MonitorConfig::default();
//!     let poller = TelemetryPoller::new(
//!         &config,
//!         Arc::new(SimulatedSensor::new()),
//!         AlertDispatcher::new(Arc::new(LogAlertSink)),
//!     );
//!
//!     let view = poller.refresh_now().await?;
//!     println!("{:?} at {:?}", view.status, view.reading);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod sources;
pub mod telemetry;
pub mod web;

// Re-export public API
pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use sources::{FileReadingCache, MemoryReadingCache, SimulatedSensor};
pub use telemetry::{
    classify, AlertDispatcher, AlertPolicy, AlertSink, AlertState, AlertTrigger,
    HistoricalAggregator, HistoryReport, LogAlertSink, Reading, ReadingCache, RollingWindow,
    Statistics, Status, TelemetryPoller, TelemetrySource, TelemetryView, TimeRange,
};
pub use web::{start_web_server, AppState, WebConfig};

/// The default poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// The default bound on a single remote fetch in milliseconds
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// The default bound on each alert delivery channel in milliseconds
pub const DEFAULT_ALERT_DELIVERY_TIMEOUT_MS: u64 = 5_000;

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8080;
