//! Data structures for oxygen telemetry.

use crate::error::{MonitorError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single timestamped oxygen concentration measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Oxygen concentration in percent
    pub value: f64,
    /// When the measurement was taken
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Create a reading taken at the given time.
    pub fn new(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }

    /// Create a reading stamped with the current time.
    pub fn now(value: f64) -> Self {
        Self::new(value, Utc::now())
    }

    /// Whether the measured value is a finite number.
    pub fn is_valid(&self) -> bool {
        self.value.is_finite()
    }

    /// Reject readings whose value is not finite.
    ///
    /// A non-finite value coming from a source is treated like a malformed
    /// payload, i.e. a connectivity failure.
    pub fn validated(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(MonitorError::connectivity_error(format!(
                "reading at {} has non-finite value {}",
                self.timestamp, self.value
            )))
        }
    }
}

/// Safety classification of a reading, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Status {
    Normal,
    Warning,
    Alert,
}

impl Status {
    /// Whether this status is unsafe enough to raise an alert.
    pub fn is_alert(&self) -> bool {
        matches!(self, Status::Alert)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Normal => "Normal",
            Status::Warning => "Warning",
            Status::Alert => "Alert",
        };
        f.write_str(label)
    }
}

/// Named lookback window for historical queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    LastHour,
    #[serde(rename = "last_24_hours")]
    Last24Hours,
    #[serde(rename = "last_7_days")]
    Last7Days,
}

impl TimeRange {
    /// All ranges, shortest first.
    pub const ALL: [TimeRange; 3] = [TimeRange::LastHour, TimeRange::Last24Hours, TimeRange::Last7Days];

    /// Fixed lookback duration of this range.
    pub fn lookback(&self) -> Duration {
        match self {
            TimeRange::LastHour => Duration::hours(1),
            TimeRange::Last24Hours => Duration::hours(24),
            TimeRange::Last7Days => Duration::days(7),
        }
    }

    /// Start of the window when evaluated at `now`.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.lookback()
    }

    /// Whether `timestamp` falls in `[now - lookback, now)`.
    pub fn contains(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        timestamp >= self.start(now) && timestamp < now
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimeRange::LastHour => "1 Hour",
            TimeRange::Last24Hours => "24 Hours",
            TimeRange::Last7Days => "7 Days",
        };
        f.write_str(label)
    }
}

impl FromStr for TimeRange {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1h" | "hour" | "last_hour" | "last-hour" => Ok(TimeRange::LastHour),
            "24h" | "day" | "last_24_hours" | "last-24-hours" => Ok(TimeRange::Last24Hours),
            "7d" | "week" | "last_7_days" | "last-7-days" => Ok(TimeRange::Last7Days),
            other => Err(MonitorError::config_error(format!(
                "Unknown time range '{}'. Use 1h, 24h or 7d",
                other
            ))),
        }
    }
}

/// Summary statistics over a set of readings.
///
/// Every field is rounded to one decimal place. An empty set yields all zeros.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
}

impl Statistics {
    /// Compute statistics over `readings`.
    pub fn from_readings(readings: &[Reading]) -> Self {
        if readings.is_empty() {
            return Self::default();
        }

        let mut sum = 0.0;
        let mut minimum = f64::INFINITY;
        let mut maximum = f64::NEG_INFINITY;
        for reading in readings {
            sum += reading.value;
            minimum = minimum.min(reading.value);
            maximum = maximum.max(reading.value);
        }

        Self {
            average: round_one_decimal(sum / readings.len() as f64),
            minimum: round_one_decimal(minimum),
            maximum: round_one_decimal(maximum),
        }
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Combined state published by the poller after every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryView {
    /// Most recent successful reading (retained across failed cycles)
    pub reading: Option<Reading>,
    /// Classification of `reading`
    pub status: Option<Status>,
    /// Rolling window contents, oldest first
    pub recent_readings: Vec<Reading>,
    /// Whether the last cycle reached the remote source
    pub connected: bool,
    /// Wall-clock time of the last successful update
    pub last_update_time: Option<DateTime<Utc>>,
}

impl TelemetryView {
    /// View before the first cycle has run.
    pub fn initial() -> Self {
        Self {
            reading: None,
            status: None,
            recent_readings: Vec::new(),
            connected: false,
            last_update_time: None,
        }
    }
}

/// Where the readings of a history answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Remote,
    LocalCache,
}

/// Answer to a historical range query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryReport {
    pub range: TimeRange,
    /// Readings in source order
    pub readings: Vec<Reading>,
    pub statistics: Statistics,
    pub source: DataSource,
}
