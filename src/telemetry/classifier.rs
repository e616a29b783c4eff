//! Oxygen level safety classification.

use crate::telemetry::data::Status;

/// Lowest concentration (inclusive) still considered normal.
pub const NORMAL_THRESHOLD: f64 = 20.0;

/// Lowest concentration (inclusive) classified as a warning rather than an alert.
pub const ALERT_THRESHOLD: f64 = 19.5;

/// Map an oxygen concentration to its safety status.
///
/// Boundaries belong to the safer band: 20.0 is `Normal`, 19.5 is `Warning`.
pub fn classify(value: f64) -> Status {
    if value >= NORMAL_THRESHOLD {
        Status::Normal
    } else if value >= ALERT_THRESHOLD {
        Status::Warning
    } else {
        Status::Alert
    }
}
