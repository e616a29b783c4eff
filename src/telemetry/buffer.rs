//! Rolling window of the most recent readings.

use crate::telemetry::data::Reading;
use parking_lot::RwLock;
use std::collections::VecDeque;

/// Default number of readings kept in the window.
pub const DEFAULT_CAPACITY: usize = 10;

/// Fixed-capacity FIFO store of recent readings, oldest first.
///
/// A single writer pushes while any number of readers take snapshots; both
/// go through one lock so a snapshot sees the window either before or after
/// a push, never in between.
#[derive(Debug)]
pub struct RollingWindow {
    capacity: usize,
    readings: RwLock<VecDeque<Reading>>,
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingWindow {
    /// Create a window holding [`DEFAULT_CAPACITY`] readings.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a window with a custom capacity (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            readings: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a reading, evicting the oldest one when full.
    pub fn push(&self, reading: Reading) {
        let mut readings = self.readings.write();
        if readings.len() == self.capacity {
            readings.pop_front();
        }
        readings.push_back(reading);
    }

    /// Current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings.read().iter().copied().collect()
    }

    /// Most recently pushed reading.
    pub fn latest(&self) -> Option<Reading> {
        self.readings.read().back().copied()
    }

    pub fn len(&self) -> usize {
        self.readings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn reading(i: i64) -> Reading {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        Reading::new(20.0 + i as f64 / 100.0, base + Duration::seconds(i * 10))
    }

    #[test]
    fn test_keeps_last_n_in_order() {
        for extra in [0usize, 1, 5, 23] {
            let window = RollingWindow::new();
            let total = DEFAULT_CAPACITY + extra;
            let pushed: Vec<Reading> = (0..total as i64).map(reading).collect();
            for r in &pushed {
                window.push(*r);
            }

            let snapshot = window.snapshot();
            assert_eq!(snapshot.len(), DEFAULT_CAPACITY);
            assert_eq!(snapshot, pushed[total - DEFAULT_CAPACITY..].to_vec());
        }
    }

    #[test]
    fn test_partial_fill() {
        let window = RollingWindow::new();
        assert!(window.is_empty());
        for i in 0..3 {
            window.push(reading(i));
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.snapshot(), vec![reading(0), reading(1), reading(2)]);
        assert_eq!(window.latest(), Some(reading(2)));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let window = RollingWindow::with_capacity(0);
        assert_eq!(window.capacity(), 1);
        window.push(reading(1));
        window.push(reading(2));
        assert_eq!(window.snapshot(), vec![reading(2)]);
    }

    #[test]
    fn test_snapshots_are_never_torn() {
        let window = Arc::new(RollingWindow::with_capacity(4));
        let writer = {
            let window = window.clone();
            std::thread::spawn(move || {
                for i in 0..2_000 {
                    window.push(reading(i));
                }
            })
        };

        for _ in 0..2_000 {
            let snapshot = window.snapshot();
            assert!(snapshot.len() <= 4);
            for pair in snapshot.windows(2) {
                assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::seconds(10));
            }
        }
        writer.join().unwrap();
    }
}
