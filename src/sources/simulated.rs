//! Simulated oxygen sensor for demos and local development.

use crate::error::{MonitorError, Result};
use crate::telemetry::data::{Reading, TimeRange};
use crate::telemetry::traits::TelemetrySource;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Number of points generated for a history query.
const HISTORY_POINTS: i32 = 60;

/// Telemetry source producing random values in a configurable band.
///
/// Values are rounded to one decimal, like a real sensor display.
pub struct SimulatedSensor {
    rng: Mutex<StdRng>,
    min: f64,
    max: f64,
    failure_rate: f64,
    serve_history: bool,
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSensor {
    /// Sensor producing 19.5–21.5% from an entropy-seeded generator.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Reproducible sensor.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            min: 19.5,
            max: 21.5,
            failure_rate: 0.0,
            serve_history: true,
        }
    }

    /// Set the value band. Bounds are swapped if given in reverse.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min.min(max);
        self.max = min.max(max);
        self
    }

    /// Probability in `[0, 1]` that a fetch fails.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Whether history queries return generated data or nothing.
    pub fn with_history(mut self, enabled: bool) -> Self {
        self.serve_history = enabled;
        self
    }

    fn sample(&self, rng: &mut StdRng) -> f64 {
        let value = if self.max > self.min {
            rng.gen_range(self.min..=self.max)
        } else {
            self.min
        };
        (value * 10.0).round() / 10.0
    }

    fn roll_failure(&self, rng: &mut StdRng) -> Result<()> {
        if self.failure_rate > 0.0 && rng.gen_bool(self.failure_rate) {
            Err(MonitorError::connectivity_error("simulated sensor dropped the connection"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TelemetrySource for SimulatedSensor {
    async fn fetch_latest(&self) -> Result<Reading> {
        let mut rng = self.rng.lock();
        self.roll_failure(&mut rng)?;
        Ok(Reading::now(self.sample(&mut rng)))
    }

    async fn fetch_range(&self, range: TimeRange) -> Result<Vec<Reading>> {
        let mut rng = self.rng.lock();
        self.roll_failure(&mut rng)?;
        if !self.serve_history {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let step = range.lookback() / HISTORY_POINTS;
        let start = range.start(now);
        Ok((0..HISTORY_POINTS)
            .map(|i| Reading::new(self.sample(&mut rng), start + step * i))
            .collect())
    }
}
