//! Historical range queries with remote-then-local fallback.

use crate::error::{MonitorError, Result};
use crate::telemetry::data::{DataSource, HistoryReport, Reading, Statistics, TimeRange};
use crate::telemetry::traits::{ReadingCache, TelemetrySource};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, warn};

/// Result of asking one source for readings.
#[derive(Debug)]
pub enum SourceOutcome {
    /// Non-empty, usable readings
    Data(Vec<Reading>),
    /// The source answered but had nothing usable
    Empty,
    /// The call itself failed
    Failed(MonitorError),
}

impl SourceOutcome {
    /// Classify a fetch result, dropping readings with non-finite values.
    pub fn from_fetch(result: Result<Vec<Reading>>) -> Self {
        match result {
            Ok(mut readings) => {
                let fetched = readings.len();
                readings.retain(Reading::is_valid);
                if readings.len() < fetched {
                    warn!("Dropped {} readings with non-finite values", fetched - readings.len());
                }
                if readings.is_empty() {
                    SourceOutcome::Empty
                } else {
                    SourceOutcome::Data(readings)
                }
            }
            Err(e) => SourceOutcome::Failed(e),
        }
    }
}

/// Keep the readings whose timestamp lies in `[now - lookback, now)`, in order.
pub fn filter_to_range(readings: Vec<Reading>, range: TimeRange, now: DateTime<Utc>) -> Vec<Reading> {
    readings
        .into_iter()
        .filter(|r| r.is_valid() && range.contains(r.timestamp, now))
        .collect()
}

/// Answers range queries from the remote source, falling back to the local cache.
///
/// | remote outcome | action                                   |
/// |----------------|------------------------------------------|
/// | `Data`         | use it as is                             |
/// | `Empty`        | load cache, filter to range              |
/// | `Failed`       | load cache, filter to range              |
/// | cache fails    | [`MonitorError::Aggregation`]            |
///
/// Readings keep the order their source returned them in.
pub struct HistoricalAggregator {
    remote: Arc<dyn TelemetrySource>,
    cache: Arc<dyn ReadingCache>,
    fetch_timeout: Duration,
}

impl HistoricalAggregator {
    pub fn new(remote: Arc<dyn TelemetrySource>, cache: Arc<dyn ReadingCache>) -> Self {
        Self {
            remote,
            cache,
            fetch_timeout: Duration::from_millis(crate::DEFAULT_FETCH_TIMEOUT_MS),
        }
    }

    /// Bound the remote fetch; a timeout counts as a failed call.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Query `range` ending now.
    pub async fn query(&self, range: TimeRange) -> Result<HistoryReport> {
        self.query_at(range, Utc::now()).await
    }

    /// Query `range` ending at `now`.
    pub async fn query_at(&self, range: TimeRange, now: DateTime<Utc>) -> Result<HistoryReport> {
        let remote = match time::timeout(self.fetch_timeout, self.remote.fetch_range(range)).await {
            Ok(result) => SourceOutcome::from_fetch(result),
            Err(_) => SourceOutcome::Failed(MonitorError::FetchTimeout(self.fetch_timeout)),
        };

        let (readings, source) = match remote {
            SourceOutcome::Data(readings) => (readings, DataSource::Remote),
            SourceOutcome::Empty => {
                debug!("Remote history for {} is empty, using local cache", range);
                (self.load_local(range, now, None).await?, DataSource::LocalCache)
            }
            SourceOutcome::Failed(e) => {
                warn!("Remote history for {} unavailable, using local cache: {}", range, e);
                (self.load_local(range, now, Some(e)).await?, DataSource::LocalCache)
            }
        };

        let statistics = Statistics::from_readings(&readings);
        debug!(
            "History for {} from {:?}: {} readings, avg {:.1}%",
            range,
            source,
            readings.len(),
            statistics.average
        );

        Ok(HistoryReport {
            range,
            readings,
            statistics,
            source,
        })
    }

    async fn load_local(
        &self,
        range: TimeRange,
        now: DateTime<Utc>,
        remote_error: Option<MonitorError>,
    ) -> Result<Vec<Reading>> {
        match self.cache.load().await {
            Ok(stored) => Ok(filter_to_range(stored, range, now)),
            Err(local_error) => {
                let reason = match remote_error {
                    Some(remote_error) => format!("remote: {}; local: {}", remote_error, local_error),
                    None => format!("remote returned no data; local: {}", local_error),
                };
                Err(MonitorError::aggregation_error(range, reason))
            }
        }
    }
}
