use async_trait::async_trait;
use cabin_guard::{
    classify,
    error::MonitorError,
    telemetry::alert::AlertMessage,
    AlertDispatcher, AlertSink, HistoricalAggregator, MemoryReadingCache, MonitorConfig, Reading,
    ReadingCache, RollingWindow, SimulatedSensor, Statistics, Status, TelemetryPoller,
    TelemetrySource, TelemetryView, TimeRange, WebConfig,
};
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

/// Source replaying scripted latest values; `None` fails. History is fixed.
struct ReplaySource {
    latest: Mutex<VecDeque<Option<f64>>>,
    history: Option<Vec<Reading>>,
}

impl ReplaySource {
    fn new(latest: Vec<Option<f64>>, history: Option<Vec<Reading>>) -> Self {
        Self {
            latest: Mutex::new(latest.into()),
            history,
        }
    }
}

#[async_trait]
impl TelemetrySource for ReplaySource {
    async fn fetch_latest(&self) -> cabin_guard::Result<Reading> {
        match self.latest.lock().pop_front().flatten() {
            Some(value) => Ok(Reading::now(value)),
            None => Err(MonitorError::connectivity_error("sensor offline")),
        }
    }

    async fn fetch_range(&self, _range: TimeRange) -> cabin_guard::Result<Vec<Reading>> {
        self.history
            .clone()
            .ok_or_else(|| MonitorError::connectivity_error("history unavailable"))
    }
}

/// Cache whose load always fails.
struct BrokenCache;

#[async_trait]
impl ReadingCache for BrokenCache {
    async fn load(&self) -> cabin_guard::Result<Vec<Reading>> {
        Err(MonitorError::storage_error("corrupted"))
    }

    async fn append(&self, _reading: &Reading) -> cabin_guard::Result<()> {
        Err(MonitorError::storage_error("read-only"))
    }
}

#[derive(Default)]
struct CountingSink {
    user_alerts: AtomicUsize,
    pushes: AtomicUsize,
}

#[async_trait]
impl AlertSink for CountingSink {
    async fn deliver_user_alert(&self, _message: &AlertMessage) -> cabin_guard::Result<()> {
        self.user_alerts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn deliver_push_notification(&self, _message: &AlertMessage) -> cabin_guard::Result<()> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        Err(MonitorError::connectivity_error("push service down"))
    }
}

fn minutes_ago(minutes: i64, value: f64) -> Reading {
    Reading::new(value, Utc::now() - ChronoDuration::minutes(minutes))
}

/// Classification boundaries
#[test]
fn test_classification_thresholds() {
    assert_eq!(classify(20.5), Status::Normal);
    assert_eq!(classify(20.0), Status::Normal);
    assert_eq!(classify(19.9), Status::Warning);
    assert_eq!(classify(19.5), Status::Warning);
    assert_eq!(classify(19.4), Status::Alert);
    assert_eq!(classify(0.0), Status::Alert);
}

/// Rolling window keeps the last ten readings in arrival order
#[test]
fn test_rolling_window_eviction() {
    let window = RollingWindow::new();
    for i in 0..12 {
        window.push(Reading::now(20.0 + i as f64 / 10.0));
    }

    let snapshot = window.snapshot();
    assert_eq!(snapshot.len(), 10);
    assert!((snapshot[0].value - 20.2).abs() < f64::EPSILON);
    assert!((snapshot[9].value - 21.1).abs() < f64::EPSILON);
}

#[test]
fn test_statistics() {
    let readings = vec![
        Reading::now(20.0),
        Reading::now(21.0),
        Reading::now(19.6),
    ];
    let stats = Statistics::from_readings(&readings);
    assert_eq!(stats.average, 20.2);
    assert_eq!(stats.minimum, 19.6);
    assert_eq!(stats.maximum, 21.0);

    assert_eq!(Statistics::from_readings(&[]), Statistics::default());
}

/// Remote unreachable, local cache answers with in-range readings only
#[tokio::test]
async fn test_history_falls_back_to_cache() {
    let remote = Arc::new(ReplaySource::new(Vec::new(), None));
    let cache = Arc::new(MemoryReadingCache::from_readings(vec![
        minutes_ago(90, 18.0),
        minutes_ago(30, 20.0),
        minutes_ago(10, 21.0),
    ]));

    let aggregator = HistoricalAggregator::new(remote, cache);
    let report = assert_ok!(aggregator.query(TimeRange::LastHour).await);

    assert_eq!(report.readings.len(), 2);
    assert_eq!(report.statistics.average, 20.5);
    assert_eq!(report.statistics.minimum, 20.0);
    assert_eq!(report.statistics.maximum, 21.0);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["source"], "local_cache");
}

#[tokio::test]
async fn test_history_prefers_remote() {
    let remote = Arc::new(ReplaySource::new(
        Vec::new(),
        Some(vec![minutes_ago(120, 20.4), minutes_ago(60 * 20, 19.8)]),
    ));
    let cache = Arc::new(MemoryReadingCache::from_readings(vec![minutes_ago(5, 17.0)]));

    let aggregator = HistoricalAggregator::new(remote, cache);
    let report = assert_ok!(aggregator.query(TimeRange::Last24Hours).await);

    assert_eq!(report.readings.len(), 2);
    assert_eq!(report.statistics.average, 20.1);
    assert_eq!(serde_json::to_value(&report).unwrap()["source"], "remote");
}

#[tokio::test]
async fn test_history_fails_when_both_sources_fail() {
    let remote = Arc::new(ReplaySource::new(Vec::new(), None));
    let aggregator = HistoricalAggregator::new(remote, Arc::new(BrokenCache));

    let err = assert_err!(aggregator.query(TimeRange::Last7Days).await);
    assert!(matches!(
        err,
        MonitorError::Aggregation {
            range: TimeRange::Last7Days,
            ..
        }
    ));
}

#[tokio::test]
async fn test_history_empty_everywhere_is_zeroed() {
    let remote = Arc::new(ReplaySource::new(Vec::new(), Some(Vec::new())));
    let aggregator = HistoricalAggregator::new(remote, Arc::new(MemoryReadingCache::new()));

    let report = assert_ok!(aggregator.query(TimeRange::LastHour).await);
    assert!(report.readings.is_empty());
    assert_eq!(report.statistics, Statistics::default());
}

/// A failed poll keeps the last reading and flips `connected`
#[tokio::test]
async fn test_poller_keeps_last_reading_on_failure() {
    let source = Arc::new(ReplaySource::new(vec![Some(20.5), None], None));
    let sink = Arc::new(CountingSink::default());
    let poller = TelemetryPoller::new(
        &MonitorConfig::default(),
        source,
        AlertDispatcher::new(sink.clone()),
    );

    let first = assert_ok!(poller.refresh_now().await);
    assert!(first.connected);
    assert_eq!(first.status, Some(Status::Normal));

    let second = assert_ok!(poller.refresh_now().await);
    assert!(!second.connected);
    assert_eq!(second.reading, first.reading);
    assert_eq!(second.status, Some(Status::Normal));
    assert_eq!(second.recent_readings.len(), 1);
    assert_eq!(second.last_update_time, first.last_update_time);

    assert_eq!(sink.user_alerts.load(Ordering::SeqCst), 0);
}

/// Every unsafe reading alerts, and a failing push channel does not fail the cycle
#[tokio::test]
async fn test_poller_alerts_every_unsafe_reading() {
    let source = Arc::new(ReplaySource::new(
        vec![Some(19.0), Some(18.5), Some(20.4), Some(19.2)],
        None,
    ));
    let sink = Arc::new(CountingSink::default());
    let cache = Arc::new(MemoryReadingCache::new());
    let poller = TelemetryPoller::new(
        &MonitorConfig::default(),
        source,
        AlertDispatcher::new(sink.clone()),
    )
    .with_cache(cache.clone());

    for _ in 0..4 {
        let view = assert_ok!(poller.refresh_now().await);
        assert!(view.connected);
    }

    assert_eq!(sink.user_alerts.load(Ordering::SeqCst), 3);
    assert_eq!(sink.pushes.load(Ordering::SeqCst), 3);
    assert_eq!(cache.len(), 4);
}

#[tokio::test]
async fn test_poller_rejects_refresh_after_stop() {
    let poller = TelemetryPoller::new(
        &MonitorConfig::default(),
        Arc::new(SimulatedSensor::seeded(3)),
        AlertDispatcher::new(Arc::new(CountingSink::default())),
    );

    assert_ok!(poller.refresh_now().await);
    poller.stop();

    let err = assert_err!(poller.refresh_now().await);
    assert!(matches!(err, MonitorError::PollerStopped));
    assert!(poller.start().is_err());
}

#[test]
fn test_monitor_config_defaults() {
    let config = MonitorConfig::default();
    assert_eq!(config.poll_interval_ms, cabin_guard::DEFAULT_POLL_INTERVAL_MS);
    assert_eq!(config.buffer_capacity, 10);
    assert_eq!(config.emergency_number, "911");
    assert!(config.notifications_enabled);
    assert_ok!(config.validate());

    assert_err!(MonitorConfig::default().with_poll_interval_ms(0).validate());
}

#[test]
fn test_web_config() {
    let config = WebConfig::new("127.0.0.1", 3000)
        .with_cors(false)
        .with_max_websocket_connections(5);

    assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:3000");
    assert!(!config.enable_cors);
    assert_eq!(config.max_websocket_connections, 5);
}

#[test]
fn test_monitor_error_messages() {
    let err = MonitorError::aggregation_error(TimeRange::LastHour, "remote down; cache corrupted");
    assert_eq!(
        err.to_string(),
        "Aggregation failed for 1 Hour: remote down; cache corrupted"
    );

    let err = MonitorError::FetchTimeout(std::time::Duration::from_millis(1500));
    assert_eq!(err.to_string(), "Fetch timed out after 1500ms");
    assert!(err.is_connectivity());
}

/// JSON shape consumed by dashboards
#[test]
fn test_telemetry_view_json() {
    let reading = Reading::now(19.7);
    let view = TelemetryView {
        reading: Some(reading),
        status: Some(classify(reading.value)),
        recent_readings: vec![reading],
        connected: true,
        last_update_time: Some(reading.timestamp),
    };

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["status"], "Warning");
    assert_eq!(json["connected"], true);
    assert_eq!(json["reading"]["value"], 19.7);
    assert_eq!(json["recent_readings"].as_array().map(|a| a.len()), Some(1));

    let initial = serde_json::to_value(TelemetryView::initial()).unwrap();
    assert!(initial["reading"].is_null());
    assert_eq!(initial["connected"], false);
}
