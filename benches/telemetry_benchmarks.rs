use cabin_guard::{
    classify, AlertDispatcher, LogAlertSink, MonitorConfig, Reading, RollingWindow,
    SimulatedSensor, Statistics, TelemetryPoller, TelemetryView,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::sync::Arc;

fn sample_readings(count: usize) -> Vec<Reading> {
    (0..count)
        .map(|i| Reading::now(19.0 + (i % 25) as f64 / 10.0))
        .collect()
}

/// Benchmark status classification
fn bench_classify(c: &mut Criterion) {
    c.bench_function("classify", |b| {
        b.iter(|| {
            for value in [21.0, 19.7, 18.9] {
                black_box(classify(black_box(value)));
            }
        })
    });
}

/// Benchmark rolling window pushes and snapshots
fn bench_rolling_window(c: &mut Criterion) {
    let window = RollingWindow::new();
    let reading = Reading::now(20.4);

    c.bench_function("window_push", |b| b.iter(|| window.push(black_box(reading))));
    c.bench_function("window_snapshot", |b| b.iter(|| black_box(window.snapshot())));
}

/// Benchmark statistics over history-sized inputs
fn bench_statistics(c: &mut Criterion) {
    // One hour, one day and one week of readings at the default period
    for count in [360usize, 8_640, 60_480].iter() {
        let readings = sample_readings(*count);
        c.bench_with_input(
            BenchmarkId::new("statistics", count),
            &readings,
            |b, readings| b.iter(|| Statistics::from_readings(black_box(readings))),
        );
    }
}

/// Benchmark WebSocket message preparation
fn bench_view_serialization(c: &mut Criterion) {
    let readings = sample_readings(10);
    let view = TelemetryView {
        reading: readings.last().copied(),
        status: readings.last().map(|r| classify(r.value)),
        recent_readings: readings,
        connected: true,
        last_update_time: Some(chrono::Utc::now()),
    };

    c.bench_function("view_serialization", |b| {
        b.iter(|| serde_json::to_string(black_box(&view)).map(String::into_bytes))
    });
}

/// Benchmark a full poll cycle against the simulated sensor
fn bench_poll_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Should create tokio runtime");
    let poller = TelemetryPoller::new(
        &MonitorConfig::default(),
        Arc::new(SimulatedSensor::seeded(42)),
        AlertDispatcher::new(Arc::new(LogAlertSink)),
    );

    c.bench_function("poll_cycle", |b| {
        b.to_async(&rt).iter(|| async { poller.refresh_now().await })
    });
}

criterion_group!(
    benches,
    bench_classify,
    bench_rolling_window,
    bench_statistics,
    bench_view_serialization,
    bench_poll_cycle
);
criterion_main!(benches);
