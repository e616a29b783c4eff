//! Periodic polling of the remote telemetry source.
//!
//! Each cycle fetches the latest reading, classifies it, pushes it into the
//! rolling window, evaluates the alert trigger and publishes a combined
//! [`TelemetryView`]. Cycles are single-flight: the periodic timer and
//! [`TelemetryPoller::refresh_now`] share one async lock, so a manual refresh
//! issued mid-cycle waits for that cycle to publish and then runs its own.

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::telemetry::alert::{AlertDispatcher, AlertState, AlertTrigger};
use crate::telemetry::buffer::RollingWindow;
use crate::telemetry::classifier::classify;
use crate::telemetry::data::{Reading, Status, TelemetryView};
use crate::telemetry::traits::{ReadingCache, TelemetrySource};
use chrono::{DateTime, Utc};
use futures_util::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex as CycleLock};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

/// Capacity of the view broadcast channel.
const VIEW_CHANNEL_CAPACITY: usize = 64;

/// What started a cycle, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleTrigger {
    Timer,
    Manual,
}

/// State carried from one cycle to the next.
#[derive(Debug, Clone, Default)]
struct CycleState {
    reading: Option<Reading>,
    status: Option<Status>,
    connected: bool,
    last_update_time: Option<DateTime<Utc>>,
    alert_state: AlertState,
    consecutive_failures: u32,
}

/// Guards publication against `stop()`.
#[derive(Debug)]
struct PublishGate {
    stopped: bool,
    latest: TelemetryView,
}

struct PollerInner {
    device_id: String,
    source: Arc<dyn TelemetrySource>,
    cache: Option<Arc<dyn ReadingCache>>,
    trigger: AlertTrigger,
    dispatcher: AlertDispatcher,
    window: RollingWindow,
    fetch_timeout: Duration,
    cycle: CycleLock<CycleState>,
    gate: Mutex<PublishGate>,
    views: broadcast::Sender<TelemetryView>,
}

/// Polls one device and publishes a [`TelemetryView`] after every cycle.
pub struct TelemetryPoller {
    inner: Arc<PollerInner>,
    poll_interval: Duration,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryPoller {
    /// Create a poller for the device described by `config`.
    ///
    /// The poller is idle until [`start`](Self::start) is called, but
    /// [`refresh_now`](Self::refresh_now) already works.
    pub fn new(
        config: &MonitorConfig,
        source: Arc<dyn TelemetrySource>,
        dispatcher: AlertDispatcher,
    ) -> Self {
        let (views, _) = broadcast::channel(VIEW_CHANNEL_CAPACITY);
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(PollerInner {
                device_id: config.device_id.clone(),
                source,
                cache: None,
                trigger: AlertTrigger::new(config.alert_policy()),
                dispatcher,
                window: RollingWindow::with_capacity(config.buffer_capacity),
                fetch_timeout: config.fetch_timeout(),
                cycle: CycleLock::new(CycleState::default()),
                gate: Mutex::new(PublishGate {
                    stopped: false,
                    latest: TelemetryView::initial(),
                }),
                views,
            }),
            poll_interval: config.poll_interval(),
            shutdown,
            task: Mutex::new(None),
        }
    }

    /// Persist every successful reading to `cache`.
    ///
    /// Must be called before the poller is shared or started.
    pub fn with_cache(mut self, cache: Arc<dyn ReadingCache>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.cache = Some(cache),
            None => warn!("Reading cache attached after the poller was shared, ignoring"),
        }
        self
    }

    /// Start the periodic polling task.
    ///
    /// The first cycle runs immediately. Calling `start` twice is a no-op.
    pub fn start(&self) -> Result<()> {
        if self.is_stopped() {
            return Err(MonitorError::PollerStopped);
        }

        let mut task = self.task.lock();
        if task.is_some() {
            debug!("Poller for {} already running", self.inner.device_id);
            return Ok(());
        }

        let inner = self.inner.clone();
        let shutdown = self.shutdown.subscribe();
        let period = self.poll_interval;
        *task = Some(tokio::spawn(run_loop(inner, period, shutdown)));

        info!(
            "Started polling {} every {}ms",
            self.inner.device_id,
            period.as_millis()
        );
        Ok(())
    }

    /// Run one fetch-and-publish cycle now, outside the periodic schedule.
    ///
    /// Waits for an in-flight cycle to finish first. Does not shift the timer.
    pub async fn refresh_now(&self) -> Result<TelemetryView> {
        self.inner
            .run_cycle(CycleTrigger::Manual)
            .await
            .ok_or(MonitorError::PollerStopped)
    }

    /// Stop polling.
    ///
    /// Never waits on in-flight work: a fetch already running may complete,
    /// but nothing is published once this returns.
    pub fn stop(&self) {
        {
            let mut gate = self.inner.gate.lock();
            if gate.stopped {
                return;
            }
            gate.stopped = true;
        }
        self.shutdown.send_replace(true);
        info!("Stopped polling {}", self.inner.device_id);
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.gate.lock().stopped
    }

    /// Whether the periodic task has been started.
    pub fn is_running(&self) -> bool {
        !self.is_stopped() && self.task.lock().is_some()
    }

    /// Latest published view, or the initial view before the first cycle.
    pub fn current_view(&self) -> TelemetryView {
        self.inner.gate.lock().latest.clone()
    }

    /// Rolling window contents, oldest first.
    pub fn recent_readings(&self) -> Vec<Reading> {
        self.inner.window.snapshot()
    }

    /// Receive every view published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryView> {
        self.inner.views.subscribe()
    }

    /// Published views as a stream. Views missed by a slow consumer are skipped.
    pub fn view_stream(&self) -> BoxStream<'static, TelemetryView> {
        BroadcastStream::new(self.subscribe())
            .filter_map(|view| async move {
                match view {
                    Ok(view) => Some(view),
                    Err(e) => {
                        warn!("View stream lagging: {}", e);
                        None
                    }
                }
            })
            .boxed()
    }

    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }
}

impl Drop for TelemetryPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(inner: Arc<PollerInner>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                inner.run_cycle(CycleTrigger::Timer).await;
            }
        }
        if *shutdown.borrow() {
            break;
        }
    }

    debug!("Polling loop for {} exited", inner.device_id);
}

impl PollerInner {
    fn is_stopped(&self) -> bool {
        self.gate.lock().stopped
    }

    async fn run_cycle(&self, trigger: CycleTrigger) -> Option<TelemetryView> {
        let mut cycle = self.cycle.lock().await;
        if self.is_stopped() {
            return None;
        }

        let fetched = match time::timeout(self.fetch_timeout, self.source.fetch_latest()).await {
            Ok(result) => result.and_then(Reading::validated),
            Err(_) => Err(MonitorError::FetchTimeout(self.fetch_timeout)),
        };

        // Changes are staged on a copy and only committed if the poller is
        // still running when the cycle publishes.
        let mut next = cycle.clone();
        let accepted = match fetched {
            Ok(reading) => {
                self.evaluate_reading(&mut next, reading).await;
                Some(reading)
            }
            Err(e) => {
                next.connected = false;
                next.consecutive_failures += 1;
                warn!(
                    "Failed to fetch latest reading for {} ({} in a row): {}",
                    self.device_id, next.consecutive_failures, e
                );
                None
            }
        };

        let Some(view) = self.commit(&next, accepted) else {
            debug!("Discarding {:?} cycle result for {}, poller stopped", trigger, self.device_id);
            return None;
        };
        *cycle = next;

        if let (Some(reading), Some(cache)) = (accepted, &self.cache) {
            if let Err(e) = cache.append(&reading).await {
                warn!("Failed to persist reading for {}: {}", self.device_id, e);
            }
        }

        Some(view)
    }

    /// Classify `reading`, run the alert trigger and record the outcome in `next`.
    async fn evaluate_reading(&self, next: &mut CycleState, reading: Reading) {
        let status = classify(reading.value);

        let decision = self.trigger.evaluate(&reading, status, &next.alert_state);
        next.alert_state = decision.state;
        if decision.should_alert && !self.is_stopped() {
            let report = self.dispatcher.dispatch(&reading, status).await;
            debug!("Alert for {} dispatched: {:?}", self.device_id, report);
        }

        debug!(
            "{} reading {:.1}% classified as {}",
            self.device_id, reading.value, status
        );

        next.reading = Some(reading);
        next.status = Some(status);
        next.connected = true;
        next.consecutive_failures = 0;
        next.last_update_time = Some(Utc::now());
    }

    /// Push the accepted reading into the window and publish the view, unless stopped.
    ///
    /// Runs under the publish gate, so `stop()` either happens before and
    /// nothing of this cycle is applied, or after and all of it is.
    fn commit(&self, state: &CycleState, accepted: Option<Reading>) -> Option<TelemetryView> {
        let mut gate = self.gate.lock();
        if gate.stopped {
            return None;
        }

        if let Some(reading) = accepted {
            self.window.push(reading);
        }
        let view = TelemetryView {
            reading: state.reading,
            status: state.status,
            recent_readings: self.window.snapshot(),
            connected: state.connected,
            last_update_time: state.last_update_time,
        };

        gate.latest = view.clone();
        // No subscribers is fine; the view is still kept as the latest.
        let _ = self.views.send(view.clone());
        Some(view)
    }
}
