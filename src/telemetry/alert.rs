//! Alert decisions and best-effort alert delivery.

use crate::error::Result;
use crate::telemetry::data::{Reading, Status};
use crate::telemetry::traits::AlertSink;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, warn};

/// Title of the blocking in-app alert.
pub const USER_ALERT_TITLE: &str = "EMERGENCY ALERT";

/// Title of the push notification.
pub const PUSH_ALERT_TITLE: &str = "EMERGENCY: Child Detection Alert";

/// Body shared by both alert channels.
pub const ALERT_BODY: &str = "Possible child detected in vehicle! Check immediately!";

/// Alert bookkeeping for one monitored device.
///
/// Owned by the poller and never persisted, so a restart may alert again on
/// an already known unsafe reading.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AlertState {
    /// Status of the reading evaluated last
    pub last_status: Option<Status>,
    /// Most recent status that was actually surfaced as an alert
    pub last_alert_status: Option<Status>,
    /// Timestamp of the reading that last raised an alert in the current
    /// unsafe episode; cleared when the episode ends
    pub last_alert_at: Option<DateTime<Utc>>,
}

/// When an unsafe reading raises an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlertPolicy {
    /// Alert on every unsafe reading, including consecutive ones.
    #[default]
    EveryReading,
    /// Alert at most once per window while the device stays unsafe.
    Cooldown(Duration),
}

impl AlertPolicy {
    /// Policy for an optional cooldown in milliseconds.
    pub fn from_cooldown_ms(cooldown_ms: Option<u64>) -> Self {
        match cooldown_ms {
            Some(ms) if ms > 0 => AlertPolicy::Cooldown(Duration::from_millis(ms)),
            _ => AlertPolicy::EveryReading,
        }
    }
}

/// Outcome of evaluating one classified reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertDecision {
    pub should_alert: bool,
    pub state: AlertState,
}

/// Decides whether a classified reading warrants an alert.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertTrigger {
    policy: AlertPolicy,
}

impl AlertTrigger {
    pub fn new(policy: AlertPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    /// Evaluate `reading` with its classified `status` against the prior state.
    ///
    /// Leaving the `Alert` band ends the unsafe episode and re-arms a cooldown.
    pub fn evaluate(&self, reading: &Reading, status: Status, prior: &AlertState) -> AlertDecision {
        if !status.is_alert() {
            return AlertDecision {
                should_alert: false,
                state: AlertState {
                    last_status: Some(status),
                    last_alert_status: prior.last_alert_status,
                    last_alert_at: None,
                },
            };
        }

        let should_alert = match self.policy {
            AlertPolicy::EveryReading => true,
            AlertPolicy::Cooldown(window) => match prior.last_alert_at {
                None => true,
                Some(last) => {
                    let window = ChronoDuration::from_std(window).unwrap_or(ChronoDuration::MAX);
                    reading.timestamp - last >= window
                }
            },
        };

        let state = if should_alert {
            AlertState {
                last_status: Some(status),
                last_alert_status: Some(status),
                last_alert_at: Some(reading.timestamp),
            }
        } else {
            AlertState {
                last_status: Some(status),
                ..*prior
            }
        };

        AlertDecision { should_alert, state }
    }
}

/// Content handed to the alert channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub title: String,
    pub body: String,
    /// Number offered by the "call emergency" action
    pub emergency_number: Option<String>,
    pub reading: Reading,
    pub status: Status,
}

impl AlertMessage {
    fn user_alert(reading: Reading, status: Status, emergency_number: Option<String>) -> Self {
        Self {
            title: USER_ALERT_TITLE.to_string(),
            body: format!("{} Oxygen level {:.1}%.", ALERT_BODY, reading.value),
            emergency_number,
            reading,
            status,
        }
    }

    fn push(reading: Reading, status: Status) -> Self {
        Self {
            title: PUSH_ALERT_TITLE.to_string(),
            body: ALERT_BODY.to_string(),
            emergency_number: None,
            reading,
            status,
        }
    }
}

/// What happened to one dispatched alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryReport {
    pub user_alert_delivered: bool,
    pub push_delivered: bool,
    /// Push skipped because notifications are disabled
    pub push_skipped: bool,
}

/// Delivers alerts through an [`AlertSink`], absorbing every failure.
#[derive(Clone)]
pub struct AlertDispatcher {
    sink: Arc<dyn AlertSink>,
    notifications_enabled: bool,
    emergency_number: Option<String>,
    delivery_timeout: Duration,
}

impl AlertDispatcher {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self {
            sink,
            notifications_enabled: true,
            emergency_number: None,
            delivery_timeout: Duration::from_millis(crate::DEFAULT_ALERT_DELIVERY_TIMEOUT_MS),
        }
    }

    /// Enable or disable the push notification channel.
    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }

    /// Set the number offered by the emergency call action.
    pub fn with_emergency_number(mut self, number: Option<String>) -> Self {
        self.emergency_number = number.filter(|n| !n.trim().is_empty());
        self
    }

    /// Bound how long each channel may take.
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Deliver an alert for `reading` on both channels independently.
    ///
    /// Neither channel retries, and a failure on one does not affect the other.
    pub async fn dispatch(&self, reading: &Reading, status: Status) -> DeliveryReport {
        let user_message = AlertMessage::user_alert(*reading, status, self.emergency_number.clone());
        let push_message = AlertMessage::push(*reading, status);

        let user = self.deliver("user alert", self.sink.deliver_user_alert(&user_message));
        let push = async {
            if self.notifications_enabled {
                Some(
                    self.deliver("push notification", self.sink.deliver_push_notification(&push_message))
                        .await,
                )
            } else {
                debug!("Push notifications disabled, skipping");
                None
            }
        };

        let (user_alert_delivered, push) = tokio::join!(user, push);

        DeliveryReport {
            user_alert_delivered,
            push_delivered: push.unwrap_or(false),
            push_skipped: push.is_none(),
        }
    }

    async fn deliver<F>(&self, channel: &str, delivery: F) -> bool
    where
        F: std::future::Future<Output = Result<()>>,
    {
        match time::timeout(self.delivery_timeout, delivery).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Failed to deliver {}: {}", channel, e);
                false
            }
            Err(_) => {
                warn!(
                    "Delivering {} timed out after {}ms",
                    channel,
                    self.delivery_timeout.as_millis()
                );
                false
            }
        }
    }
}

/// Alert sink that writes alerts to the log.
///
/// Used by the standalone binary, where no dialog or push service exists.
#[derive(Debug, Clone, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn deliver_user_alert(&self, message: &AlertMessage) -> Result<()> {
        match &message.emergency_number {
            Some(number) => error!(
                "{}: {} (call emergency: {})",
                message.title, message.body, number
            ),
            None => error!("{}: {}", message.title, message.body),
        }
        Ok(())
    }

    async fn deliver_push_notification(&self, message: &AlertMessage) -> Result<()> {
        warn!("[push] {}: {}", message.title, message.body);
        Ok(())
    }
}
