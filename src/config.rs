//! Monitor configuration.

use crate::error::{MonitorError, Result};
use crate::telemetry::alert::AlertPolicy;
use crate::web::WebConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables overriding configuration values.
pub const ENV_PREFIX: &str = "CABIN_GUARD";

/// Configuration for monitoring one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Identifier of the monitored device, used in logs
    pub device_id: String,
    /// Period between polls in milliseconds
    pub poll_interval_ms: u64,
    /// Bound on a single remote fetch in milliseconds
    pub fetch_timeout_ms: u64,
    /// Number of readings kept in the rolling window
    pub buffer_capacity: usize,
    /// Minimum gap between alerts of one unsafe episode (unset: alert every reading)
    pub alert_cooldown_ms: Option<u64>,
    /// Whether push notifications are sent
    pub notifications_enabled: bool,
    /// Number offered by the emergency call action
    pub emergency_number: String,
    /// Bound on each alert delivery channel in milliseconds
    pub alert_delivery_timeout_ms: u64,
    /// JSON-lines file persisting readings for history fallback
    pub cache_path: Option<PathBuf>,
    /// Whether the simulated sensor answers history queries
    pub simulate_history: bool,
    /// Observer surface, the `[web]` table
    pub web: WebConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            device_id: "cabin-sensor".to_string(),
            poll_interval_ms: crate::DEFAULT_POLL_INTERVAL_MS,
            fetch_timeout_ms: crate::DEFAULT_FETCH_TIMEOUT_MS,
            buffer_capacity: crate::telemetry::buffer::DEFAULT_CAPACITY,
            alert_cooldown_ms: None,
            notifications_enabled: true,
            emergency_number: "911".to_string(),
            alert_delivery_timeout_ms: crate::DEFAULT_ALERT_DELIVERY_TIMEOUT_MS,
            cache_path: None,
            simulate_history: true,
            web: WebConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from an optional file, then `CABIN_GUARD_*` variables.
    ///
    /// Nested keys use a double underscore (`CABIN_GUARD_WEB__PORT`). Values
    /// missing from both fall back to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: MonitorConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| MonitorError::config_error(format!("Failed to load configuration: {}", e)))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject values the monitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(MonitorError::config_error("poll_interval_ms must be greater than zero"));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(MonitorError::config_error("fetch_timeout_ms must be greater than zero"));
        }
        if self.buffer_capacity == 0 {
            return Err(MonitorError::config_error("buffer_capacity must be greater than zero"));
        }
        if self.alert_delivery_timeout_ms == 0 {
            return Err(MonitorError::config_error(
                "alert_delivery_timeout_ms must be greater than zero",
            ));
        }
        self.web.validate()
    }

    /// Set the monitored device identifier.
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    /// Set the poll period in milliseconds.
    pub fn with_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = interval_ms;
        self
    }

    /// Set the fetch timeout in milliseconds.
    pub fn with_fetch_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.fetch_timeout_ms = timeout_ms;
        self
    }

    /// Set the rolling window capacity.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set or clear the alert cooldown.
    pub fn with_alert_cooldown_ms(mut self, cooldown_ms: Option<u64>) -> Self {
        self.alert_cooldown_ms = cooldown_ms;
        self
    }

    /// Enable or disable push notifications.
    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }

    /// Set the emergency number.
    pub fn with_emergency_number(mut self, number: impl Into<String>) -> Self {
        self.emergency_number = number.into();
        self
    }

    /// Set the reading cache file.
    pub fn with_cache_path(mut self, path: Option<PathBuf>) -> Self {
        self.cache_path = path;
        self
    }

    /// Enable or disable simulated history.
    pub fn with_simulated_history(mut self, enabled: bool) -> Self {
        self.simulate_history = enabled;
        self
    }

    /// Replace the web surface settings.
    pub fn with_web(mut self, web: WebConfig) -> Self {
        self.web = web;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn alert_delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.alert_delivery_timeout_ms)
    }

    pub fn alert_policy(&self) -> AlertPolicy {
        AlertPolicy::from_cooldown_ms(self.alert_cooldown_ms)
    }
}
