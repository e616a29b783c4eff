//! Settings of the observer surface, loaded as the `[web]` table of
//! [`MonitorConfig`](crate::config::MonitorConfig).

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// Where the HTTP/WebSocket surface listens and how many live viewers it admits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Address to listen on (IPv4 or IPv6 literal)
    pub host: String,
    pub port: u16,
    /// Send permissive CORS headers so a dashboard on another origin can poll
    pub enable_cors: bool,
    /// Concurrent `/ws` view streams; further upgrades get 503
    pub max_websocket_connections: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_WEB_PORT,
            enable_cors: true,
            max_websocket_connections: 100,
        }
    }
}

impl WebConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }

    pub fn with_max_websocket_connections(mut self, max: usize) -> Self {
        self.max_websocket_connections = max;
        self
    }

    /// Resolve the listening address.
    ///
    /// Only IP literals are accepted; the monitor never resolves hostnames.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.host.trim().parse().map_err(|e| {
            MonitorError::config_error(format!("Invalid web host '{}': {}", self.host, e))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        if self.max_websocket_connections == 0 {
            return Err(MonitorError::config_error(
                "web.max_websocket_connections must be greater than zero",
            ));
        }
        Ok(())
    }
}
