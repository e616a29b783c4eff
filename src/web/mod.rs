//! Web surface for the cabin guard monitor.
//!
//! Exposes the poller's published views, manual refresh and history queries
//! over REST, and streams every published view over WebSocket.

pub mod config;
pub mod handlers;
pub mod router;
pub mod websocket;

// Re-export commonly used items
pub use config::WebConfig;
pub use router::create_app;

use crate::error::{MonitorError, Result};
use crate::telemetry::{HistoricalAggregator, TelemetryPoller};
use std::future::Future;
use std::sync::Arc;
use tracing::info;
use websocket::ClientRegistry;

/// Shared handles given to every handler.
#[derive(Clone)]
pub struct AppState {
    pub poller: Arc<TelemetryPoller>,
    pub aggregator: Arc<HistoricalAggregator>,
    pub clients: Arc<ClientRegistry>,
}

impl AppState {
    pub fn new(poller: Arc<TelemetryPoller>, aggregator: Arc<HistoricalAggregator>) -> Self {
        Self {
            poller,
            aggregator,
            clients: Arc::new(ClientRegistry::default()),
        }
    }
}

/// Start the web server and run until `shutdown` resolves.
pub async fn start_web_server<F>(config: WebConfig, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(&config, state);

    let addr = config.socket_addr()?;

    info!("Starting cabin guard web server on http://{}", addr);
    info!("Status endpoint: http://{}/api/status", addr);
    info!("History endpoint: http://{}/api/history?range=last_hour", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| MonitorError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| MonitorError::web_server_error(format!("Server error: {}", e)))?;

    info!("Web server stopped");
    Ok(())
}
