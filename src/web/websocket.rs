//! WebSocket handler streaming published telemetry views.

use crate::telemetry::data::TelemetryView;
use crate::web::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Maximum number of concurrent WebSocket clients.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimit(pub usize);

/// Connected WebSocket clients, keyed by id.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, SystemTime>>,
}

impl ClientRegistry {
    /// Register a client unless `limit` is reached.
    async fn try_register(&self, limit: usize) -> Option<String> {
        let mut clients = self.clients.write().await;
        if clients.len() >= limit {
            return None;
        }
        let id = uuid::Uuid::new_v4().to_string();
        clients.insert(id.clone(), SystemTime::now());
        Some(id)
    }

    /// Remove a client, returning how long it was connected.
    async fn remove(&self, id: &str) -> Option<Duration> {
        let connected_at = self.clients.write().await.remove(id)?;
        Some(connected_at.elapsed().unwrap_or_default())
    }

    /// Get the number of connected clients.
    pub async fn count(&self) -> usize {
        self.clients.read().await.len()
    }
}

/// WebSocket upgrade handler.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(ConnectionLimit(limit)): Extension<ConnectionLimit>,
) -> Response {
    if state.clients.count().await >= limit {
        warn!("Rejecting WebSocket client, limit of {} reached", limit);
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many WebSocket connections").into_response();
    }

    ws.on_upgrade(move |socket| handle_websocket(socket, state, limit))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: AppState, limit: usize) {
    // Registration happens after the upgrade so failed upgrades never hold a slot
    let Some(client_id) = state.clients.try_register(limit).await else {
        warn!("Closing WebSocket client, limit of {} reached", limit);
        return;
    };
    info!("WebSocket client connected: {}", client_id);

    let (mut sender, mut receiver) = socket.split();

    // Subscribe before sending the current view so nothing published in between is lost
    let mut views = state.poller.subscribe();
    let current = state.poller.current_view();

    // Spawn a task to handle incoming messages from the client
    let client_id_recv = client_id.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    info!("WebSocket client {} disconnected", client_id_recv);
                    break;
                }
                Ok(other) => {
                    debug!("Ignoring message from {}: {:?}", client_id_recv, other);
                }
                Err(e) => {
                    warn!("WebSocket error for client {}: {}", client_id_recv, e);
                    break;
                }
            }
        }
    });

    // Spawn a task to send telemetry views to the client
    let client_id_send = client_id.clone();
    let send_task = tokio::spawn(async move {
        if !send_view(&mut sender, &current, &client_id_send).await {
            return;
        }
        loop {
            match views.recv().await {
                Ok(view) => {
                    if !send_view(&mut sender, &view, &client_id_send).await {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Client {} lagged, skipped {} views", client_id_send, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    join_first(recv_task, send_task, &client_id).await;

    let connected_for = state.clients.remove(&client_id).await.unwrap_or_default();
    info!(
        "WebSocket client disconnected: {} (connected {}s)",
        client_id,
        connected_for.as_secs()
    );
}

/// Wait for either half of a connection to finish and abort the other,
/// so its socket half and view subscription are released right away.
async fn join_first(mut recv_task: JoinHandle<()>, mut send_task: JoinHandle<()>, client_id: &str) {
    tokio::select! {
        _ = &mut recv_task => {
            debug!("Receive task completed for client {}", client_id);
            send_task.abort();
        }
        _ = &mut send_task => {
            debug!("Send task completed for client {}", client_id);
            recv_task.abort();
        }
    }
}

/// Serialize and send one view. Returns false once the socket is unusable.
async fn send_view<S>(sender: &mut S, view: &TelemetryView, client_id: &str) -> bool
where
    S: futures_util::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    match serde_json::to_string(view) {
        Ok(json_string) => {
            if let Err(e) = sender.send(Message::Text(json_string)).await {
                warn!("Failed to send message to client {}: {}", client_id, e);
                return false;
            }
            true
        }
        Err(e) => {
            error!("Failed to serialize view for client {}: {}", client_id, e);
            true
        }
    }
}
