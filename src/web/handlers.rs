//! HTTP handlers for API endpoints.

use crate::error::MonitorError;
use crate::telemetry::data::{HistoryReport, Reading, TelemetryView, TimeRange};
use crate::web::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            MonitorError::Aggregation { .. } => (StatusCode::SERVICE_UNAVAILABLE, "AGGREGATION_FAILED"),
            MonitorError::PollerStopped => (StatusCode::SERVICE_UNAVAILABLE, "POLLER_STOPPED"),
            MonitorError::Config(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            MonitorError::Connectivity(_) | MonitorError::FetchTimeout(_) => {
                (StatusCode::BAD_GATEWAY, "CONNECTIVITY_ERROR")
            }
            _ => {
                error!("Internal error: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

/// Query parameters of the history endpoint.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    /// Defaults to the last hour
    pub range: Option<TimeRange>,
}

/// Latest published telemetry view.
pub async fn get_status(State(state): State<AppState>) -> Json<TelemetryView> {
    Json(state.poller.current_view())
}

/// Rolling window contents, oldest first.
pub async fn get_recent_readings(State(state): State<AppState>) -> Json<Vec<Reading>> {
    Json(state.poller.recent_readings())
}

/// Run one poll cycle immediately.
pub async fn refresh(State(state): State<AppState>) -> Result<Json<TelemetryView>, MonitorError> {
    state.poller.refresh_now().await.map(Json)
}

/// Readings and statistics for a time range.
pub async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryReport>, MonitorError> {
    let range = params.range.unwrap_or(TimeRange::LastHour);
    state.aggregator.query(range).await.map(Json)
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let view = state.poller.current_view();
    Json(json!({
        "status": "ok",
        "service": "cabin-guard",
        "version": env!("CARGO_PKG_VERSION"),
        "device_id": state.poller.device_id(),
        "polling": state.poller.is_running(),
        "connected": view.connected,
        "websocket_clients": state.clients.count().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
