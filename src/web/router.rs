//! Web application router and middleware setup.

use crate::web::config::WebConfig;
use crate::web::websocket::{self, ConnectionLimit};
use crate::web::{handlers, AppState};
use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main axum application with all routes and middleware.
pub fn create_app(config: &WebConfig, state: AppState) -> Router {
    let mut app = Router::new()
        // API routes
        .route("/api/status", get(handlers::get_status))
        .route("/api/readings/recent", get(handlers::get_recent_readings))
        .route("/api/refresh", post(handlers::refresh))
        .route("/api/history", get(handlers::get_history))
        .route("/api/health", get(handlers::health_check))
        // WebSocket route
        .route(
            "/ws",
            get(websocket::websocket_handler).layer(Extension(ConnectionLimit(
                config.max_websocket_connections,
            ))),
        )
        .with_state(state);

    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::sources::{MemoryReadingCache, SimulatedSensor};
    use crate::telemetry::{AlertDispatcher, HistoricalAggregator, LogAlertSink, TelemetryPoller};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let sensor = Arc::new(SimulatedSensor::seeded(11).with_history(false));
        let cache = Arc::new(MemoryReadingCache::new());
        let poller = TelemetryPoller::new(
            &MonitorConfig::default(),
            sensor.clone(),
            AlertDispatcher::new(Arc::new(LogAlertSink)),
        )
        .with_cache(cache.clone());
        let aggregator = HistoricalAggregator::new(sensor, cache);
        AppState::new(Arc::new(poller), Arc::new(aggregator))
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_app(&WebConfig::default(), test_state());
        let (status, body) = call(app, "GET", "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_refresh_then_status_and_history() {
        let state = test_state();
        let app = create_app(&WebConfig::default(), state.clone());

        let (status, view) = call(app.clone(), "POST", "/api/refresh").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["connected"], true);

        let (_, current) = call(app.clone(), "GET", "/api/status").await;
        assert_eq!(current, view);

        let (_, recent) = call(app.clone(), "GET", "/api/readings/recent").await;
        assert_eq!(recent.as_array().map(|a| a.len()), Some(1));

        let (status, report) = call(app, "GET", "/api/history?range=last_24_hours").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["source"], "local_cache");
        assert_eq!(report["range"], "last_24_hours");
    }

    #[tokio::test]
    async fn test_refresh_after_stop_is_unavailable() {
        let state = test_state();
        state.poller.stop();
        let app = create_app(&WebConfig::default(), state);

        let (status, body) = call(app, "POST", "/api/refresh").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "POLLER_STOPPED");
    }
}
