//! `RelayServer`: Axum HTTP + WebSocket front end for the relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use futures::StreamExt;
use metrics_exporter_prometheus::PrometheusHandle;
use relay_core::RelayError;
use relay_core::errors::Result;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::relay::Relay;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcaster::Broadcaster;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The relay every WebSocket session joins.
    pub relay: Arc<Relay>,
    /// When the server started.
    pub start_time: Instant,
    /// Largest inbound message accepted on `/ws`.
    pub max_message_size: usize,
    /// Prometheus handle for `/metrics`.
    pub metrics: PrometheusHandle,
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
    relay: Arc<Relay>,
    broadcaster: Mutex<Option<Broadcaster>>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: PrometheusHandle,
}

impl RelayServer {
    /// Create a server. Nothing is bound until [`listen`](Self::listen).
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        let (relay, broadcaster) = Relay::new();
        Self {
            config,
            relay,
            broadcaster: Mutex::new(Some(broadcaster)),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            relay: self.relay.clone(),
            start_time: self.start_time,
            max_message_size: self.config.max_message_size,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind, start the broadcaster and serve until shutdown.
    ///
    /// Returns the bound address and the handle of the HTTP serve task.
    /// Can only be called once per server.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>)> {
        let broadcaster = self
            .broadcaster
            .lock()
            .await
            .take()
            .ok_or(RelayError::AlreadyListening)?;

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;

        let token = self.shutdown.token();
        self.shutdown
            .track(tokio::spawn(broadcaster.run(token.clone())))
            .await;

        // upgraded sockets outlive axum's graceful shutdown; close them explicitly
        let relay = self.relay.clone();
        let closer = token.clone();
        self.shutdown
            .track(tokio::spawn(async move {
                closer.cancelled().await;
                let closed = relay.disconnect_all().await;
                info!(closed, "closed open connections");
            }))
            .await;

        let router = self.router();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                warn!(error = %e, "server error");
            }
        });

        info!(%addr, "relay server listening");
        Ok((addr, handle))
    }

    /// The relay behind this server.
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws
async fn ws_handler(
    State(state): State<AppState>,
    ws: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            let err = RelayError::Upgrade(rejection.to_string());
            warn!(error = %err, "websocket upgrade rejected");
            return (StatusCode::INTERNAL_SERVER_ERROR, "WebSocket upgrade failed").into_response();
        }
    };

    let relay = state.relay;
    ws.max_message_size(state.max_message_size)
        .on_failed_upgrade(|e: axum::Error| {
            let err = RelayError::Upgrade(e.to_string());
            warn!(error = %err, "websocket upgrade failed");
        })
        .on_upgrade(move |socket| handle_socket(socket, relay))
}

async fn handle_socket(socket: WebSocket, relay: Arc<Relay>) {
    let (sink, stream) = socket.split();
    let _ = relay.serve(stream, sink).await;
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.relay.registry().len().await;
    Json(health::health_check(state.start_time, connections))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    crate::metrics::render(&state.metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use assert_matches::assert_matches;
    use tower::ServiceExt;

    fn make_server() -> RelayServer {
        RelayServer::new(ServerConfig::default(), crate::metrics::detached_handle())
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        (status, body.to_vec())
    }

    #[test]
    fn default_config_binds_loopback() {
        let server = make_server();
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 0);
        assert!(!server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn health_reports_registry_size() {
        let server = make_server();
        let (status, body) = get_body(server.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert!(parsed["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn plain_get_on_ws_is_upgrade_failure() {
        let (logs, _guard) = relay_core::logging::capture_logs();
        let server = make_server();
        let (status, body) = get_body(server.router(), "/ws").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, b"WebSocket upgrade failed");
        assert_eq!(server.relay().registry().len().await, 0);

        let rejected: Vec<_> = logs
            .events()
            .into_iter()
            .filter(|ev| ev.message == "websocket upgrade rejected")
            .collect();
        assert_eq!(rejected.len(), 1);
        assert!(
            rejected[0]
                .field("error")
                .is_some_and(|e| e.starts_with("WebSocket upgrade failed:"))
        );
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_text() {
        let server = make_server();
        let (status, _) = get_body(server.router(), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let (status, _) = get_body(server.router(), "/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port_once() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert_matches!(server.listen().await, Err(RelayError::AlreadyListening));

        server.shutdown().graceful_shutdown(None).await;
        handle.await.unwrap();
    }
}
