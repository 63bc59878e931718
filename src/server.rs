//! `RelayServer` - Axum HTTP + WebSocket server and its lifecycle.
//!
//! Startup wires the adapters into a [`RelayEngine`], binds the listener and
//! serves until the shutdown signal resolves. Shutdown then stops accepting,
//! tells every open socket to close with 1001, and waits a bounded grace
//! period for the registry to drain.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::adapters::http::{health_router, HealthState};
use crate::adapters::rate_limiter::InMemoryRateLimiter;
use crate::adapters::storage::FileStateStore;
use crate::adapters::websocket::{websocket_router, InMemoryConnectionRegistry, WebSocketState};
use crate::application::RelayEngine;
use crate::config::AppConfig;
use crate::domain::foundation::Timestamp;
use crate::domain::relay::TokenGate;

/// How often shutdown re-checks the registry while draining.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Fatal server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The overlay relay server.
pub struct RelayServer {
    listener: TcpListener,
    engine: Arc<RelayEngine>,
    outbound_capacity: usize,
    shutdown_grace: Duration,
    started_at: Timestamp,
}

impl RelayServer {
    /// Build the production wiring from configuration and bind the listener.
    ///
    /// Persisted state is loaded before the listener accepts anything.
    pub async fn from_config(config: &AppConfig) -> Result<Self, ServerError> {
        let engine = RelayEngine::bootstrap(
            TokenGate::new(config.token().map(str::to_string)),
            Arc::new(FileStateStore::new(&config.config_path)),
            Arc::new(InMemoryRateLimiter::new(config.rate_limit_config())),
            Arc::new(InMemoryConnectionRegistry::new()),
        )
        .await;

        Self::bind(
            &config.listen_addr(),
            Arc::new(engine),
            config.outbound_buffer,
            config.shutdown_grace(),
        )
        .await
    }

    /// Bind `addr` for an already-built engine.
    pub async fn bind(
        addr: &str,
        engine: Arc<RelayEngine>,
        outbound_capacity: usize,
        shutdown_grace: Duration,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        Ok(Self {
            listener,
            engine,
            outbound_capacity,
            shutdown_grace,
            started_at: Timestamp::now(),
        })
    }

    /// Address the listener is bound to (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Get the relay engine.
    pub fn engine(&self) -> &Arc<RelayEngine> {
        &self.engine
    }

    /// Build the Axum router with all routes.
    pub fn router(&self, shutdown: watch::Receiver<bool>) -> Router {
        let ws_state = WebSocketState::new(self.engine.clone(), shutdown, self.outbound_capacity);
        let health_state = HealthState {
            engine: self.engine.clone(),
            started_at: self.started_at,
        };

        Router::new()
            .merge(websocket_router().with_state(ws_state))
            .merge(health_router().with_state(health_state))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }

    /// Serve until `signal` resolves, then shut down gracefully.
    pub async fn serve<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = self.router(shutdown_rx);
        let local_addr = self.local_addr()?;

        tracing::info!(addr = %local_addr, "WebSocket server running on ws://{}", local_addr);

        let engine = self.engine.clone();
        axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            signal.await;
            tracing::info!("Shutting down server...");
            let _ = shutdown_tx.send(true);
        })
        .await?;

        drain(&engine, self.shutdown_grace).await;
        tracing::info!("Server closed");
        Ok(())
    }
}

/// Wait for every registered connection to leave, up to `grace`.
async fn drain(engine: &RelayEngine, grace: Duration) {
    let drained = tokio::time::timeout(grace, async {
        while engine.connection_count().await > 0 {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    })
    .await;

    if drained.is_err() {
        let remaining = engine.connection_count().await;
        tracing::warn!(remaining, "Grace period elapsed with connections still open");
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::InMemoryStateStore;
    use crate::domain::relay::ClientConnection;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn engine() -> Arc<RelayEngine> {
        Arc::new(RelayEngine::new(
            Default::default(),
            TokenGate::new(Some("secret".to_string())),
            Arc::new(InMemoryStateStore::new()),
            Arc::new(InMemoryRateLimiter::with_defaults()),
            Arc::new(InMemoryConnectionRegistry::new()),
        ))
    }

    async fn make_server() -> RelayServer {
        RelayServer::bind("127.0.0.1:0", engine(), 8, Duration::from_millis(200))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let server = make_server().await;
        let addr = server.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = make_server().await;
        let addr = taken.local_addr().unwrap().to_string();

        let result = RelayServer::bind(&addr, engine(), 8, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server().await;
        let (_tx, rx) = watch::channel(false);
        let app = server.router(rx);

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert!(parsed["started_at"].is_string());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server().await;
        let (_tx, rx) = watch::channel(false);
        let app = server.router(rx);

        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serve_returns_after_signal() {
        let server = make_server().await;
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(server.serve(async {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn drain_returns_immediately_when_empty() {
        let engine = engine();
        tokio::time::timeout(Duration::from_secs(1), drain(&engine, Duration::from_secs(30)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn drain_gives_up_after_grace_with_connections_open() {
        let engine = engine();
        let (tx, _rx) = tokio::sync::mpsc::channel(4);
        let conn = ClientConnection::accept("127.0.0.1:5000".parse().unwrap());
        engine.join(&conn, tx).await;

        let started = std::time::Instant::now();
        let task_engine = engine.clone();
        tokio::spawn(async move { drain(&task_engine, Duration::from_millis(100)).await })
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(engine.connection_count().await, 1);
    }
}
