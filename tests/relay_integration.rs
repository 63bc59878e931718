//! End-to-end tests against a real relay server using a WebSocket client.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use overlay_relay::application::RelayEngine;
use overlay_relay::config::AppConfig;
use overlay_relay::server::{RelayServer, ServerError};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A booted server plus the handles a test needs to drive it.
struct TestServer {
    addr: SocketAddr,
    engine: Arc<RelayEngine>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    fn url(&self, token: Option<&str>) -> String {
        match token {
            Some(token) => format!("ws://{}/?token={}", self.addr, token),
            None => format!("ws://{}/", self.addr),
        }
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        timeout(TIMEOUT, self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

fn config(state_file: &Path, token: Option<&str>, rate_limit: u32) -> AppConfig {
    AppConfig {
        ws_host: "127.0.0.1".to_string(),
        ws_port: 0,
        ws_token: token.map(str::to_string),
        rate_limit,
        config_path: state_file.to_path_buf(),
        shutdown_grace_secs: 2,
        ..Default::default()
    }
}

async fn boot(config: AppConfig) -> TestServer {
    let server = RelayServer::from_config(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let engine = server.engine().clone();
    let (tx, rx) = oneshot::channel();

    let handle = tokio::spawn(server.serve(async {
        let _ = rx.await;
    }));

    TestServer {
        addr,
        engine,
        shutdown: Some(tx),
        handle,
    }
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = timeout(TIMEOUT, connect_async(url))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    ws
}

/// Next text frame as JSON, skipping control frames.
async fn recv_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("recv timed out")
            .expect("stream ended")
            .expect("ws error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

/// Read until the server's close frame and return its code and reason.
async fn recv_close(ws: &mut WsStream) -> (u16, String) {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("recv timed out")
            .expect("stream ended before close")
            .expect("ws error");
        if let Message::Close(frame) = msg {
            let frame = frame.expect("close frame without code");
            return (u16::from(frame.code), frame.reason.to_string());
        }
    }
}

async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

async fn read_state_file(path: &Path) -> Value {
    let raw = tokio::fs::read_to_string(path).await.unwrap();
    serde_json::from_str(&raw).unwrap()
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn update_is_persisted_and_broadcast_to_every_client() {
    let dir = TempDir::new().unwrap();
    let state_file = dir.path().join("config.json");
    let server = boot(config(&state_file, Some("secret"), 2)).await;

    let mut a = connect(&server.url(Some("secret"))).await;
    let mut b = connect(&server.url(Some("secret"))).await;
    assert_eq!(recv_json(&mut a).await, json!({"type": "config:init", "payload": {}}));
    assert_eq!(recv_json(&mut b).await, json!({"type": "config:init", "payload": {}}));

    send_json(&mut a, json!({"type": "config:update", "payload": {"moon": "selene"}})).await;

    let expected = json!({"type": "config", "payload": {"moon": "selene"}});
    assert_eq!(recv_json(&mut a).await, expected);
    assert_eq!(recv_json(&mut b).await, expected);
    assert_eq!(read_state_file(&state_file).await, json!({"moon": "selene"}));

    server.stop().await;
}

#[tokio::test]
async fn late_joiner_receives_current_state() {
    let dir = TempDir::new().unwrap();
    let server = boot(config(&dir.path().join("config.json"), Some("secret"), 60)).await;

    let mut a = connect(&server.url(Some("secret"))).await;
    recv_json(&mut a).await;
    send_json(&mut a, json!({"type": "config:update", "payload": {"theme": "dark"}})).await;
    recv_json(&mut a).await;

    let mut late = connect(&server.url(Some("secret"))).await;
    assert_eq!(
        recv_json(&mut late).await,
        json!({"type": "config:init", "payload": {"theme": "dark"}})
    );

    server.stop().await;
}

#[tokio::test]
async fn non_update_message_rebroadcasts_unchanged_state() {
    let dir = TempDir::new().unwrap();
    let server = boot(config(&dir.path().join("config.json"), Some("secret"), 60)).await;

    let mut ws = connect(&server.url(Some("secret"))).await;
    recv_json(&mut ws).await;
    send_json(&mut ws, json!({"type": "ping"})).await;

    assert_eq!(recv_json(&mut ws).await, json!({"type": "config", "payload": {}}));

    server.stop().await;
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn third_message_in_window_closes_with_1013() {
    let dir = TempDir::new().unwrap();
    let state_file = dir.path().join("config.json");
    let server = boot(config(&state_file, Some("secret"), 2)).await;

    let mut ws = connect(&server.url(Some("secret"))).await;
    recv_json(&mut ws).await;

    send_json(&mut ws, json!({"type": "config:update", "payload": {"a": 1}})).await;
    send_json(&mut ws, json!({"type": "config:update", "payload": {"b": 2}})).await;
    send_json(&mut ws, json!({"type": "config:update", "payload": {"c": 3}})).await;

    assert_eq!(recv_json(&mut ws).await["payload"], json!({"a": 1}));
    assert_eq!(recv_json(&mut ws).await["payload"], json!({"a": 1, "b": 2}));
    assert_eq!(
        recv_close(&mut ws).await,
        (1013, "Rate limit exceeded".to_string())
    );

    assert_eq!(server.engine.snapshot().await.into_value(), json!({"a": 1, "b": 2}));
    assert_eq!(read_state_file(&state_file).await, json!({"a": 1, "b": 2}));

    server.stop().await;
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn no_configured_token_rejects_with_1008() {
    let dir = TempDir::new().unwrap();
    let server = boot(config(&dir.path().join("config.json"), None, 60)).await;

    for token in [Some("secret"), Some(""), None] {
        let mut ws = connect(&server.url(token)).await;
        assert_eq!(recv_close(&mut ws).await, (1008, "Unauthorized".to_string()));
    }
    assert_eq!(server.engine.connection_count().await, 0);

    server.stop().await;
}

#[tokio::test]
async fn wrong_token_rejects_with_1008_without_registering() {
    let dir = TempDir::new().unwrap();
    let server = boot(config(&dir.path().join("config.json"), Some("secret"), 60)).await;

    let mut intruder = connect(&server.url(Some("guess"))).await;
    assert_eq!(
        recv_close(&mut intruder).await,
        (1008, "Unauthorized".to_string())
    );

    let mut missing = connect(&server.url(None)).await;
    assert_eq!(recv_close(&mut missing).await, (1008, "Unauthorized".to_string()));

    assert_eq!(server.engine.connection_count().await, 0);
    assert!(server.engine.snapshot().await.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn repeated_token_parameter_uses_the_first() {
    let dir = TempDir::new().unwrap();
    let server = boot(config(&dir.path().join("config.json"), Some("secret"), 60)).await;

    let base = format!("ws://{}/", server.addr);
    let mut ws = connect(&format!("{base}?token=secret&token=secret")).await;
    assert_eq!(recv_json(&mut ws).await["type"], "config:init");

    let mut shadowed = connect(&format!("{base}?token=guess&token=secret")).await;
    assert_eq!(
        recv_close(&mut shadowed).await,
        (1008, "Unauthorized".to_string())
    );

    assert_eq!(server.engine.connection_count().await, 1);
    server.stop().await;
}

// =============================================================================
// Malformed input
// =============================================================================

#[tokio::test]
async fn malformed_message_keeps_connection_open() {
    let dir = TempDir::new().unwrap();
    let server = boot(config(&dir.path().join("config.json"), Some("secret"), 60)).await;

    let mut ws = connect(&server.url(Some("secret"))).await;
    recv_json(&mut ws).await;

    ws.send(Message::Text("{not json".to_string())).await.unwrap();
    ws.send(Message::Text("null".to_string())).await.unwrap();
    send_json(&mut ws, json!({"type": "config:update", "payload": {"ok": true}})).await;

    // Malformed frames produce no broadcast; the first reply is for the valid one
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "config", "payload": {"ok": true}})
    );

    server.stop().await;
}

#[tokio::test]
async fn non_object_json_is_rebroadcast_unchanged() {
    let dir = TempDir::new().unwrap();
    let server = boot(config(&dir.path().join("config.json"), Some("secret"), 60)).await;

    let mut ws = connect(&server.url(Some("secret"))).await;
    recv_json(&mut ws).await;

    for frame in ["[1, 2, 3]", "42", "\"hello\""] {
        ws.send(Message::Text(frame.to_string())).await.unwrap();
        assert_eq!(
            recv_json(&mut ws).await,
            json!({"type": "config", "payload": {}}),
            "{frame}"
        );
    }

    server.stop().await;
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let state_file = dir.path().join("config.json");

    let first = boot(config(&state_file, Some("secret"), 60)).await;
    let mut ws = connect(&first.url(Some("secret"))).await;
    recv_json(&mut ws).await;
    send_json(&mut ws, json!({"type": "config:update", "payload": {"scene": "intro"}})).await;
    recv_json(&mut ws).await;
    first.stop().await;

    let second = boot(config(&state_file, Some("secret"), 60)).await;
    let mut ws = connect(&second.url(Some("secret"))).await;
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "config:init", "payload": {"scene": "intro"}})
    );

    second.stop().await;
}

#[tokio::test]
async fn corrupt_state_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    let state_file = dir.path().join("config.json");
    tokio::fs::write(&state_file, "not json at all").await.unwrap();

    let server = boot(config(&state_file, Some("secret"), 60)).await;
    let mut ws = connect(&server.url(Some("secret"))).await;
    assert_eq!(recv_json(&mut ws).await, json!({"type": "config:init", "payload": {}}));

    server.stop().await;
}

#[tokio::test]
async fn shutdown_closes_open_sockets_with_1001() {
    let dir = TempDir::new().unwrap();
    let server = boot(config(&dir.path().join("config.json"), Some("secret"), 60)).await;

    let mut ws = connect(&server.url(Some("secret"))).await;
    recv_json(&mut ws).await;

    let engine = server.engine.clone();
    let stopping = tokio::spawn(server.stop());

    assert_eq!(
        recv_close(&mut ws).await,
        (1001, "Server shutting down".to_string())
    );
    timeout(TIMEOUT, stopping).await.unwrap().unwrap();
    assert_eq!(engine.connection_count().await, 0);
}

#[tokio::test]
async fn health_endpoint_reports_connections() {
    let dir = TempDir::new().unwrap();
    let server = boot(config(&dir.path().join("config.json"), Some("secret"), 60)).await;

    let mut ws = connect(&server.url(Some("secret"))).await;
    recv_json(&mut ws).await;

    let mut stream = tokio::net::TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    timeout(TIMEOUT, stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();

    assert!(response.starts_with("HTTP/1.1 200"), "got: {response}");
    let body = response.split("\r\n\r\n").nth(1).unwrap();
    let health: Value = serde_json::from_str(body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["connections"], 1);

    server.stop().await;
}
