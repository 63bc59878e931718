//! WebSocket upgrade handler for overlay clients.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Check the `token` query parameter
//! 2. Upgrade to WebSocket (rejected clients get a 1008 close right away)
//! 3. Queue the initial snapshot and join the registry
//! 4. Feed inbound frames to the relay engine until close, rate-limit or shutdown
//! 5. Leave the registry and flush the close frame

use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::application::{InboundOutcome, RelayEngine};
use crate::domain::foundation::Timestamp;
use crate::domain::relay::{
    AuthRejection, ClientConnection, ClientId, CloseReason, ConnectionPhase, Outbound,
};

/// How long to wait for queued frames to flush after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a rejected client gets to acknowledge the close frame.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    /// Owner of the shared state.
    pub engine: Arc<RelayEngine>,
    /// Flips to `true` when the server starts shutting down.
    pub shutdown: watch::Receiver<bool>,
    /// Capacity of each connection's outbound queue.
    pub outbound_capacity: usize,
}

impl WebSocketState {
    /// Create a new WebSocket state.
    pub fn new(
        engine: Arc<RelayEngine>,
        shutdown: watch::Receiver<bool>,
        outbound_capacity: usize,
    ) -> Self {
        Self {
            engine,
            shutdown,
            outbound_capacity: outbound_capacity.max(1),
        }
    }
}

/// Query string accepted on the upgrade request.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConnectParams {
    pub token: Option<String>,
}

impl ConnectParams {
    /// Pick the parameters out of decoded query pairs. The first `token`
    /// wins; repeated keys are not an error.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self {
            token: pairs
                .into_iter()
                .find(|(key, _)| key == "token")
                .map(|(_, value)| value),
        }
    }
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /?token=<secret>`
///
/// The token is checked before upgrading, but the upgrade always happens
/// so the client receives a proper policy-violation close code.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(pairs): Query<Vec<(String, String)>>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    State(state): State<WebSocketState>,
) -> Response {
    let params = ConnectParams::from_pairs(pairs);
    let mut connection = ClientConnection::accept(remote_addr);
    let verdict = match connection.advance(ConnectionPhase::Authenticating) {
        Ok(()) => state.engine.authenticate(params.token.as_deref()),
        Err(_) => Err(AuthRejection::MissingToken),
    };

    ws.on_upgrade(move |socket| async move {
        match verdict {
            Ok(()) => handle_socket(socket, connection, state).await,
            Err(rejection) => reject_socket(socket, connection, rejection).await,
        }
    })
}

/// Close an unauthenticated socket with a policy-violation code.
async fn reject_socket(
    mut socket: WebSocket,
    mut connection: ClientConnection,
    rejection: AuthRejection,
) {
    connection.close();
    tracing::warn!(
        client_id = %connection.id(),
        remote_addr = %connection.remote_addr(),
        reason = %rejection,
        "Rejected unauthenticated connection"
    );

    if socket
        .send(close_message(CloseReason::Unauthorized))
        .await
        .is_err()
    {
        return;
    }

    // Wait briefly for the client's close acknowledgement
    let _ = tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, async {
        while let Some(Ok(message)) = socket.recv().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    })
    .await;
}

/// Handle an authenticated WebSocket connection.
///
/// This function runs for the lifetime of the connection, handling:
/// - Joining the registry (initial snapshot first)
/// - Forwarding queued frames to the client
/// - Processing client messages through the engine
/// - Cleanup on disconnect, rate-limit or shutdown
async fn handle_socket(socket: WebSocket, mut connection: ClientConnection, state: WebSocketState) {
    if let Err(e) = connection.advance(ConnectionPhase::Authenticated) {
        tracing::error!(client_id = %connection.id(), error = %e, "Invalid connection phase");
        return;
    }

    let client_id = connection.id();
    let (sender, receiver) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(state.outbound_capacity);

    let mut writer = tokio::spawn(write_loop(sender, outbound_rx, client_id));

    state.engine.join(&connection, outbound_tx.clone()).await;
    tracing::info!(
        client_id = %client_id,
        remote_addr = %connection.remote_addr(),
        "Client connected"
    );

    let (close, writer_finished) = tokio::select! {
        close = read_loop(receiver, &connection, &state.engine, state.shutdown.clone()) => (close, false),
        _ = &mut writer => (None, true),
    };

    state.engine.leave(&client_id).await;
    connection.close();

    if !writer_finished
        && !shut_writer(outbound_tx, close, writer, WRITER_DRAIN_TIMEOUT).await
    {
        tracing::debug!(client_id = %client_id, "Writer did not drain in time, aborted");
    }

    tracing::info!(
        client_id = %client_id,
        reason = close.map(|r| r.reason()).unwrap_or("client disconnected"),
        connected_secs = Timestamp::now()
            .duration_since(&connection.connected_at())
            .num_seconds(),
        "Client disconnected"
    );
}

/// Read frames until the client goes away, a close is required, or shutdown.
///
/// Returns the close reason the server should send, if any.
async fn read_loop(
    mut receiver: SplitStream<WebSocket>,
    connection: &ClientConnection,
    engine: &RelayEngine,
    shutdown: watch::Receiver<bool>,
) -> Option<CloseReason> {
    let shutdown = shutdown_requested(shutdown);
    tokio::pin!(shutdown);

    loop {
        let frame = tokio::select! {
            _ = &mut shutdown => return Some(CloseReason::GoingAway),
            frame = receiver.next() => frame,
        };

        let raw = match frame {
            Some(Ok(Message::Text(text))) => text.into_bytes(),
            Some(Ok(Message::Binary(bytes))) => bytes,
            // WebSocket protocol ping/pong - handled automatically by axum
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) => {
                tracing::debug!(client_id = %connection.id(), "Client sent close frame");
                return None;
            }
            Some(Err(e)) => {
                tracing::debug!(client_id = %connection.id(), "Receive error: {}", e);
                return None;
            }
            None => return None,
        };

        if engine.handle_inbound(connection, &raw).await == InboundOutcome::RateLimited {
            return Some(CloseReason::RateLimited);
        }
    }
}

/// Queue the close frame (if any), release the sender and wait for the
/// writer to flush.
///
/// The whole sequence shares one deadline. A writer still blocked on a
/// client that stopped reading is aborted, and `false` is returned.
async fn shut_writer(
    outbound: mpsc::Sender<Outbound>,
    close: Option<CloseReason>,
    writer: JoinHandle<()>,
    deadline: Duration,
) -> bool {
    let abort = writer.abort_handle();
    let flushed = tokio::time::timeout(deadline, async move {
        if let Some(reason) = close {
            let _ = outbound.send(Outbound::Close(reason)).await;
        }
        // The writer exits once the queue is drained and every sender is gone
        drop(outbound);
        let _ = writer.await;
    })
    .await
    .is_ok();

    if !flushed {
        abort.abort();
    }
    flushed
}

/// Drain the outbound queue into the socket.
async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
    client_id: ClientId,
) {
    while let Some(frame) = outbound.recv().await {
        let (message, last) = match frame {
            Outbound::Text(text) => (Message::Text(text), false),
            Outbound::Close(reason) => (close_message(reason), true),
        };

        if let Err(e) = sender.send(message).await {
            tracing::debug!(client_id = %client_id, "Send error, closing connection: {}", e);
            break;
        }
        if last {
            break;
        }
    }
}

/// Resolves once shutdown has been requested (or the signal source is gone).
async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|down| *down).await;
}

fn close_message(reason: CloseReason) -> Message {
    Message::Close(Some(CloseFrame {
        code: reason.code(),
        reason: Cow::Borrowed(reason.reason()),
    }))
}

/// Create axum router for the WebSocket endpoint.
///
/// # Example
///
/// ```ignore
/// let app = websocket_router().with_state(ws_state);
/// ```
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new().route("/", get(ws_handler))
}
