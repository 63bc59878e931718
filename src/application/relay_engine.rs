//! Relay engine - sole owner of the shared overlay state.
//!
//! Orchestrates authentication, the per-message pipeline
//! (rate check → parse → merge → persist → broadcast) and connection
//! registration.
//!
//! # Ordering
//!
//! Every mutation of the state runs under one async mutex. A merge, its
//! save and its broadcast complete before the next message is looked at,
//! so merges apply in arrival order and clients see versions in the order
//! they were produced. The save is awaited before the broadcast: a slow
//! disk delays the broadcast of that same change.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};

use crate::domain::relay::{
    AuthRejection, ClientConnection, ClientId, InboundMessage, Outbound, ServerMessage,
    SharedState, TokenGate,
};
use crate::ports::{ConnectionRegistry, RateLimiter, RegisteredConnection, StateStore};

/// What the caller should do after [`RelayEngine::handle_inbound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Message processed and state broadcast. `merged` tells whether it
    /// mutated the state.
    Broadcast { merged: bool },
    /// Message could not be parsed. Nothing changed; keep the connection.
    Malformed,
    /// Budget exceeded. The connection was unregistered and must be closed.
    RateLimited,
}

/// The relay engine.
pub struct RelayEngine {
    state: Mutex<SharedState>,
    gate: TokenGate,
    store: Arc<dyn StateStore>,
    limiter: Arc<dyn RateLimiter>,
    registry: Arc<dyn ConnectionRegistry>,
}

impl RelayEngine {
    /// Create an engine starting from `initial` state.
    pub fn new(
        initial: SharedState,
        gate: TokenGate,
        store: Arc<dyn StateStore>,
        limiter: Arc<dyn RateLimiter>,
        registry: Arc<dyn ConnectionRegistry>,
    ) -> Self {
        Self {
            state: Mutex::new(initial),
            gate,
            store,
            limiter,
            registry,
        }
    }

    /// Create an engine, loading the initial state from `store`.
    ///
    /// A missing or unreadable snapshot yields an empty state.
    pub async fn bootstrap(
        gate: TokenGate,
        store: Arc<dyn StateStore>,
        limiter: Arc<dyn RateLimiter>,
        registry: Arc<dyn ConnectionRegistry>,
    ) -> Self {
        if !gate.is_configured() {
            tracing::warn!("OVERLAY_WS_TOKEN not set. Connections will be rejected.");
        }
        let initial = store.load_or_default().await;
        Self::new(initial, gate, store, limiter, registry)
    }

    /// Check the token presented at connect time.
    pub fn authenticate(&self, provided: Option<&str>) -> Result<(), AuthRejection> {
        self.gate.verify(provided)
    }

    /// Current state snapshot.
    pub async fn snapshot(&self) -> SharedState {
        self.state.lock().await.clone()
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.registry.connection_count().await
    }

    /// Register `connection` and queue its initial snapshot.
    ///
    /// Both happen under the state lock, so no broadcast can reach the
    /// client before its `config:init`. A client that is already gone is
    /// unregistered again.
    pub async fn join(&self, connection: &ClientConnection, outbound: mpsc::Sender<Outbound>) {
        let state = self.state.lock().await;

        let frame = match ServerMessage::ConfigInit(state.clone()).to_json() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize initial snapshot");
                return;
            }
        };

        self.registry
            .register(RegisteredConnection {
                client_id: connection.id(),
                remote_addr: connection.remote_addr(),
                outbound: outbound.clone(),
            })
            .await;

        if outbound.send(Outbound::Text(frame)).await.is_err() {
            tracing::debug!(client_id = %connection.id(), "Client gone before init");
            self.registry.unregister(&connection.id()).await;
        }
    }

    /// Remove a connection from the fan-out. Safe to call more than once.
    pub async fn leave(&self, client_id: &ClientId) {
        self.registry.unregister(client_id).await;
    }

    /// Run one inbound frame through the pipeline.
    pub async fn handle_inbound(&self, connection: &ClientConnection, raw: &[u8]) -> InboundOutcome {
        let identity = connection.identity().to_string();

        if !self.limiter.allow(&identity).await {
            tracing::warn!(
                client_id = %connection.id(),
                identity = %identity,
                "Rate limit exceeded, closing connection"
            );
            self.registry.unregister(&connection.id()).await;
            return InboundOutcome::RateLimited;
        }

        let message = match InboundMessage::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(client_id = %connection.id(), error = %e, "Invalid message received");
                return InboundOutcome::Malformed;
            }
        };

        let mut state = self.state.lock().await;
        let merged = match message {
            InboundMessage::ConfigUpdate(update) => {
                self.merge_and_persist(&mut state, update).await;
                true
            }
            InboundMessage::Other { kind } => {
                tracing::debug!(
                    client_id = %connection.id(),
                    kind = kind.as_deref().unwrap_or("<none>"),
                    "Message without state change, re-broadcasting"
                );
                false
            }
        };
        self.broadcast_locked(&state).await;

        InboundOutcome::Broadcast { merged }
    }

    /// Shallow-merge `update`, persist, broadcast, and return the new state.
    pub async fn apply_merge(&self, update: Map<String, Value>) -> SharedState {
        let mut state = self.state.lock().await;
        self.merge_and_persist(&mut state, update).await;
        self.broadcast_locked(&state).await;
        state.clone()
    }

    async fn merge_and_persist(&self, state: &mut SharedState, update: Map<String, Value>) {
        let written = state.merge(update);
        tracing::debug!(keys_written = written, total_keys = state.len(), "Merged update");

        // In-memory state stays authoritative until the next successful write
        if let Err(e) = self.store.save(state).await {
            tracing::error!(error = %e, "Failed to persist overlay state");
        }
    }

    async fn broadcast_locked(&self, state: &SharedState) {
        match self
            .registry
            .broadcast(&ServerMessage::Config(state.clone()))
            .await
        {
            Ok(report) => tracing::trace!(
                delivered = report.delivered,
                skipped = report.skipped,
                "Broadcast state"
            ),
            Err(e) => tracing::error!(error = %e, "Failed to broadcast state"),
        }
    }
}
