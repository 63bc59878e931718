//! In-process registry of authenticated WebSocket connections.
//!
//! ```text
//! InMemoryConnectionRegistry
//! ├── client-a ──► mpsc ──► writer task ──► socket
//! ├── client-b ──► mpsc ──► writer task ──► socket
//! └── client-c ──► mpsc ──► writer task ──► socket
//! ```
//!
//! A broadcast serializes once and queues the frame for every client.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::RwLock;

use crate::domain::relay::{ClientId, Outbound, ServerMessage};
use crate::ports::{
    BroadcastReport, ConnectionRegistry, ConnectionRegistryError, RegisteredConnection,
};

/// Tracks live connections by client ID.
///
/// # Thread Safety
///
/// Uses `RwLock` since broadcasts (reads) vastly outnumber
/// registrations (writes).
#[derive(Debug, Default)]
pub struct InMemoryConnectionRegistry {
    connections: RwLock<HashMap<ClientId, RegisteredConnection>>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn register(&self, connection: RegisteredConnection) {
        tracing::debug!(
            client_id = %connection.client_id,
            remote_addr = %connection.remote_addr,
            "Registering connection"
        );
        self.connections
            .write()
            .await
            .insert(connection.client_id, connection);
    }

    async fn unregister(&self, client_id: &ClientId) -> bool {
        let removed = self.connections.write().await.remove(client_id).is_some();
        if removed {
            tracing::debug!(client_id = %client_id, "Unregistered connection");
        }
        removed
    }

    async fn broadcast(
        &self,
        message: &ServerMessage,
    ) -> Result<BroadcastReport, ConnectionRegistryError> {
        let frame = message
            .to_json()
            .map_err(|e| ConnectionRegistryError::Serialization(e.to_string()))?;

        let connections = self.connections.read().await;
        let mut report = BroadcastReport::default();

        for connection in connections.values() {
            match connection.outbound.try_send(Outbound::Text(frame.clone())) {
                Ok(()) => report.delivered += 1,
                // Mid-close; the connection will unregister itself
                Err(TrySendError::Closed(_)) => report.skipped += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        client_id = %connection.client_id,
                        "Outbound queue full, dropping broadcast for slow client"
                    );
                    report.skipped += 1;
                }
            }
        }

        Ok(report)
    }

    async fn is_registered(&self, client_id: &ClientId) -> bool {
        self.connections.read().await.contains_key(client_id)
    }

    async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}
