//! ConnectionRegistry port - Interface for tracking live authenticated sockets.
//!
//! Only authenticated connections are ever registered. Each one hands the
//! registry the sending half of its outbound queue, and a broadcast pushes
//! the same frame into every queue that is still open.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::relay::{ClientId, Outbound, ServerMessage};

/// A registered connection as the registry sees it.
#[derive(Debug, Clone)]
pub struct RegisteredConnection {
    pub client_id: ClientId,
    pub remote_addr: SocketAddr,
    pub outbound: mpsc::Sender<Outbound>,
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the frame was queued for.
    pub delivered: usize,
    /// Connections that were closing or whose queue was full.
    pub skipped: usize,
}

/// Errors that can occur in connection registry operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionRegistryError {
    /// The broadcast frame could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for tracking connections and fanning out state.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Add an authenticated connection.
    async fn register(&self, connection: RegisteredConnection);

    /// Remove a connection. Returns false if it was not registered; calling
    /// this twice is not an error.
    async fn unregister(&self, client_id: &ClientId) -> bool;

    /// Send `message` to every registered connection that is still open.
    ///
    /// Connections that are mid-close are skipped silently.
    async fn broadcast(
        &self,
        message: &ServerMessage,
    ) -> Result<BroadcastReport, ConnectionRegistryError>;

    /// Whether `client_id` is currently registered.
    async fn is_registered(&self, client_id: &ClientId) -> bool;

    /// Number of registered connections.
    async fn connection_count(&self) -> usize;
}
