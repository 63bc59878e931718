//! Client connection identity and lifecycle.
//!
//! ```text
//! Connecting ──► Authenticating ──► Authenticated
//!     │                │                  │
//!     └────────────────┴──────────────────┴──► Closed
//! ```

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use uuid::Uuid;

use crate::domain::foundation::{StateMachine, Timestamp, ValidationError};

/// Unique identifier for a WebSocket client connection.
///
/// Generated server-side when a client connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Create a new random client ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle phase of a single client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Transport accepted, token not yet inspected.
    Connecting,
    /// Token extracted from the connect request and being checked.
    Authenticating,
    /// Registered and exchanging messages.
    Authenticated,
    /// Terminal. Reached on close, error, auth failure, rate-limit or shutdown.
    Closed,
}

impl StateMachine for ConnectionPhase {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConnectionPhase::*;
        matches!(
            (self, target),
            (Connecting, Authenticating)
                | (Authenticating, Authenticated)
                | (Connecting, Closed)
                | (Authenticating, Closed)
                | (Authenticated, Closed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConnectionPhase::*;
        match self {
            Connecting => vec![Authenticating, Closed],
            Authenticating => vec![Authenticated, Closed],
            Authenticated => vec![Closed],
            Closed => vec![],
        }
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Authenticating => "authenticating",
            ConnectionPhase::Authenticated => "authenticated",
            ConnectionPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One transport session as seen by the relay.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    id: ClientId,
    remote_addr: SocketAddr,
    connected_at: Timestamp,
    phase: ConnectionPhase,
}

impl ClientConnection {
    /// A freshly accepted connection in the `Connecting` phase.
    pub fn accept(remote_addr: SocketAddr) -> Self {
        Self {
            id: ClientId::new(),
            remote_addr,
            connected_at: Timestamp::now(),
            phase: ConnectionPhase::Connecting,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn connected_at(&self) -> Timestamp {
        self.connected_at
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Rate-limit identity: the remote IP, shared by every socket from that host.
    pub fn identity(&self) -> IpAddr {
        self.remote_addr.ip()
    }

    /// Moves to `target`, rejecting transitions the lifecycle does not allow.
    pub fn advance(&mut self, target: ConnectionPhase) -> Result<(), ValidationError> {
        self.phase = self.phase.transition_to(target)?;
        Ok(())
    }

    /// Moves to `Closed`. Closing an already closed connection is a no-op.
    pub fn close(&mut self) {
        self.phase = ConnectionPhase::Closed;
    }
}
