//! Relay domain - the vocabulary of overlay state synchronization.
//!
//! - [`SharedState`] - the JSON object every client mirrors
//! - [`ClientConnection`] / [`ConnectionPhase`] - per-socket lifecycle
//! - [`TokenGate`] - shared-secret authentication
//! - [`messages`] - wire protocol and close reasons

mod auth;
mod connection;
pub mod messages;
mod shared_state;

pub use auth::{AuthRejection, TokenGate};
pub use connection::{ClientConnection, ClientId, ConnectionPhase};
pub use messages::{CloseReason, InboundMessage, Outbound, ProtocolError, ServerMessage};
pub use shared_state::SharedState;
