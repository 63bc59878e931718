//! WebSocket message types for overlay state synchronization.
//!
//! Defines the protocol between the relay and connected clients:
//! - Server → Client: initial snapshot, state broadcasts, close reasons
//! - Client → Server: partial state updates (any other type is accepted
//!   but does not mutate state)

use serde::Serialize;
use serde_json::{Map, Value};

use super::SharedState;

/// Message type that carries a partial update from a client.
pub const CONFIG_UPDATE: &str = "config:update";

// ============================================
// Server → Client Messages
// ============================================

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// State as of the moment this client joined. Sent to that client only.
    #[serde(rename = "config:init")]
    ConfigInit(SharedState),

    /// State after processing any client message. Sent to every client.
    #[serde(rename = "config")]
    Config(SharedState),
}

impl ServerMessage {
    /// Serialize to the JSON text frame sent on the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Why the server is closing a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Missing or wrong token, or no token configured on the server.
    Unauthorized,
    /// The client exceeded its per-window message budget.
    RateLimited,
    /// The server is shutting down.
    GoingAway,
}

impl CloseReason {
    /// WebSocket close code (RFC 6455 §7.4).
    pub fn code(&self) -> u16 {
        match self {
            CloseReason::Unauthorized => 1008,
            CloseReason::RateLimited => 1013,
            CloseReason::GoingAway => 1001,
        }
    }

    /// Human-readable close reason.
    pub fn reason(&self) -> &'static str {
        match self {
            CloseReason::Unauthorized => "Unauthorized",
            CloseReason::RateLimited => "Rate limit exceeded",
            CloseReason::GoingAway => "Server shutting down",
        }
    }
}

/// A frame queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// A serialized [`ServerMessage`].
    Text(String),
    /// Send a close frame and stop writing.
    Close(CloseReason),
}

// ============================================
// Client → Server Messages
// ============================================

/// Errors raised while decoding a client frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("message is not valid UTF-8")]
    InvalidUtf8,

    #[error("message is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("message is JSON null")]
    Null,
}

/// A well-formed client message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// `{"type":"config:update","payload":{...}}`
    ConfigUpdate(Map<String, Value>),

    /// Any other object. Triggers the broadcast but never a merge.
    Other { kind: Option<String> },
}

impl InboundMessage {
    /// Decode a raw frame.
    ///
    /// Any JSON value except `null` is well-formed. Only an object typed
    /// `config:update` with an object payload becomes an update; everything
    /// else decodes as [`InboundMessage::Other`].
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8)?;
        let value: Value = serde_json::from_str(text)?;

        let mut object = match value {
            Value::Object(object) => object,
            Value::Null => return Err(ProtocolError::Null),
            // Scalars and arrays carry no type, so they only re-broadcast
            _ => return Ok(InboundMessage::Other { kind: None }),
        };

        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_owned);

        match (kind.as_deref(), object.remove("payload")) {
            (Some(CONFIG_UPDATE), Some(Value::Object(payload))) => {
                Ok(InboundMessage::ConfigUpdate(payload))
            }
            _ => Ok(InboundMessage::Other { kind }),
        }
    }
}
