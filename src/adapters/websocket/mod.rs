//! WebSocket adapters for overlay clients.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  frames   ┌──────────────┐  merge/save  ┌──────────────┐
//! │  read loop   │ ────────► │ RelayEngine  │ ───────────► │  StateStore  │
//! └──────────────┘           └──────────────┘              └──────────────┘
//!                                   │ broadcast
//!                                   ▼
//!                     ┌───────────────────────────┐
//!                     │ InMemoryConnectionRegistry │
//!                     │   ├── client-a (mpsc)      │
//!                     │   └── client-b (mpsc)      │
//!                     └───────────────────────────┘
//!                                   │
//!                                   ▼
//!                            write loop → socket
//! ```
//!
//! # Components
//!
//! - [`handler`] - Axum WebSocket upgrade handler and per-connection loops
//! - [`registry`] - Live connection registry with fan-out

pub mod handler;
pub mod registry;

pub use handler::{websocket_router, ws_handler, ConnectParams, WebSocketState};
pub use registry::InMemoryConnectionRegistry;
