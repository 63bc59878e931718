//! Overlay Relay - real-time shared state for stream overlays
//!
//! A WebSocket server that keeps one JSON document in sync across every
//! connected overlay client. Clients authenticate with a shared token,
//! push shallow-merge updates, and receive the full state after each
//! change. The latest snapshot survives restarts on disk.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod server;
