//! HTTP adapters.
//!
//! The relay's only plain-HTTP surface is the health probe; everything else
//! happens over the WebSocket route.

pub mod health;

pub use health::{health_check, health_router, HealthResponse, HealthState};
