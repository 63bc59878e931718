//! Domain layer containing relay types and rules.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (timestamps, state machines, errors)
//! - `relay` - Shared state, connection lifecycle, authentication, wire protocol

pub mod foundation;
pub mod relay;
