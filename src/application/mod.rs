//! Application layer - orchestrates the relay's use of its ports.
//!
//! - [`RelayEngine`] - authentication, merge, persistence and fan-out

mod relay_engine;

pub use relay_engine::{InboundOutcome, RelayEngine};
