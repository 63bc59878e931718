//! Foundation module - Shared domain primitives.
//!
//! Contains the value objects and error types that the relay vocabulary
//! is built on.

mod errors;
mod state_machine;
mod timestamp;

pub use errors::ValidationError;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
