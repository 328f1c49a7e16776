//! Observability helpers (tracing setup and span constructors).

pub mod spans;
pub mod tracing_setup;

pub use tracing_setup::*;
