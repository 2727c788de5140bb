//! Observability for the pc-control agent
//!
//! Structured tracing output plus the append-only action log.

pub mod action_log;
pub mod logging;

// Re-export for convenience
pub use action_log::ActionLog;
pub use logging::{init_default_logging, init_logging, LogFormat};

// Span macros for structured logging
pub use logging::{command_span, session_span};
