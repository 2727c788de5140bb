//! Agent composition
//!
//! The immutable startup context, the command dispatcher invoked by the
//! transport, and the lifecycle that runs the session loop and shutdown.

pub mod context;
pub mod dispatcher;
pub mod lifecycle;

pub use context::AgentContext;
pub use dispatcher::{CommandDispatcher, DispatchOutcome};
pub use lifecycle::AgentLifecycle;
