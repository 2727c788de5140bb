//! Broker session management
//!
//! - [`state`] - shared session state and run flag
//! - [`backoff`] - reconnect delay policy
//! - [`machine`] - connect / birth / idle control loop
//! - [`shutdown`] - signal handling and the final offline announcement

pub mod backoff;
pub mod machine;
pub mod shutdown;
pub mod state;

pub use backoff::{next_delay, Backoff, ReconnectConfig};
pub use machine::{SessionError, SessionMachine, StepOutcome, TICK};
pub use shutdown::{spawn_signal_listener, ShutdownReport, ShutdownSequencer};
pub use state::{RunFlag, SessionState, SharedSessionState};
