//! Privileged local actions triggered by remote commands
//!
//! Both actions are fire-and-forget: the dispatcher logs the outcome and never
//! feeds it back into the session.

pub mod system;

pub use system::SystemActions;

use async_trait::async_trait;
use thiserror::Error;

/// Action execution errors
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with status {status}: {stderr}")]
    NonZeroExit {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("Action not supported on this platform: {0}")]
    Unsupported(&'static str),
    #[error("Action failed: {0}")]
    Failed(String),
}

/// OS-level side effects the agent can perform
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Put the machine into sleep/suspend
    async fn suspend_machine(&self) -> Result<(), ActionError>;

    /// Power off the attached display(s)
    async fn turn_off_display(&self) -> Result<(), ActionError>;
}
